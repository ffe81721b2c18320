//! Partition type code → filesystem driver dispatch
//!
//! The [`Dispatcher`] owns a table from MBR type codes to [`FsDriver`]s.
//! The table is plain data: hosts add codes and drivers at runtime and
//! the MBR reader never needs to change.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use drivers::{BlockDevice, PartitionBlockDevice};
use log::debug;

use crate::fs::{FileSystem, FsError};

/// Type codes handled by the FAT family driver
pub const FAT_PARTITION_TYPES: [u8; 11] = [
    0x01, 0x04, 0x06, 0x0B, 0x0C, 0x0E, 0x11, 0x14, 0x1B, 0x1C, 0x1E,
];

/// Linux native partition, handled by the ext2 driver
pub const EXT2_PARTITION_TYPE: u8 = 0x83;

/// Filesystem driver initializer
pub trait FsDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Probe `device` and build a filesystem instance on it
    fn init(&self, device: Arc<dyn BlockDevice>) -> Result<Arc<dyn FileSystem>, FsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The driver matched by type code refused the partition
    DriverInitFailure { driver: String, source: FsError },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::DriverInitFailure { driver, source } => {
                write!(f, "{} initialization failed: {}", driver, source)
            }
        }
    }
}

/// Table of filesystem drivers keyed by partition type code
#[derive(Clone, Default)]
pub struct Dispatcher {
    drivers: BTreeMap<u8, Arc<dyn FsDriver>>,
}

impl Dispatcher {
    /// An empty table; every partition stays raw
    pub fn new() -> Self {
        Self {
            drivers: BTreeMap::new(),
        }
    }

    /// The built-in drivers enabled at compile time
    pub fn standard() -> Self {
        #[allow(unused_mut)]
        let mut dispatcher = Self::new();

        #[cfg(feature = "fat")]
        dispatcher.register(&FAT_PARTITION_TYPES, Arc::new(crate::fs::fat::FatDriver));

        #[cfg(feature = "ext2")]
        dispatcher.register(&[EXT2_PARTITION_TYPE], Arc::new(crate::fs::ext2::Ext2Driver));

        dispatcher
    }

    /// Route every code in `codes` to `driver`, replacing earlier entries
    pub fn register(&mut self, codes: &[u8], driver: Arc<dyn FsDriver>) -> &mut Self {
        for &code in codes {
            self.drivers.insert(code, driver.clone());
        }
        self
    }

    pub fn unregister(&mut self, code: u8) -> Option<Arc<dyn FsDriver>> {
        self.drivers.remove(&code)
    }

    /// The driver selected for `code`, if any
    pub fn driver_for(&self, code: u8) -> Option<&Arc<dyn FsDriver>> {
        self.drivers.get(&code)
    }

    /// Initialize the driver matching the partition's type code.
    ///
    /// Returns `Ok(None)` when no driver handles the code; the partition
    /// is then only usable as a raw block device.
    pub fn dispatch(
        &self,
        device: &Arc<PartitionBlockDevice>,
    ) -> Result<Option<Arc<dyn FileSystem>>, DispatchError> {
        let code = device.partition_type();
        let Some(driver) = self.driver_for(code) else {
            debug!(
                "{}: no filesystem driver for type {:#04x}",
                device.device_name(),
                code
            );
            return Ok(None);
        };

        debug!(
            "{}: type {:#04x} handled by {}",
            device.device_name(),
            code,
            driver.name()
        );
        let block_device: Arc<dyn BlockDevice> = device.clone();
        driver
            .init(block_device)
            .map(Some)
            .map_err(|source| DispatchError::DriverInitFailure {
                driver: driver.name().into(),
                source,
            })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (code, driver) in &self.drivers {
            map.entry(&format_args!("{:#04x}", code), &driver.name());
        }
        map.finish()
    }
}

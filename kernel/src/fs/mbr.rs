//! MBR partition discovery
//!
//! [`read_mbr`] reads sector 0 of a parent device, checks the boot
//! signature and turns every used slot of the partition table into a
//! [`PartitionBlockDevice`]. Each partition is offered to the
//! [`Dispatcher`]; a filesystem it produces is registered with the VFS
//! and handed back alongside the device.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use drivers::partition::{MAX_PRIMARY_PARTITIONS, SECTOR_SIZE};
use drivers::{BlockDevice, BlockDeviceError, MbrSector, PartitionBlockDevice};
use log::{Level, debug, error, info, log_enabled, trace, warn};

use crate::fs::FileSystem;
use crate::fs::dispatch::Dispatcher;
use crate::fs::vfs::{VirtFS, vfs};

/// MBR discovery errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MbrError {
    /// The parent device cannot be used
    InvalidArgument,
    /// Sector 0 could not be read in full
    IoError(BlockDeviceError),
    /// Sector 0 does not end in `0x55 0xAA`
    InvalidFormat { signature: [u8; 2] },
}

impl From<BlockDeviceError> for MbrError {
    fn from(err: BlockDeviceError) -> Self {
        MbrError::IoError(err)
    }
}

impl fmt::Display for MbrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MbrError::InvalidArgument => write!(f, "invalid parent device"),
            MbrError::IoError(err) => write!(f, "unable to read sector 0: {}", err),
            MbrError::InvalidFormat { signature } => write!(
                f,
                "no valid mbr signature (bytes are {:x} {:x})",
                signature[0], signature[1]
            ),
        }
    }
}

/// A discovered partition
pub struct MbrPartition {
    /// The partition as a block device
    pub device: Arc<PartitionBlockDevice>,
    /// The filesystem found on it, if a driver accepted it
    pub filesystem: Option<Arc<dyn FileSystem>>,
}

impl MbrPartition {
    pub fn index(&self) -> usize {
        self.device.index()
    }

    pub fn partition_type(&self) -> u8 {
        self.device.partition_type()
    }

    /// The partition as a plain block device
    pub fn block_device(&self) -> Arc<dyn BlockDevice> {
        self.device.clone()
    }
}

impl fmt::Debug for MbrPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MbrPartition")
            .field("device", &self.device)
            .field("filesystem", &self.filesystem.as_ref().map(|fs| fs.name()))
            .finish()
    }
}

/// Discover the partitions of `parent` with the built-in drivers and the
/// process-wide VFS.
pub fn read_mbr(parent: &Arc<dyn BlockDevice>) -> Result<Vec<MbrPartition>, MbrError> {
    read_mbr_with(parent, &Dispatcher::standard(), vfs())
}

/// Discover the partitions of `parent`.
///
/// Partitions are returned in table order. Failing to read or validate
/// sector 0 aborts the whole operation; a partition whose driver is
/// unknown or refuses it is still returned, without a filesystem.
pub fn read_mbr_with(
    parent: &Arc<dyn BlockDevice>,
    dispatcher: &Dispatcher,
    vfs: &VirtFS,
) -> Result<Vec<MbrPartition>, MbrError> {
    let sector = read_boot_sector(parent)?;

    if !sector.has_valid_signature() {
        let signature = sector.signature();
        warn!(
            "no valid mbr signature on device {} (bytes are {:x} {:x})",
            parent.device_name(),
            signature[0],
            signature[1]
        );
        return Err(MbrError::InvalidFormat { signature });
    }
    info!("found valid MBR on device {}", parent.device_name());

    if log_enabled!(Level::Trace) {
        dump_sector(&sector);
    }

    let mut partitions = Vec::with_capacity(MAX_PRIMARY_PARTITIONS);
    for entry in sector.partitions() {
        let device = Arc::new(PartitionBlockDevice::new(parent.clone(), &entry));
        debug!(
            "partition number {} ({}) of type {:x}, start sector {}, sector count {}",
            entry.index,
            device.device_name(),
            entry.partition_type,
            entry.start_block,
            entry.block_count
        );
        if entry.block_count == 0 {
            debug!("{}: partition has no blocks", device.device_name());
        }

        let filesystem = attach_filesystem(&device, dispatcher, vfs);
        partitions.push(MbrPartition { device, filesystem });
    }

    info!(
        "found total of {} partition(s) on {}",
        partitions.len(),
        parent.device_name()
    );
    Ok(partitions)
}

fn read_boot_sector(parent: &Arc<dyn BlockDevice>) -> Result<MbrSector, MbrError> {
    if parent.block_size() == 0 {
        warn!("invalid parent device {}", parent.device_name());
        return Err(MbrError::InvalidArgument);
    }

    trace!("reading block 0 from device {}", parent.device_name());
    let mut bytes = [0u8; SECTOR_SIZE];
    let read = parent.read(&mut bytes, 0).map_err(|err| {
        error!("block read failed on {} ({})", parent.device_name(), err);
        MbrError::IoError(err)
    })?;

    if read != SECTOR_SIZE {
        error!(
            "unable to read first {} bytes of device {}, only {} bytes read",
            SECTOR_SIZE,
            parent.device_name(),
            read
        );
        return Err(MbrError::IoError(BlockDeviceError::ShortRead {
            expected: SECTOR_SIZE,
            actual: read,
        }));
    }

    Ok(MbrSector::new(bytes))
}

fn attach_filesystem(
    device: &Arc<PartitionBlockDevice>,
    dispatcher: &Dispatcher,
    vfs: &VirtFS,
) -> Option<Arc<dyn FileSystem>> {
    let filesystem = match dispatcher.dispatch(device) {
        Ok(filesystem) => filesystem?,
        Err(err) => {
            warn!("{}: {}", device.device_name(), err);
            return None;
        }
    };

    if let Err(err) = vfs.register(filesystem.clone()) {
        warn!(
            "{}: unable to register {} filesystem: {}",
            device.device_name(),
            filesystem.name(),
            err
        );
    }
    Some(filesystem)
}

fn dump_sector(sector: &MbrSector) {
    for (line, chunk) in sector.as_bytes().chunks(16).enumerate() {
        trace!("{:03x}: {:02x?}", line * 16, chunk);
    }
}

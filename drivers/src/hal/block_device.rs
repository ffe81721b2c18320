//! Block Device Hardware Abstraction Layer
//!
//! This module provides generic traits for block-oriented storage devices
//! like SD cards, eMMC, hard drives and the partitions found on them.
//!
//! # Architecture
//!
//! ```text
//! File System Layer (FAT, ext2)
//!           ↓
//! Partition Layer (MBR)
//!           ↓
//! Block Device HAL ← You are here
//!           ↓
//! Platform Drivers (EMMC, RAM disk, etc.)
//! ```

use core::fmt;

/// Block device information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDeviceInfo {
    /// Block size in bytes (typically 512)
    pub block_size: usize,
    /// Total number of blocks, when the device knows it
    pub block_count: Option<u64>,
}

impl BlockDeviceInfo {
    /// Create info for a device of unknown length
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            block_count: None,
        }
    }

    /// Attach a block count
    pub fn with_block_count(mut self, block_count: u64) -> Self {
        self.block_count = Some(block_count);
        self
    }

    /// Total capacity in bytes, if the block count is known
    pub fn capacity(&self) -> Option<u64> {
        self.block_count
            .and_then(|count| count.checked_mul(self.block_size as u64))
    }
}

/// Block device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDeviceError {
    /// Device not initialized or not present
    NotReady,
    /// Invalid block address (out of range)
    InvalidAddress,
    /// Buffer cannot be used for this transfer
    InvalidBuffer,
    /// Hardware error during read
    ReadError,
    /// The device returned fewer bytes than the caller required
    ShortRead { expected: usize, actual: usize },
    /// A partition and its parent disagree on the block size
    IncompatibleGeometry { partition: usize, parent: usize },
    /// Generic I/O error
    IoError,
}

impl fmt::Display for BlockDeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockDeviceError::NotReady => write!(f, "device not ready"),
            BlockDeviceError::InvalidAddress => write!(f, "invalid block address"),
            BlockDeviceError::InvalidBuffer => write!(f, "invalid buffer"),
            BlockDeviceError::ReadError => write!(f, "read error"),
            BlockDeviceError::ShortRead { expected, actual } => {
                write!(f, "short read ({} of {} bytes)", actual, expected)
            }
            BlockDeviceError::IncompatibleGeometry { partition, parent } => write!(
                f,
                "block size differs ({} vs {})",
                partition, parent
            ),
            BlockDeviceError::IoError => write!(f, "I/O error"),
        }
    }
}

/// Block device trait - fundamental storage abstraction
///
/// Reads are addressed in blocks of [`block_size`](BlockDevice::block_size)
/// bytes but sized in bytes: `read` fills at most `buf.len()` bytes starting
/// at `start_block` and reports how many it produced. A device may return
/// fewer bytes than asked for; callers that need the whole buffer use
/// [`read_exact`](BlockDevice::read_exact).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so devices can be shared through
/// `Arc`. The trait itself provides no locking; hosts serialize access to a
/// device when that matters.
///
/// # Example
///
/// ```rust
/// use drivers::hal::block_device::{BlockDevice, BlockDeviceError};
///
/// fn read_first_block(device: &dyn BlockDevice) -> Result<[u8; 512], BlockDeviceError> {
///     let mut buf = [0u8; 512];
///     device.read_exact(&mut buf, 0)?;
///     Ok(buf)
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// Name of the driver backing this device
    fn driver_name(&self) -> &str;

    /// Unique, human readable device name (e.g. `sd0`, `sd0_1`)
    fn device_name(&self) -> &str;

    /// Opaque identifier used for matching and persistence
    fn device_id(&self) -> &[u8];

    /// Block size in bytes, fixed for the lifetime of the device
    fn block_size(&self) -> usize;

    /// Read up to `buf.len()` bytes starting at `start_block`
    ///
    /// # Returns
    /// - `Ok(n)`: `n` bytes were written to the front of `buf`
    /// - `Err(e)`: the transfer failed
    fn read(&self, buf: &mut [u8], start_block: u64) -> Result<usize, BlockDeviceError>;

    /// Get device information
    fn info(&self) -> BlockDeviceInfo {
        BlockDeviceInfo::new(self.block_size())
    }

    /// Read exactly `buf.len()` bytes starting at `start_block`
    ///
    /// A short transfer is reported as [`BlockDeviceError::ShortRead`].
    fn read_exact(&self, buf: &mut [u8], start_block: u64) -> Result<(), BlockDeviceError> {
        let actual = self.read(buf, start_block)?;
        if actual != buf.len() {
            return Err(BlockDeviceError::ShortRead {
                expected: buf.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// Partition on a block device
///
/// Represents a logical partition (e.g., from MBR).
pub trait Partition: BlockDevice {
    /// Get the underlying device
    fn device(&self) -> &dyn BlockDevice;

    /// Get partition offset (in blocks)
    fn offset(&self) -> u64;

    /// Get partition size (in blocks)
    fn size(&self) -> u64;
}

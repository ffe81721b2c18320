use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use log::{trace, warn};

use super::mbr::PartitionEntry;
use crate::hal::block_device::{BlockDevice, BlockDeviceError, BlockDeviceInfo, Partition};

/// Driver name reported by every partition device
pub const DRIVER_NAME: &str = "mbr";

/// A view into one MBR partition of a parent device
///
/// Implements [`BlockDevice`] so filesystems can use it directly. Block `k`
/// of the partition is block `start_block + k` of the parent. The device
/// keeps the parent alive through its `Arc`.
pub struct PartitionBlockDevice {
    parent: Arc<dyn BlockDevice>,
    device_name: String,
    device_id: [u8; 1],
    block_size: usize,
    index: usize,
    partition_type: u8,
    start_block: u32,
    block_count: u32,
}

impl PartitionBlockDevice {
    /// Create the device for `entry`, inheriting the parent's block size
    pub fn new(parent: Arc<dyn BlockDevice>, entry: &PartitionEntry) -> Self {
        let block_size = parent.block_size();
        Self::with_block_size(parent, entry, block_size)
    }

    /// Create the device with an explicit block size
    ///
    /// Reads are refused while `block_size` differs from the parent's.
    pub fn with_block_size(
        parent: Arc<dyn BlockDevice>,
        entry: &PartitionEntry,
        block_size: usize,
    ) -> Self {
        let device_name = format!("{}_{}", parent.device_name(), entry.index);
        Self {
            parent,
            device_name,
            device_id: [entry.index as u8],
            block_size,
            index: entry.index,
            partition_type: entry.partition_type,
            start_block: entry.start_block,
            block_count: entry.block_count,
        }
    }

    pub fn parent(&self) -> &Arc<dyn BlockDevice> {
        &self.parent
    }

    /// Slot of this partition in the MBR table
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn partition_type(&self) -> u8 {
        self.partition_type
    }

    pub fn start_block(&self) -> u32 {
        self.start_block
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }
}

impl BlockDevice for PartitionBlockDevice {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn device_id(&self) -> &[u8] {
        &self.device_id
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&self, buf: &mut [u8], start_block: u64) -> Result<usize, BlockDeviceError> {
        let parent_block_size = self.parent.block_size();
        if self.block_size != parent_block_size {
            warn!(
                "{}: read() error - block size differs ({} vs {})",
                self.device_name, self.block_size, parent_block_size
            );
            return Err(BlockDeviceError::IncompatibleGeometry {
                partition: self.block_size,
                parent: parent_block_size,
            });
        }

        let parent_block = start_block
            .checked_add(u64::from(self.start_block))
            .ok_or(BlockDeviceError::InvalidAddress)?;
        trace!(
            "{}: block {} -> {} block {}",
            self.device_name,
            start_block,
            self.parent.device_name(),
            parent_block
        );

        self.parent.read(buf, parent_block)
    }

    fn info(&self) -> BlockDeviceInfo {
        BlockDeviceInfo::new(self.block_size).with_block_count(u64::from(self.block_count))
    }
}

impl Partition for PartitionBlockDevice {
    fn device(&self) -> &dyn BlockDevice {
        self.parent.as_ref()
    }

    fn offset(&self) -> u64 {
        u64::from(self.start_block)
    }

    fn size(&self) -> u64 {
        u64::from(self.block_count)
    }
}

impl fmt::Debug for PartitionBlockDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionBlockDevice")
            .field("device_name", &self.device_name)
            .field("parent", &self.parent.device_name())
            .field("partition_type", &format_args!("{:#04x}", self.partition_type))
            .field("start_block", &self.start_block)
            .field("block_count", &self.block_count)
            .field("block_size", &self.block_size)
            .finish()
    }
}

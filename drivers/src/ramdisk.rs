//! RAM-backed block device.
//!
//! Simulates a disk entirely in memory. Every read records the requested
//! block so callers can check how addresses were translated, and a read
//! limit can be set to simulate devices that return short transfers.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::hal::block_device::{BlockDevice, BlockDeviceError, BlockDeviceInfo};

const DRIVER_NAME: &str = "ramdisk";

/// RAM-backed block device.
pub struct RamDisk {
    name: String,
    id: Vec<u8>,
    data: Vec<u8>,
    block_size: usize,
    read_limit: Option<usize>,
    reads: Mutex<Vec<u64>>,
}

impl RamDisk {
    /// Create a zero-filled RAM disk with the given geometry.
    pub fn new(name: &str, block_size: usize, block_count: u64) -> Self {
        Self::from_image(name, block_size, vec![0u8; block_size * block_count as usize])
    }

    /// Wrap an existing disk image, padding it to a whole number of blocks.
    pub fn from_image(name: &str, block_size: usize, mut image: Vec<u8>) -> Self {
        if block_size > 0 && image.len() % block_size != 0 {
            let padded = image.len().next_multiple_of(block_size);
            image.resize(padded, 0);
        }
        Self {
            name: name.into(),
            id: name.as_bytes().to_vec(),
            data: image,
            block_size,
            read_limit: None,
            reads: Mutex::new(Vec::new()),
        }
    }

    /// Never return more than `limit` bytes from a single read.
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    /// Overwrite raw bytes at a byte offset.
    pub fn write_raw(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Read raw bytes at a byte offset (for test verification).
    pub fn read_raw(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Start block of every read issued so far, oldest first.
    pub fn reads(&self) -> Vec<u64> {
        self.reads.lock().clone()
    }

    pub fn clear_reads(&self) {
        self.reads.lock().clear();
    }

    fn block_count(&self) -> u64 {
        if self.block_size == 0 {
            0
        } else {
            (self.data.len() / self.block_size) as u64
        }
    }
}

impl BlockDevice for RamDisk {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn device_name(&self) -> &str {
        &self.name
    }

    fn device_id(&self) -> &[u8] {
        &self.id
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read(&self, buf: &mut [u8], start_block: u64) -> Result<usize, BlockDeviceError> {
        self.reads.lock().push(start_block);

        if start_block >= self.block_count() {
            return Err(BlockDeviceError::InvalidAddress);
        }

        let start = start_block as usize * self.block_size;
        let mut len = buf.len().min(self.data.len() - start);
        if let Some(limit) = self.read_limit {
            len = len.min(limit);
        }

        buf[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }

    fn info(&self) -> BlockDeviceInfo {
        BlockDeviceInfo::new(self.block_size).with_block_count(self.block_count())
    }
}

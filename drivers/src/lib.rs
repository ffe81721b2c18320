//! Block Storage Driver Subsystem
//!
//! This crate provides the layers between raw storage and the filesystem
//! code in `kernel`:
//!
//! # Module Organization
//!
//! - [`hal`]: Platform-independent trait definitions
//! - [`partition`]: MBR parsing and partition block devices
//! - [`ramdisk`]: Memory-backed block device
//!
//! # Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use drivers::{BlockDevice, MbrSector, PartitionBlockDevice, RamDisk};
//!
//! let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("sd0", 512, 16));
//! let mut sector = [0u8; 512];
//! disk.read(&mut sector, 0).unwrap();
//!
//! for entry in MbrSector::new(sector).partitions() {
//!     let part = PartitionBlockDevice::new(disk.clone(), &entry);
//!     assert!(part.device_name().starts_with("sd0_"));
//! }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod hal;
pub mod partition;
pub mod ramdisk;

// Re-export commonly used types
pub use hal::block_device::{BlockDevice, BlockDeviceError, BlockDeviceInfo, Partition};
pub use partition::{MbrSector, PartitionBlockDevice, PartitionEntry};
pub use ramdisk::RamDisk;

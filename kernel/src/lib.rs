//! Kernel storage stack
//!
//! Turns a raw [`drivers::BlockDevice`] into mounted filesystems: the MBR
//! reader finds the partitions, the dispatcher picks a filesystem driver
//! for each one by its type code and the result is registered with the
//! virtual filesystem.
//!
//! ```no_run
//! use std::sync::Arc;
//! use drivers::{BlockDevice, RamDisk};
//! use kernel::fs::{mbr::read_mbr, vfs::vfs};
//!
//! let disk: Arc<dyn BlockDevice> = Arc::new(RamDisk::new("sd0", 512, 4096));
//! for partition in read_mbr(&disk)? {
//!     println!("{:?}", partition);
//! }
//! println!("mounted: {:?}", vfs().mounts());
//! # Ok::<(), kernel::fs::mbr::MbrError>(())
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod fs;

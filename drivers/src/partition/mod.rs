//! Partition layer - exposes MBR partitions as block devices
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Filesystem (FAT, ext2)                 │
//! │  sees: BlockDevice                      │
//! ├─────────────────────────────────────────┤
//! │  PartitionBlockDevice                   │
//! │  block k → parent block (start + k)     │
//! ├─────────────────────────────────────────┤
//! │  Raw disk                               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Only the four primary entries of a classic MBR are understood. Extended
//! partitions and GPT are not.

mod device;
mod mbr;

pub use device::{DRIVER_NAME, PartitionBlockDevice};
pub use mbr::{
    BOOT_SIGNATURE, MAX_PRIMARY_PARTITIONS, MbrSector, PARTITION_ENTRY_SIZE,
    PARTITION_TABLE_OFFSET, PartitionEntry, SECTOR_SIZE, SIGNATURE_OFFSET,
};

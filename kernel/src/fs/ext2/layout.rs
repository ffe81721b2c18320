//! On-disk ext2 structures
//!
//! Only the fields the read path needs are decoded. All values are
//! little endian.

use crate::fs::{FsError, le_u16, le_u32};

pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const EXT2_MAGIC: u16 = 0xEF53;
pub const ROOT_INODE: u32 = 2;

/// Inode size of revision 0 filesystems
const GOOD_OLD_INODE_SIZE: u16 = 128;
const GOOD_OLD_REV: u32 = 0;

pub const GROUP_DESCRIPTOR_SIZE: u64 = 32;

/// Directory entries carry a file type byte
pub const INCOMPAT_FILETYPE: u32 = 0x0002;
/// Incompatible features the read path understands
const INCOMPAT_SUPPORTED: u32 = INCOMPAT_FILETYPE;
/// 64-bit file sizes on regular files
const RO_COMPAT_LARGE_FILE: u32 = 0x0002;

const S_IFMT: u16 = 0xF000;
const S_IFDIR: u16 = 0x4000;
const S_IFREG: u16 = 0x8000;

/// Direct block pointers in an inode
pub const DIRECT_BLOCKS: usize = 12;
pub const SINGLE_INDIRECT: usize = 12;
pub const DOUBLE_INDIRECT: usize = 13;
pub const TRIPLE_INDIRECT: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub rev_level: u32,
    pub inode_size: u16,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
}

impl Superblock {
    pub fn parse(raw: &[u8]) -> Result<Self, FsError> {
        if raw.len() < SUPERBLOCK_SIZE || le_u16(raw, 56) != EXT2_MAGIC {
            return Err(FsError::InvalidFormat);
        }

        let rev_level = le_u32(raw, 76);
        let (inode_size, feature_incompat, feature_ro_compat) = if rev_level == GOOD_OLD_REV {
            (GOOD_OLD_INODE_SIZE, 0, 0)
        } else {
            (le_u16(raw, 88), le_u32(raw, 96), le_u32(raw, 100))
        };

        let sb = Self {
            inodes_count: le_u32(raw, 0),
            blocks_count: le_u32(raw, 4),
            first_data_block: le_u32(raw, 20),
            log_block_size: le_u32(raw, 24),
            blocks_per_group: le_u32(raw, 32),
            inodes_per_group: le_u32(raw, 40),
            rev_level,
            inode_size,
            feature_incompat,
            feature_ro_compat,
        };

        if sb.log_block_size > 6
            || sb.blocks_per_group == 0
            || sb.inodes_per_group == 0
            || sb.inode_size < GOOD_OLD_INODE_SIZE
            || !sb.inode_size.is_power_of_two()
        {
            return Err(FsError::InvalidFormat);
        }
        Ok(sb)
    }

    pub fn block_size(&self) -> usize {
        1024 << self.log_block_size
    }

    /// Incompatible feature bits this driver cannot handle
    pub fn unsupported_features(&self) -> u32 {
        self.feature_incompat & !INCOMPAT_SUPPORTED
    }

    pub fn has_file_type(&self) -> bool {
        self.feature_incompat & INCOMPAT_FILETYPE != 0
    }

    pub fn has_large_files(&self) -> bool {
        self.feature_ro_compat & RO_COMPAT_LARGE_FILE != 0
    }

    pub fn group_count(&self) -> u32 {
        (self.blocks_count.saturating_sub(self.first_data_block)).div_ceil(self.blocks_per_group)
    }

    /// Block holding the first group descriptor
    pub fn descriptor_table_block(&self) -> u32 {
        self.first_data_block + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub mode: u16,
    pub size: u64,
    pub links_count: u16,
    pub block: [u32; 15],
}

impl Inode {
    /// Decode an inode record; `large_files` enables the upper size word
    pub fn parse(raw: &[u8], large_files: bool) -> Self {
        let mode = le_u16(raw, 0);
        let mut block = [0u32; 15];
        for (i, ptr) in block.iter_mut().enumerate() {
            *ptr = le_u32(raw, 40 + i * 4);
        }

        let mut size = u64::from(le_u32(raw, 4));
        if large_files && mode & S_IFMT == S_IFREG {
            size |= u64::from(le_u32(raw, 108)) << 32;
        }

        Self {
            mode,
            size,
            links_count: le_u16(raw, 26),
            block,
        }
    }

    pub fn kind(&self) -> InodeKind {
        match self.mode & S_IFMT {
            S_IFDIR => InodeKind::Directory,
            S_IFREG => InodeKind::File,
            _ => InodeKind::Other,
        }
    }
}

/// Header of a linked directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirRecord {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u16,
}

impl DirRecord {
    pub const HEADER_SIZE: usize = 8;

    /// Decode the record at the start of `raw`, checking it fits
    pub fn parse(raw: &[u8], file_type: bool) -> Result<Self, FsError> {
        if raw.len() < Self::HEADER_SIZE {
            return Err(FsError::InvalidFormat);
        }

        let name_len = if file_type {
            u16::from(raw[6])
        } else {
            le_u16(raw, 6)
        };
        let record = Self {
            inode: le_u32(raw, 0),
            rec_len: le_u16(raw, 4),
            name_len,
        };

        let rec_len = usize::from(record.rec_len);
        if rec_len < Self::HEADER_SIZE
            || rec_len % 4 != 0
            || rec_len > raw.len()
            || Self::HEADER_SIZE + usize::from(name_len) > rec_len
        {
            return Err(FsError::InvalidFormat);
        }
        Ok(record)
    }

    pub fn name<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        &raw[Self::HEADER_SIZE..Self::HEADER_SIZE + usize::from(self.name_len)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn superblock(log_block_size: u32, rev: u32) -> [u8; 1024] {
        let mut raw = [0u8; 1024];
        raw[0..4].copy_from_slice(&32u32.to_le_bytes());
        raw[4..8].copy_from_slice(&64u32.to_le_bytes());
        raw[20..24].copy_from_slice(&1u32.to_le_bytes());
        raw[24..28].copy_from_slice(&log_block_size.to_le_bytes());
        raw[32..36].copy_from_slice(&8192u32.to_le_bytes());
        raw[40..44].copy_from_slice(&32u32.to_le_bytes());
        raw[56..58].copy_from_slice(&EXT2_MAGIC.to_le_bytes());
        raw[76..80].copy_from_slice(&rev.to_le_bytes());
        raw[88..90].copy_from_slice(&256u16.to_le_bytes());
        raw[96..100].copy_from_slice(&INCOMPAT_FILETYPE.to_le_bytes());
        raw
    }

    #[test]
    fn revision_one_superblock() {
        let sb = Superblock::parse(&superblock(0, 1)).unwrap();
        assert_eq!(sb.block_size(), 1024);
        assert_eq!(sb.inode_size, 256);
        assert!(sb.has_file_type());
        assert_eq!(sb.unsupported_features(), 0);
        assert_eq!(sb.group_count(), 1);
        assert_eq!(sb.descriptor_table_block(), 2);
    }

    #[test]
    fn revision_zero_ignores_extended_fields() {
        let sb = Superblock::parse(&superblock(2, 0)).unwrap();
        assert_eq!(sb.block_size(), 4096);
        assert_eq!(sb.inode_size, 128);
        assert!(!sb.has_file_type());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut raw = superblock(0, 1);
        raw[56] = 0;
        assert_eq!(Superblock::parse(&raw), Err(FsError::InvalidFormat));
    }

    #[test]
    fn inode_kind_and_size() {
        let mut raw = [0u8; 128];
        raw[0..2].copy_from_slice(&0x81A4u16.to_le_bytes());
        raw[4..8].copy_from_slice(&10u32.to_le_bytes());
        raw[40..44].copy_from_slice(&77u32.to_le_bytes());
        raw[108..112].copy_from_slice(&1u32.to_le_bytes());

        let inode = Inode::parse(&raw, false);
        assert_eq!(inode.kind(), InodeKind::File);
        assert_eq!(inode.size, 10);
        assert_eq!(inode.block[0], 77);

        assert_eq!(Inode::parse(&raw, true).size, (1 << 32) + 10);
    }

    #[test]
    fn dir_record_bounds_are_checked() {
        let mut raw = [0u8; 16];
        raw[0..4].copy_from_slice(&12u32.to_le_bytes());
        raw[4..6].copy_from_slice(&16u16.to_le_bytes());
        raw[6] = 5;
        raw[8..13].copy_from_slice(b"hello");

        let record = DirRecord::parse(&raw, true).unwrap();
        assert_eq!(record.inode, 12);
        assert_eq!(record.name(&raw), b"hello");

        raw[4..6].copy_from_slice(&32u16.to_le_bytes());
        assert_eq!(DirRecord::parse(&raw, true), Err(FsError::InvalidFormat));
    }
}

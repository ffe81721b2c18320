use core::fmt;

use crate::fs::{FsError, le_u16, le_u32};

const BPB_BYTES_PER_SECTOR: usize = 0x0B;
const BPB_SECTORS_PER_CLUSTER: usize = 0x0D;
const BPB_RESERVED_SECTORS: usize = 0x0E;
const BPB_FAT_COUNT: usize = 0x10;
const BPB_ROOT_ENTRIES: usize = 0x11;
const BPB_TOTAL_SECTORS_16: usize = 0x13;
const BPB_SECTORS_PER_FAT_16: usize = 0x16;
const BPB_TOTAL_SECTORS_32: usize = 0x20;
const BPB_SECTORS_PER_FAT_32: usize = 0x24;
const BPB_ROOT_CLUSTER: usize = 0x2C;
const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

/// Size of a short directory entry
pub const DIR_ENTRY_SIZE: usize = 32;

/// Cluster counts below these are FAT12 and FAT16 respectively
const FAT12_MAX_CLUSTERS: u32 = 4085;
const FAT16_MAX_CLUSTERS: u32 = 65525;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    fn classify(cluster_count: u32) -> Self {
        if cluster_count < FAT12_MAX_CLUSTERS {
            FatType::Fat12
        } else if cluster_count < FAT16_MAX_CLUSTERS {
            FatType::Fat16
        } else {
            FatType::Fat32
        }
    }
}

impl fmt::Display for FatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatType::Fat12 => write!(f, "FAT12"),
            FatType::Fat16 => write!(f, "FAT16"),
            FatType::Fat32 => write!(f, "FAT32"),
        }
    }
}

/// What a FAT entry says about the cluster after the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatEntry {
    Free,
    Next(u32),
    Bad,
    EndOfChain,
}

/// Volume geometry decoded from the BIOS parameter block
///
/// All sector numbers are relative to the start of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatInfo {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_entries: u16,
    pub total_sectors: u32,
    pub sectors_per_fat: u32,
    /// First cluster of the root directory, 0 when it lives in the fixed root region
    pub root_cluster: u32,
    pub cluster_count: u32,
    pub fat_type: FatType,
}

impl FatInfo {
    /// Decode the boot sector of a FAT volume.
    pub fn parse(sector: &[u8]) -> Result<Self, FsError> {
        if sector.len() < 512 || sector[BOOT_SIGNATURE_OFFSET..][..2] != [0x55, 0xAA] {
            return Err(FsError::InvalidFormat);
        }

        let bytes_per_sector = le_u16(sector, BPB_BYTES_PER_SECTOR);
        let sectors_per_cluster = sector[BPB_SECTORS_PER_CLUSTER];
        let reserved_sectors = le_u16(sector, BPB_RESERVED_SECTORS);
        let fat_count = sector[BPB_FAT_COUNT];
        let root_entries = le_u16(sector, BPB_ROOT_ENTRIES);

        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096)
            || !sectors_per_cluster.is_power_of_two()
            || reserved_sectors == 0
            || fat_count == 0
        {
            return Err(FsError::InvalidFormat);
        }

        let total_sectors = match le_u16(sector, BPB_TOTAL_SECTORS_16) {
            0 => le_u32(sector, BPB_TOTAL_SECTORS_32),
            n => u32::from(n),
        };
        let sectors_per_fat = match le_u16(sector, BPB_SECTORS_PER_FAT_16) {
            0 => le_u32(sector, BPB_SECTORS_PER_FAT_32),
            n => u32::from(n),
        };
        if sectors_per_fat == 0 {
            return Err(FsError::InvalidFormat);
        }

        let root_dir_sectors = (u32::from(root_entries) * DIR_ENTRY_SIZE as u32)
            .div_ceil(u32::from(bytes_per_sector));
        let data_start = u64::from(reserved_sectors)
            + u64::from(fat_count) * u64::from(sectors_per_fat)
            + u64::from(root_dir_sectors);
        let data_sectors = u64::from(total_sectors)
            .checked_sub(data_start)
            .ok_or(FsError::InvalidFormat)?;
        // bounded by total_sectors
        let cluster_count = (data_sectors / u64::from(sectors_per_cluster)) as u32;

        let fat_type = FatType::classify(cluster_count);
        let root_cluster = match fat_type {
            FatType::Fat32 => le_u32(sector, BPB_ROOT_CLUSTER),
            FatType::Fat12 | FatType::Fat16 => 0,
        };
        if fat_type == FatType::Fat32 && root_entries != 0 {
            return Err(FsError::InvalidFormat);
        }

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            root_entries,
            total_sectors,
            sectors_per_fat,
            root_cluster,
            cluster_count,
            fat_type,
        })
    }

    pub fn cluster_size(&self) -> usize {
        usize::from(self.bytes_per_sector) * usize::from(self.sectors_per_cluster)
    }

    pub fn fat_start(&self) -> u64 {
        u64::from(self.reserved_sectors)
    }

    pub fn root_dir_start(&self) -> u64 {
        self.fat_start() + u64::from(self.fat_count) * u64::from(self.sectors_per_fat)
    }

    pub fn root_dir_sectors(&self) -> u64 {
        (u64::from(self.root_entries) * DIR_ENTRY_SIZE as u64)
            .div_ceil(u64::from(self.bytes_per_sector))
    }

    pub fn data_start(&self) -> u64 {
        self.root_dir_start() + self.root_dir_sectors()
    }

    /// Whether `cluster` addresses the data region
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster - 2 < self.cluster_count
    }

    /// First sector of a data cluster
    pub fn cluster_sector(&self, cluster: u32) -> u64 {
        self.data_start() + u64::from(cluster - 2) * u64::from(self.sectors_per_cluster)
    }

    /// Byte offset of the FAT entry for `cluster`, from the start of the first FAT
    pub fn fat_offset(&self, cluster: u32) -> u64 {
        let cluster = u64::from(cluster);
        match self.fat_type {
            FatType::Fat12 => cluster + cluster / 2,
            FatType::Fat16 => cluster * 2,
            FatType::Fat32 => cluster * 4,
        }
    }

    /// Width in bytes of the raw value read at [`fat_offset`](Self::fat_offset)
    pub fn fat_entry_width(&self) -> usize {
        match self.fat_type {
            FatType::Fat12 | FatType::Fat16 => 2,
            FatType::Fat32 => 4,
        }
    }

    /// Decode the raw bytes of the FAT entry for `cluster`
    pub fn decode_entry(&self, cluster: u32, raw: &[u8]) -> FatEntry {
        let (value, bad) = match self.fat_type {
            FatType::Fat12 => {
                let pair = u32::from(le_u16(raw, 0));
                let value = if cluster & 1 == 1 { pair >> 4 } else { pair & 0x0FFF };
                (value, 0x0FF7)
            }
            FatType::Fat16 => (u32::from(le_u16(raw, 0)), 0xFFF7),
            FatType::Fat32 => (le_u32(raw, 0) & 0x0FFF_FFFF, 0x0FFF_FFF7),
        };

        match value {
            0 => FatEntry::Free,
            v if v == bad => FatEntry::Bad,
            v if v > bad => FatEntry::EndOfChain,
            v => FatEntry::Next(v),
        }
    }
}

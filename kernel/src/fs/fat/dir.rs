use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;

use super::FatFs;
use super::volume::DIR_ENTRY_SIZE;
use crate::fs::{DirEntry, EntryKind, FsError, le_u16, le_u32};

bitflags! {
    /// Attribute byte of a short directory entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FatAttributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Marks a long file name fragment
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
    }
}

const END_OF_DIRECTORY: u8 = 0x00;
const DELETED: u8 = 0xE5;
/// A leading 0x05 stands for a real 0xE5 byte
const KANJI_E5: u8 = 0x05;

/// Case bits in the reserved byte written by Windows NT
const NT_LOWER_BASE: u8 = 0x08;
const NT_LOWER_EXT: u8 = 0x10;

/// One 32-byte slot of a directory
#[derive(Debug, PartialEq, Eq)]
pub enum RawEntry {
    EndOfDirectory,
    /// Deleted, long name, volume label or a dot entry
    Skipped,
    Entry(DirEntry),
}

impl RawEntry {
    pub fn parse(raw: &[u8]) -> Self {
        match raw[0] {
            END_OF_DIRECTORY => return RawEntry::EndOfDirectory,
            DELETED => return RawEntry::Skipped,
            _ => {}
        }

        let attributes = FatAttributes::from_bits_retain(raw[0x0B]);
        if attributes.contains(FatAttributes::LONG_NAME)
            || attributes.contains(FatAttributes::VOLUME_ID)
        {
            return RawEntry::Skipped;
        }

        let name = short_name(&raw[..11], raw[0x0C]);
        if name == "." || name == ".." {
            return RawEntry::Skipped;
        }

        let cluster = (u32::from(le_u16(raw, 0x14)) << 16) | u32::from(le_u16(raw, 0x1A));
        let (kind, size) = if attributes.contains(FatAttributes::DIRECTORY) {
            (EntryKind::Directory, 0)
        } else {
            (EntryKind::File, u64::from(le_u32(raw, 0x1C)))
        };

        RawEntry::Entry(DirEntry {
            name,
            kind,
            size,
            node: u64::from(cluster),
        })
    }
}

/// Render an 8.3 name as `BASE.EXT`
fn short_name(raw: &[u8], case_bits: u8) -> String {
    let mut base = [0u8; 8];
    base.copy_from_slice(&raw[..8]);
    if base[0] == KANJI_E5 {
        base[0] = DELETED;
    }

    let mut name = String::with_capacity(12);
    push_part(&mut name, &base, case_bits & NT_LOWER_BASE != 0);

    let ext = &raw[8..11];
    if ext.iter().any(|&b| b != b' ') {
        name.push('.');
        push_part(&mut name, ext, case_bits & NT_LOWER_EXT != 0);
    }
    name
}

fn push_part(name: &mut String, part: &[u8], lower: bool) {
    let end = part.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    for &byte in &part[..end] {
        let byte = if lower { byte.to_ascii_lowercase() } else { byte };
        name.push(char::from(byte));
    }
}

/// Where the entries of a directory live
enum Region {
    /// The fixed root directory of FAT12/16
    Fixed { next: u64, end: u64 },
    /// A cluster chain
    Chain {
        cluster: Option<u32>,
        sector: u8,
        visited: u32,
    },
}

/// Lazy directory listing, one sector in memory at a time
pub struct FatDirIter<'a> {
    fs: &'a FatFs,
    region: Region,
    sector: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<'a> FatDirIter<'a> {
    pub(super) fn root(fs: &'a FatFs) -> Self {
        let info = fs.info();
        let region = if info.root_cluster == 0 {
            Region::Fixed {
                next: info.root_dir_start(),
                end: info.data_start(),
            }
        } else {
            Region::Chain {
                cluster: Some(info.root_cluster),
                sector: 0,
                visited: 0,
            }
        };
        Self::new(fs, region)
    }

    pub(super) fn chain(fs: &'a FatFs, first_cluster: u32) -> Self {
        Self::new(
            fs,
            Region::Chain {
                cluster: Some(first_cluster),
                sector: 0,
                visited: 0,
            },
        )
    }

    fn new(fs: &'a FatFs, region: Region) -> Self {
        let sector_size = usize::from(fs.info().bytes_per_sector);
        Self {
            fs,
            region,
            sector: vec![0u8; sector_size],
            pos: sector_size,
            done: false,
        }
    }

    /// Load the next sector of the directory, `false` once it is exhausted
    fn load_next(&mut self) -> Result<bool, FsError> {
        let info = *self.fs.info();
        let lba = match &mut self.region {
            Region::Fixed { next, end } => {
                if *next >= *end {
                    return Ok(false);
                }
                *next += 1;
                *next - 1
            }
            Region::Chain {
                cluster,
                sector,
                visited,
            } => {
                if *sector == info.sectors_per_cluster {
                    if let Some(current) = *cluster {
                        *cluster = self.fs.next_cluster(current)?;
                    }
                    *sector = 0;
                    *visited += 1;
                    if *visited > info.cluster_count {
                        return Err(FsError::InvalidFormat);
                    }
                }
                let Some(current) = *cluster else {
                    return Ok(false);
                };
                if !info.is_data_cluster(current) {
                    return Err(FsError::InvalidFormat);
                }
                *sector += 1;
                info.cluster_sector(current) + u64::from(*sector - 1)
            }
        };

        self.fs.read_sector(lba, &mut self.sector)?;
        self.pos = 0;
        Ok(true)
    }
}

impl Iterator for FatDirIter<'_> {
    type Item = Result<DirEntry, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.pos + DIR_ENTRY_SIZE > self.sector.len() {
                match self.load_next() {
                    Ok(true) => {}
                    Ok(false) => self.done = true,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
                continue;
            }

            let entry = RawEntry::parse(&self.sector[self.pos..self.pos + DIR_ENTRY_SIZE]);
            self.pos += DIR_ENTRY_SIZE;
            match entry {
                RawEntry::EndOfDirectory => self.done = true,
                RawEntry::Skipped => {}
                RawEntry::Entry(entry) => return Some(Ok(entry)),
            }
        }
        None
    }
}

//! Read-only FAT12/16/32 driver
//!
//! The volume is located through the BIOS parameter block in sector 0.
//! Directories are listed lazily and files are read by walking the
//! cluster chain in the first FAT; the other FAT copies are ignored.
//! Only short (8.3) names are reported.

mod dir;
mod volume;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;

use drivers::BlockDevice;
use log::{debug, info, warn};

pub use dir::{FatAttributes, FatDirIter};
pub use volume::{FatEntry, FatInfo, FatType};

use crate::fs::dispatch::FsDriver;
use crate::fs::{DirEntry, DirIter, EntryKind, FileHandle, FileSystem, FsError, OpenMode};

/// Name shared by the driver and its filesystem instances
pub const DRIVER_NAME: &str = "fat";

/// A mounted FAT volume
pub struct FatFs {
    device: Arc<dyn BlockDevice>,
    info: FatInfo,
}

impl FatFs {
    /// Probe `device` for a FAT volume.
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self, FsError> {
        let block_size = device.block_size();
        if block_size < 512 {
            warn!(
                "{}: block size {} too small for FAT",
                device.device_name(),
                block_size
            );
            return Err(FsError::InvalidFormat);
        }

        let mut sector = vec![0u8; block_size];
        device.read_exact(&mut sector, 0)?;
        let info = FatInfo::parse(&sector).inspect_err(|_| {
            debug!("{}: no FAT boot sector", device.device_name());
        })?;

        if usize::from(info.bytes_per_sector) != block_size {
            warn!(
                "{}: FAT sector size {} does not match block size {}",
                device.device_name(),
                info.bytes_per_sector,
                block_size
            );
            return Err(FsError::InvalidFormat);
        }

        info!(
            "{}: {} volume, {} clusters of {} bytes",
            device.device_name(),
            info.fat_type,
            info.cluster_count,
            info.cluster_size()
        );
        Ok(Self { device, info })
    }

    pub fn info(&self) -> &FatInfo {
        &self.info
    }

    pub fn fat_type(&self) -> FatType {
        self.info.fat_type
    }

    pub(crate) fn read_sector(&self, lba: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.device.read_exact(buf, lba)?;
        Ok(())
    }

    /// Raw FAT entry of `cluster`
    pub fn fat_entry(&self, cluster: u32) -> Result<FatEntry, FsError> {
        let sector_size = u64::from(self.info.bytes_per_sector);
        let offset = self.info.fat_offset(cluster);

        // FAT12 entries may straddle two sectors
        let mut raw = [0u8; 4];
        let mut sector = vec![0u8; sector_size as usize];
        let mut loaded = None;
        for (i, byte) in raw[..self.info.fat_entry_width()].iter_mut().enumerate() {
            let pos = offset + i as u64;
            let lba = self.info.fat_start() + pos / sector_size;
            if loaded != Some(lba) {
                self.read_sector(lba, &mut sector)?;
                loaded = Some(lba);
            }
            *byte = sector[(pos % sector_size) as usize];
        }

        Ok(self.info.decode_entry(cluster, &raw))
    }

    /// Cluster following `cluster` in its chain, `None` at the end
    pub fn next_cluster(&self, cluster: u32) -> Result<Option<u32>, FsError> {
        if !self.info.is_data_cluster(cluster) {
            return Err(FsError::InvalidFormat);
        }

        match self.fat_entry(cluster)? {
            FatEntry::Next(next) if self.info.is_data_cluster(next) => Ok(Some(next)),
            FatEntry::EndOfChain => Ok(None),
            entry => {
                warn!(
                    "{}: broken cluster chain at {} ({:?})",
                    self.device.device_name(),
                    cluster,
                    entry
                );
                Err(FsError::InvalidFormat)
            }
        }
    }

    /// Follow the chain starting at `first` for `hops` links
    fn nth_cluster(&self, first: u32, hops: u64) -> Result<u32, FsError> {
        let mut cluster = first;
        for _ in 0..hops {
            cluster = self.next_cluster(cluster)?.ok_or(FsError::InvalidFormat)?;
        }
        Ok(cluster)
    }
}

impl FileSystem for FatFs {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn device(&self) -> &Arc<dyn BlockDevice> {
        &self.device
    }

    fn root(&self) -> DirEntry {
        DirEntry {
            name: "/".into(),
            kind: EntryKind::Directory,
            size: 0,
            node: u64::from(self.info.root_cluster),
        }
    }

    fn entries(&self, dir: &DirEntry) -> Result<DirIter<'_>, FsError> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }

        // ".." entries pointing at the root store cluster 0
        let cluster = u32::try_from(dir.node).map_err(|_| FsError::InvalidFormat)?;
        if cluster == 0 || cluster == self.info.root_cluster {
            return Ok(Box::new(FatDirIter::root(self)));
        }
        Ok(Box::new(FatDirIter::chain(self, cluster)))
    }

    fn open(&self, entry: &DirEntry, mode: OpenMode) -> Result<FileHandle, FsError> {
        if mode != OpenMode::Read {
            return Err(FsError::PermissionDenied);
        }
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        Ok(FileHandle::new(entry.clone()))
    }

    fn read(&self, file: &mut FileHandle, buf: &mut [u8]) -> Result<usize, FsError> {
        if file.entry().is_dir() {
            return Err(FsError::IsADirectory);
        }

        let wanted = (buf.len() as u64).min(file.remaining()) as usize;
        if wanted == 0 {
            return Ok(0);
        }

        let first = u32::try_from(file.entry().node).map_err(|_| FsError::InvalidFormat)?;
        let sector_size = u64::from(self.info.bytes_per_sector);
        let cluster_size = self.info.cluster_size() as u64;

        let mut position = file.position();
        let mut cluster = self.nth_cluster(first, position / cluster_size)?;
        if !self.info.is_data_cluster(cluster) {
            return Err(FsError::InvalidFormat);
        }

        let mut sector = vec![0u8; sector_size as usize];
        let mut done = 0;
        while done < wanted {
            let in_cluster = position % cluster_size;
            let lba = self.info.cluster_sector(cluster) + in_cluster / sector_size;
            self.read_sector(lba, &mut sector)?;

            let offset = (in_cluster % sector_size) as usize;
            let n = (sector.len() - offset).min(wanted - done);
            buf[done..done + n].copy_from_slice(&sector[offset..offset + n]);
            done += n;
            position += n as u64;

            if done < wanted && position % cluster_size == 0 {
                cluster = self.next_cluster(cluster)?.ok_or(FsError::InvalidFormat)?;
            }
        }

        file.advance(done);
        Ok(done)
    }

    fn case_sensitive(&self) -> bool {
        false
    }
}

/// Initializer for the FAT family of partition types
pub struct FatDriver;

impl FsDriver for FatDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn init(&self, device: Arc<dyn BlockDevice>) -> Result<Arc<dyn FileSystem>, FsError> {
        Ok(Arc::new(FatFs::mount(device)?))
    }
}

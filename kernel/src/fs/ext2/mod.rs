//! Read-only ext2 driver
//!
//! Inodes are found through the block group descriptor table and file
//! data through the classic direct/indirect block map. Holes read as
//! zeros.

mod layout;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use drivers::BlockDevice;
use log::{debug, info, warn};

pub use layout::{Inode, InodeKind, ROOT_INODE, Superblock};
use layout::{
    DIRECT_BLOCKS, DOUBLE_INDIRECT, DirRecord, GROUP_DESCRIPTOR_SIZE, SINGLE_INDIRECT,
    SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE, TRIPLE_INDIRECT,
};

use crate::fs::dispatch::FsDriver;
use crate::fs::{
    DirEntry, DirIter, EntryKind, FileHandle, FileSystem, FsError, OpenMode, le_u32,
};

pub const DRIVER_NAME: &str = "ext2";

/// Read `out.len()` bytes at a byte offset, whatever the device block size
fn read_bytes(device: &dyn BlockDevice, offset: u64, out: &mut [u8]) -> Result<(), FsError> {
    let block_size = device.block_size() as u64;
    let first = offset / block_size;
    let end = (offset + out.len() as u64).div_ceil(block_size);

    let mut blocks = vec![0u8; ((end - first) * block_size) as usize];
    device.read_exact(&mut blocks, first)?;

    let skip = (offset - first * block_size) as usize;
    out.copy_from_slice(&blocks[skip..skip + out.len()]);
    Ok(())
}

/// A mounted ext2 filesystem
pub struct Ext2Fs {
    device: Arc<dyn BlockDevice>,
    superblock: Superblock,
}

impl Ext2Fs {
    /// Probe `device` for an ext2 superblock.
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<Self, FsError> {
        if device.block_size() == 0 {
            return Err(FsError::InvalidFormat);
        }

        let mut raw = [0u8; SUPERBLOCK_SIZE];
        read_bytes(device.as_ref(), SUPERBLOCK_OFFSET, &mut raw)?;
        let superblock = Superblock::parse(&raw).inspect_err(|_| {
            debug!("{}: no ext2 superblock", device.device_name());
        })?;

        let unsupported = superblock.unsupported_features();
        if unsupported != 0 {
            warn!(
                "{}: unsupported ext2 features {:#x}",
                device.device_name(),
                unsupported
            );
            return Err(FsError::NotSupported);
        }

        if superblock.block_size() % device.block_size() != 0 {
            warn!(
                "{}: ext2 block size {} is not a multiple of device block size {}",
                device.device_name(),
                superblock.block_size(),
                device.block_size()
            );
            return Err(FsError::InvalidFormat);
        }

        let fs = Self { device, superblock };
        if fs.read_inode(ROOT_INODE)?.kind() != InodeKind::Directory {
            warn!("{}: ext2 root inode is not a directory", fs.device.device_name());
            return Err(FsError::InvalidFormat);
        }

        info!(
            "{}: ext2 revision {}, {} blocks of {} bytes, {} inodes",
            fs.device.device_name(),
            fs.superblock.rev_level,
            fs.superblock.blocks_count,
            fs.superblock.block_size(),
            fs.superblock.inodes_count
        );
        Ok(fs)
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    fn block_size(&self) -> usize {
        self.superblock.block_size()
    }

    fn read_block(&self, block: u32, buf: &mut [u8]) -> Result<(), FsError> {
        let per_block = (self.block_size() / self.device.block_size()) as u64;
        self.device.read_exact(buf, u64::from(block) * per_block)?;
        Ok(())
    }

    /// Read the inode numbered `ino`
    pub fn read_inode(&self, ino: u32) -> Result<Inode, FsError> {
        if ino == 0 || ino > self.superblock.inodes_count {
            return Err(FsError::NotFound);
        }

        let group = (ino - 1) / self.superblock.inodes_per_group;
        let index = (ino - 1) % self.superblock.inodes_per_group;
        if group >= self.superblock.group_count() {
            return Err(FsError::InvalidFormat);
        }

        let block_size = self.block_size() as u64;
        let descriptor = u64::from(self.superblock.descriptor_table_block()) * block_size
            + u64::from(group) * GROUP_DESCRIPTOR_SIZE;
        let mut raw = [0u8; GROUP_DESCRIPTOR_SIZE as usize];
        read_bytes(self.device.as_ref(), descriptor, &mut raw)?;
        let inode_table = le_u32(&raw, 8);

        let offset = u64::from(inode_table) * block_size
            + u64::from(index) * u64::from(self.superblock.inode_size);
        let mut raw = [0u8; 128];
        read_bytes(self.device.as_ref(), offset, &mut raw)?;
        Ok(Inode::parse(&raw, self.superblock.has_large_files()))
    }

    /// Physical block holding logical block `index` of `inode`, 0 for a hole
    pub fn map_block(&self, inode: &Inode, index: u64) -> Result<u32, FsError> {
        let per_block = (self.block_size() / 4) as u64;

        let mut index = index;
        if index < DIRECT_BLOCKS as u64 {
            return Ok(inode.block[index as usize]);
        }
        index -= DIRECT_BLOCKS as u64;

        if index < per_block {
            return self.indirect(inode.block[SINGLE_INDIRECT], index);
        }
        index -= per_block;

        if index < per_block * per_block {
            let level1 = self.indirect(inode.block[DOUBLE_INDIRECT], index / per_block)?;
            return self.indirect(level1, index % per_block);
        }
        index -= per_block * per_block;

        if index < per_block * per_block * per_block {
            let level1 =
                self.indirect(inode.block[TRIPLE_INDIRECT], index / (per_block * per_block))?;
            let level2 = self.indirect(level1, (index / per_block) % per_block)?;
            return self.indirect(level2, index % per_block);
        }
        Err(FsError::InvalidFormat)
    }

    fn indirect(&self, block: u32, slot: u64) -> Result<u32, FsError> {
        if block == 0 {
            return Ok(0);
        }
        let mut raw = [0u8; 4];
        read_bytes(
            self.device.as_ref(),
            u64::from(block) * self.block_size() as u64 + slot * 4,
            &mut raw,
        )?;
        Ok(u32::from_le_bytes(raw))
    }

    fn directory_inode(&self, dir: &DirEntry) -> Result<Inode, FsError> {
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let ino = u32::try_from(dir.node).map_err(|_| FsError::NotFound)?;
        let inode = self.read_inode(ino)?;
        if inode.kind() != InodeKind::Directory {
            return Err(FsError::NotADirectory);
        }
        Ok(inode)
    }
}

fn entry_kind(kind: InodeKind) -> EntryKind {
    match kind {
        InodeKind::File => EntryKind::File,
        InodeKind::Directory => EntryKind::Directory,
        InodeKind::Other => EntryKind::Other,
    }
}

/// Lazy directory listing, one filesystem block in memory at a time
pub struct Ext2DirIter<'a> {
    fs: &'a Ext2Fs,
    inode: Inode,
    next_block: u64,
    block: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<'a> Ext2DirIter<'a> {
    fn new(fs: &'a Ext2Fs, inode: Inode) -> Self {
        let block_size = fs.block_size();
        Self {
            fs,
            inode,
            next_block: 0,
            block: vec![0u8; block_size],
            pos: block_size,
            done: false,
        }
    }

    /// Load the next mapped block, `false` past the end of the directory
    fn load_next(&mut self) -> Result<bool, FsError> {
        let block_size = self.block.len() as u64;
        loop {
            if self.next_block * block_size >= self.inode.size {
                return Ok(false);
            }
            let physical = self.fs.map_block(&self.inode, self.next_block)?;
            self.next_block += 1;
            if physical != 0 {
                self.fs.read_block(physical, &mut self.block)?;
                self.pos = 0;
                return Ok(true);
            }
        }
    }

    fn next_entry(&mut self) -> Result<Option<DirEntry>, FsError> {
        loop {
            if self.pos >= self.block.len() && !self.load_next()? {
                return Ok(None);
            }

            let raw = &self.block[self.pos..];
            let record = DirRecord::parse(raw, self.fs.superblock.has_file_type())?;
            self.pos += usize::from(record.rec_len);

            let name = record.name(raw);
            if record.inode == 0 || name == b"." || name == b".." {
                continue;
            }

            let name = String::from_utf8_lossy(name).into_owned();
            let inode = self.fs.read_inode(record.inode)?;
            return Ok(Some(DirEntry {
                name,
                kind: entry_kind(inode.kind()),
                size: inode.size,
                node: u64::from(record.inode),
            }));
        }
    }
}

impl Iterator for Ext2DirIter<'_> {
    type Item = Result<DirEntry, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FileSystem for Ext2Fs {
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
            node: u64::from(ROOT_INODE),
        }
    }

    fn entries(&self, dir: &DirEntry) -> Result<DirIter<'_>, FsError> {
        let inode = self.directory_inode(dir)?;
        Ok(Box::new(Ext2DirIter::new(self, inode)))
    }

    fn open(&self, entry: &DirEntry, mode: OpenMode) -> Result<FileHandle, FsError> {
        if mode != OpenMode::Read {
            return Err(FsError::PermissionDenied);
        }
        match entry.kind {
            EntryKind::Directory => Err(FsError::IsADirectory),
            EntryKind::Other => Err(FsError::NotSupported),
            EntryKind::File => Ok(FileHandle::new(entry.clone())),
        }
    }

    fn read(&self, file: &mut FileHandle, buf: &mut [u8]) -> Result<usize, FsError> {
        if file.entry().is_dir() {
            return Err(FsError::IsADirectory);
        }

        let wanted = (buf.len() as u64).min(file.remaining()) as usize;
        if wanted == 0 {
            return Ok(0);
        }

        let ino = u32::try_from(file.entry().node).map_err(|_| FsError::NotFound)?;
        let inode = self.read_inode(ino)?;
        let block_size = self.block_size() as u64;

        let mut position = file.position();
        let mut block = vec![0u8; self.block_size()];
        let mut done = 0;
        while done < wanted {
            let offset = (position % block_size) as usize;
            let n = (block.len() - offset).min(wanted - done);

            match self.map_block(&inode, position / block_size)? {
                0 => buf[done..done + n].fill(0),
                physical => {
                    self.read_block(physical, &mut block)?;
                    buf[done..done + n].copy_from_slice(&block[offset..offset + n]);
                }
            }
            done += n;
            position += n as u64;
        }

        file.advance(done);
        Ok(done)
    }
}

/// Initializer for Linux native partitions
pub struct Ext2Driver;

impl FsDriver for Ext2Driver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn init(&self, device: Arc<dyn BlockDevice>) -> Result<Arc<dyn FileSystem>, FsError> {
        Ok(Arc::new(Ext2Fs::mount(device)?))
    }
}

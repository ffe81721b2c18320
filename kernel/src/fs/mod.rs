use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use drivers::{BlockDevice, BlockDeviceError};

pub mod dispatch;
#[cfg(feature = "ext2")]
pub mod ext2;
#[cfg(feature = "fat")]
pub mod fat;
pub mod file;
pub mod mbr;
pub mod vfs;

pub use file::{DirEntry, EntryKind, FileHandle, OpenMode};

/// Lazily produced directory listing
pub type DirIter<'a> = Box<dyn Iterator<Item = Result<DirEntry, FsError>> + 'a>;

/// Filesystem errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    NotADirectory,
    IsADirectory,
    AlreadyExists,
    /// On-disk structures are missing or inconsistent
    InvalidFormat,
    NotSupported,
    PermissionDenied,
    Io(BlockDeviceError),
}

/// Little-endian field accessors for on-disk structures
#[cfg(any(feature = "fat", feature = "ext2"))]
pub(crate) fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[cfg(any(feature = "fat", feature = "ext2"))]
pub(crate) fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl From<BlockDeviceError> for FsError {
    fn from(err: BlockDeviceError) -> Self {
        FsError::Io(err)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => write!(f, "no such file or directory"),
            FsError::NotADirectory => write!(f, "not a directory"),
            FsError::IsADirectory => write!(f, "is a directory"),
            FsError::AlreadyExists => write!(f, "already exists"),
            FsError::InvalidFormat => write!(f, "invalid on-disk format"),
            FsError::NotSupported => write!(f, "operation not supported"),
            FsError::PermissionDenied => write!(f, "permission denied"),
            FsError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

/// A mounted filesystem instance.
///
/// Each instance sits on exactly one block device. Files are reached
/// through directory entries: list a directory, pick an entry, open it,
/// read from the handle, close it.
pub trait FileSystem: Send + Sync {
    /// Name of the driver that created this instance
    fn name(&self) -> &str;

    /// The block device this filesystem lives on
    fn device(&self) -> &Arc<dyn BlockDevice>;

    /// Entry describing the root directory
    fn root(&self) -> DirEntry;

    /// List the entries of `dir`, one at a time
    fn entries(&self, dir: &DirEntry) -> Result<DirIter<'_>, FsError>;

    /// Open the file described by `entry`
    fn open(&self, entry: &DirEntry, mode: OpenMode) -> Result<FileHandle, FsError>;

    /// Read from the current position of `file`, advancing it
    fn read(&self, file: &mut FileHandle, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Close a handle returned by `open`
    fn close(&self, file: FileHandle) -> Result<(), FsError> {
        drop(file);
        Ok(())
    }

    /// Whether names must match exactly on lookup
    fn case_sensitive(&self) -> bool {
        true
    }

    /// Resolve a `/`-separated path relative to the root.
    fn lookup(&self, path: &str) -> Result<DirEntry, FsError> {
        let mut current = self.root();

        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            if !current.is_dir() {
                return Err(FsError::NotADirectory);
            }

            let mut found = None;
            for entry in self.entries(&current)? {
                let entry = entry?;
                let matches = if self.case_sensitive() {
                    entry.name == component
                } else {
                    entry.name.eq_ignore_ascii_case(component)
                };
                if matches {
                    found = Some(entry);
                    break;
                }
            }
            current = found.ok_or(FsError::NotFound)?;
        }

        Ok(current)
    }

    /// List the directory at `path`
    fn read_directory(&self, path: &str) -> Result<DirIter<'_>, FsError> {
        let dir = self.lookup(path)?;
        if !dir.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.entries(&dir)
    }
}

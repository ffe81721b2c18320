use alloc::string::String;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, device nodes and anything else that is not plain data
    Other,
}

/// A directory entry as produced by a filesystem listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes
    pub size: u64,
    /// Driver-specific location (first cluster for FAT, inode for ext2)
    pub node: u64,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Open mode for files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    /// Parse a C-style mode string (`"r"`, `"rb"`, `"w"`, `"a+"`, ...)
    pub fn from_mode_str(mode: &str) -> Option<Self> {
        match mode.trim_end_matches(['b', '+']) {
            "r" => Some(OpenMode::Read),
            "w" => Some(OpenMode::Write),
            "a" => Some(OpenMode::Append),
            _ => None,
        }
    }
}

/// An open file
///
/// Handles are plain values: the filesystem that opened one keeps no
/// per-handle state, so dropping a handle is enough to release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    entry: DirEntry,
    position: u64,
}

impl FileHandle {
    pub fn new(entry: DirEntry) -> Self {
        Self { entry, position: 0 }
    }

    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> u64 {
        self.entry.size
    }

    /// Bytes left between the position and the end of the file
    pub fn remaining(&self) -> u64 {
        self.entry.size.saturating_sub(self.position)
    }

    /// Move the read position, clamped to the end of the file
    pub fn seek(&mut self, position: u64) -> u64 {
        self.position = position.min(self.entry.size);
        self.position
    }

    pub(crate) fn advance(&mut self, bytes: usize) {
        self.position += bytes as u64;
    }
}

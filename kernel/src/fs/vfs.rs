use crate::fs::{DirEntry, FileSystem, FsError};

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::info;
use spin::Mutex;

/// A mount point in the VFS.
pub struct Mount {
    pub prefix: String,
    pub fs: Arc<dyn FileSystem>,
}

static VFS: VirtFS = VirtFS::new();

/// Registry of every mounted filesystem instance
pub struct VirtFS {
    mounts: Mutex<Vec<Mount>>,
}

impl VirtFS {
    pub const fn new() -> Self {
        Self {
            mounts: Mutex::new(Vec::new()),
        }
    }

    /// Register a filesystem under `/<device name>`.
    ///
    /// Registering the same instance twice is a no-op that returns the
    /// existing prefix.
    pub fn register(&self, fs: Arc<dyn FileSystem>) -> Result<String, FsError> {
        let prefix = format!("/{}", fs.device().device_name());
        let mut mounts = self.mounts.lock();

        if let Some(existing) = mounts.iter().find(|m| Arc::ptr_eq(&m.fs, &fs)) {
            return Ok(existing.prefix.clone());
        }
        if mounts.iter().any(|m| m.prefix == prefix) {
            return Err(FsError::AlreadyExists);
        }

        info!("registered {} filesystem at {}", fs.name(), prefix);
        mounts.push(Mount {
            prefix: prefix.clone(),
            fs,
        });
        Ok(prefix)
    }

    /// Mount a filesystem at a path.
    pub fn mount_fs(&self, prefix: &str, fs: Arc<dyn FileSystem>) -> Result<(), FsError> {
        let mut mounts = self.mounts.lock();

        if mounts.iter().any(|m| m.prefix == prefix) {
            return Err(FsError::AlreadyExists);
        }

        mounts.push(Mount {
            prefix: prefix.into(),
            fs,
        });

        Ok(())
    }

    /// Unmount a filesystem.
    pub fn umount(&self, prefix: &str) -> Result<Arc<dyn FileSystem>, FsError> {
        let mut mounts = self.mounts.lock();

        let idx = mounts
            .iter()
            .position(|m| m.prefix == prefix)
            .ok_or(FsError::NotFound)?;

        Ok(mounts.remove(idx).fs)
    }

    /// Prefixes of all mounts, in registration order.
    pub fn mounts(&self) -> Vec<String> {
        self.mounts.lock().iter().map(|m| m.prefix.clone()).collect()
    }

    /// The filesystem mounted exactly at `prefix`.
    pub fn filesystem(&self, prefix: &str) -> Option<Arc<dyn FileSystem>> {
        self.mounts
            .lock()
            .iter()
            .find(|m| m.prefix == prefix)
            .map(|m| m.fs.clone())
    }

    /// Find the filesystem with the longest mount prefix matching `path`.
    ///
    /// Returns the filesystem and the remainder of the path inside it.
    pub fn resolve<'p>(&self, path: &'p str) -> Result<(Arc<dyn FileSystem>, &'p str), FsError> {
        let mounts = self.mounts.lock();

        let mut best: Option<(&Mount, &'p str)> = None;

        for mount in mounts.iter() {
            if let Some(rest) = strip_mount(&mount.prefix, path) {
                match best {
                    None => best = Some((mount, rest)),
                    Some((prev, _)) if mount.prefix.len() > prev.prefix.len() => {
                        best = Some((mount, rest))
                    }
                    _ => {}
                }
            }
        }

        let (mount, rest) = best.ok_or(FsError::NotFound)?;
        Ok((mount.fs.clone(), rest))
    }

    /// Resolve `path` to a directory entry.
    pub fn lookup(&self, path: &str) -> Result<(Arc<dyn FileSystem>, DirEntry), FsError> {
        let (fs, rest) = self.resolve(path)?;
        let entry = fs.lookup(rest)?;
        Ok((fs, entry))
    }

    /// List the directory at `path`.
    pub fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let (fs, rest) = self.resolve(path)?;
        fs.read_directory(rest)?.collect()
    }
}

impl Default for VirtFS {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a mount prefix from `path` on a component boundary.
fn strip_mount<'p>(prefix: &str, path: &'p str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_start_matches('/'))
    } else {
        None
    }
}

/// Public VFS entry point
pub fn vfs() -> &'static VirtFS {
    &VFS
}

/// Register a filesystem with the process-wide VFS
pub fn vfs_register(fs: Arc<dyn FileSystem>) -> Result<String, FsError> {
    vfs().register(fs)
}

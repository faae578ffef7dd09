//! Platform-neutral filesystem core.
//!
//! Turns inode-addressed kernel requests into path-addressed tree calls and
//! tree results into attributes. The `fuser` driver is a thin layer on top.

use std::path::Path;
use std::sync::Arc;

use oerpfs_config::MountConfig;
use oerpfs_core::ObjectService;
use oerpfs_remote::XmlRpcConnection;
use tracing::{error, info};

use crate::async_bridge::{block_on, init_runtime, FuseError};
use crate::dispatch::Tree;
use crate::error::TreeError;
use crate::inode::{InodeAttr, InodeTable, ROOT_INO};
use crate::metadata::EntryKind;

/// Errors returned by filesystem operations, one per errno the driver
/// can answer with.
#[derive(Debug, PartialEq, Eq)]
pub enum FsOpError {
    /// File or directory not found.
    NotFound,
    /// Mutation of the read-only model tree.
    ReadOnly,
    /// Reading from the write-only import tree, or creating outside its
    /// root.
    PermissionDenied,
    /// Invalid argument (e.g., bad filename encoding).
    InvalidArg,
    /// Listing something that is not a directory.
    NotDir,
    /// Reading a directory as a file.
    IsDir,
    /// Store unreachable, store error or failed import.
    Io(String),
}

impl From<TreeError> for FsOpError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::NotFound(_) => FsOpError::NotFound,
            TreeError::NotADirectory(_) => FsOpError::NotDir,
            TreeError::IsADirectory(_) => FsOpError::IsDir,
            TreeError::ReadOnly(_) => FsOpError::ReadOnly,
            TreeError::PermissionDenied(_) => FsOpError::PermissionDenied,
            TreeError::Remote(_) | TreeError::Import { .. } => {
                error!("{}", e);
                FsOpError::Io(e.to_string())
            }
        }
    }
}

impl From<FuseError> for FsOpError {
    fn from(e: FuseError) -> Self {
        FsOpError::Io(e.to_string())
    }
}

/// Core filesystem logic over any object store.
pub struct OerpFsCore<S> {
    /// The tree being served.
    pub tree: Tree<S>,
    /// Inode management.
    pub inodes: InodeTable,
}

/// The filesystem as mounted: a core talking XML-RPC.
pub type OerpFs = OerpFsCore<XmlRpcConnection>;

impl OerpFsCore<XmlRpcConnection> {
    /// Build the store connection and the configured tree.
    ///
    /// Nothing is sent to the store until the first request.
    pub fn from_config(config: MountConfig) -> Result<Self, FuseError> {
        config.validate_or_err()?;
        let connection = XmlRpcConnection::new(&config)?;
        info!(
            endpoint = %connection.endpoint(),
            dbname = %config.dbname,
            tree = %config.tree_type,
            "connecting"
        );
        OerpFsCore::new(Tree::new(config.tree_type, Arc::new(connection)))
    }
}

impl<S: ObjectService> OerpFsCore<S> {
    pub fn new(tree: Tree<S>) -> Result<Self, FuseError> {
        init_runtime()?;
        Ok(OerpFsCore {
            tree,
            inodes: InodeTable::new(),
        })
    }

    /// Get the path for an inode.
    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.inodes.get_path(ino)
    }

    fn path_of(&self, ino: u64) -> Result<String, FsOpError> {
        self.get_path(ino).ok_or(FsOpError::NotFound)
    }

    /// Attributes of `path`, allocating its inode on first sight.
    fn stat_path(&self, path: &str) -> Result<InodeAttr, FsOpError> {
        let metadata = block_on(self.tree.stat(path))??.ok_or(FsOpError::NotFound)?;
        let ino = self.inodes.get_or_create(path);
        Ok(InodeAttr::from_metadata(ino, &metadata))
    }

    /// Perform a lookup operation.
    pub fn do_lookup(&self, parent: u64, name: &str) -> Result<InodeAttr, FsOpError> {
        let parent_path = self.path_of(parent)?;
        let child_path = InodeTable::child_path(&parent_path, name);
        self.stat_path(&child_path)
    }

    /// Get attributes for an inode.
    pub fn do_getattr(&self, ino: u64) -> Result<InodeAttr, FsOpError> {
        let path = self.path_of(ino)?;
        self.stat_path(&path)
    }

    /// List a directory, `.` and `..` first.
    pub fn do_readdir(&self, ino: u64) -> Result<ReadDirResult, FsOpError> {
        let path = self.path_of(ino)?;
        let listing = block_on(self.tree.list(&path))??;

        let parent_ino = self
            .inodes
            .get_ino(InodeTable::parent_path(&path))
            .unwrap_or(ROOT_INO);

        let entries = listing
            .entries()
            .map(|name| match name {
                "." => DirEntry {
                    ino,
                    name: name.to_string(),
                    kind: EntryKind::Directory,
                },
                ".." => DirEntry {
                    ino: parent_ino,
                    name: name.to_string(),
                    kind: EntryKind::Directory,
                },
                _ => DirEntry {
                    ino: self.inodes.get_or_create(&InodeTable::child_path(&path, name)),
                    name: name.to_string(),
                    kind: listing.kind(),
                },
            })
            .collect();

        Ok(ReadDirResult { ino, entries })
    }

    /// Check an inode can be opened.
    pub fn do_open(&self, ino: u64) -> Result<(), FsOpError> {
        self.path_of(ino).map(|_| ())
    }

    /// Read file content.
    pub fn do_read(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, FsOpError> {
        let path = self.path_of(ino)?;
        let offset = u64::try_from(offset).map_err(|_| FsOpError::InvalidArg)?;
        Ok(block_on(self.tree.read(&path, offset, size))??)
    }

    /// Create a new file.
    pub fn do_create(&mut self, parent: u64, name: &str) -> Result<InodeAttr, FsOpError> {
        let parent_path = self.path_of(parent)?;
        let child_path = InodeTable::child_path(&parent_path, name);
        let metadata = self.tree.create(&child_path)?;
        let ino = self.inodes.get_or_create(&child_path);
        Ok(InodeAttr::from_metadata(ino, &metadata))
    }

    /// Write file content. Returns bytes written.
    pub fn do_write(&mut self, ino: u64, offset: i64, data: &[u8]) -> Result<u32, FsOpError> {
        let path = self.path_of(ino)?;
        let offset = u64::try_from(offset).map_err(|_| FsOpError::InvalidArg)?;
        let written = self.tree.write(&path, data, offset)?;
        u32::try_from(written).map_err(|_| FsOpError::InvalidArg)
    }

    /// Flush is a no-op: nothing is written to the store before release.
    pub fn do_flush(&self, ino: u64) -> Result<(), FsOpError> {
        self.path_of(ino).map(|_| ())
    }

    /// Close a file handle. In import mode this is where the upload is
    /// committed.
    pub fn do_release(&mut self, ino: u64) -> Result<(), FsOpError> {
        let path = self.path_of(ino)?;
        Ok(block_on(self.tree.release(&path))??)
    }

    /// Handle setattr (truncate, chmod, chown, utime).
    pub fn do_setattr(&mut self, ino: u64) -> Result<InodeAttr, FsOpError> {
        let path = self.path_of(ino)?;
        let metadata = self.tree.setattr(&path)?;
        Ok(InodeAttr::from_metadata(ino, &metadata))
    }

    /// Check if an inode is known.
    pub fn do_access(&self, ino: u64) -> Result<(), FsOpError> {
        self.path_of(ino).map(|_| ())
    }

    /// Mount the filesystem and serve requests until it is unmounted.
    ///
    /// Requests are handled one at a time on the calling thread.
    #[cfg(unix)]
    pub fn mount(self, mountpoint: &Path, allow_other: bool) -> Result<(), FuseError> {
        use crate::unix_fuse::UnixFuse;
        use fuser::MountOption;

        let tree_type = self.tree.tree_type();
        let mut options = vec![
            MountOption::FSName("oerpfs".to_string()),
            MountOption::Subtype(tree_type.to_string()),
        ];
        if self.tree.is_read_only() {
            options.push(MountOption::RO);
        }
        if allow_other {
            options.push(MountOption::AllowOther);
            options.push(MountOption::AutoUnmount);
        }

        info!(tree = %tree_type, "mounting at {:?}", mountpoint);
        fuser::mount2(UnixFuse(self), mountpoint, &options)?;
        info!("unmounted {:?}", mountpoint);

        Ok(())
    }
}

/// Result from a readdir operation.
pub struct ReadDirResult {
    /// Inode of the directory being listed.
    pub ino: u64,
    /// `.`, `..`, then the children.
    pub entries: Vec<DirEntry>,
}

/// A single directory entry.
pub struct DirEntry {
    pub ino: u64,
    pub name: String,
    pub kind: EntryKind,
}

/// Convert an `InodeAttr` to the `fuser` representation.
#[cfg(unix)]
pub fn inode_attr_to_file_attr(attr: &InodeAttr) -> fuser::FileAttr {
    use fuser::{FileAttr, FileType};

    let kind = match attr.kind {
        EntryKind::File => FileType::RegularFile,
        EntryKind::Directory => FileType::Directory,
    };

    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.time,
        mtime: attr.time,
        ctime: attr.time,
        crtime: attr.time,
        kind,
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

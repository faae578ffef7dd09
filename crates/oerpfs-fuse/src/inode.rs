//! Inode numbering for the FUSE layer.
//!
//! Maps kernel inode numbers to paths and back. Attributes are not kept
//! here: every attribute request goes back to the tree.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use crate::metadata::{EntryKind, Metadata};

/// Reserved inode for the root directory.
pub const ROOT_INO: u64 = 1;

/// Attributes handed to the kernel for one inode.
#[derive(Debug, Clone)]
pub struct InodeAttr {
    /// Inode number.
    pub ino: u64,
    /// Size in bytes.
    pub size: u64,
    /// Number of blocks (512-byte blocks).
    pub blocks: u64,
    /// Access, modification, change and creation time. The tree has no
    /// timestamps, so all four are the time the attributes were built.
    pub time: SystemTime,
    pub kind: EntryKind,
    /// Permission mode bits.
    pub perm: u16,
    /// Number of hard links.
    pub nlink: u32,
    /// Owner user ID.
    pub uid: u32,
    /// Owner group ID.
    pub gid: u32,
}

impl InodeAttr {
    pub fn from_metadata(ino: u64, metadata: &Metadata) -> Self {
        let (uid, gid) = owner();
        InodeAttr {
            ino,
            size: metadata.size,
            blocks: metadata.size.div_ceil(512),
            time: SystemTime::now(),
            kind: metadata.kind,
            perm: metadata.perm,
            nlink: metadata.nlink,
            uid,
            gid,
        }
    }

    /// Default TTL for attributes.
    pub fn ttl() -> Duration {
        Duration::from_secs(1)
    }
}

/// Everything is owned by the user running the mount.
#[cfg(unix)]
fn owner() -> (u32, u32) {
    // SAFETY: getuid/getgid cannot fail and touch no memory.
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn owner() -> (u32, u32) {
    (0, 0)
}

/// Inode table managing path-to-inode and inode-to-path mappings.
pub struct InodeTable {
    path_to_ino: RwLock<HashMap<String, u64>>,
    ino_to_path: RwLock<HashMap<u64, String>>,
    next_ino: RwLock<u64>,
}

impl InodeTable {
    /// Create a new inode table with the root directory mapped.
    pub fn new() -> Self {
        let table = InodeTable {
            path_to_ino: RwLock::new(HashMap::new()),
            ino_to_path: RwLock::new(HashMap::new()),
            next_ino: RwLock::new(ROOT_INO + 1),
        };

        table.path_to_ino.write().insert("/".to_string(), ROOT_INO);
        table.ino_to_path.write().insert(ROOT_INO, "/".to_string());

        table
    }

    /// Get or allocate the inode for a path.
    pub fn get_or_create(&self, path: &str) -> u64 {
        let normalized = Self::normalize_path(path);

        if let Some(&ino) = self.path_to_ino.read().get(&normalized) {
            return ino;
        }

        let mut path_to_ino = self.path_to_ino.write();
        // Another caller may have won the race between the two locks.
        if let Some(&ino) = path_to_ino.get(&normalized) {
            return ino;
        }

        let ino = {
            let mut next = self.next_ino.write();
            let ino = *next;
            *next += 1;
            ino
        };

        path_to_ino.insert(normalized.clone(), ino);
        self.ino_to_path.write().insert(ino, normalized);
        ino
    }

    /// Get inode for a path (if mapped).
    pub fn get_ino(&self, path: &str) -> Option<u64> {
        let normalized = Self::normalize_path(path);
        self.path_to_ino.read().get(&normalized).copied()
    }

    /// Get path for an inode (if mapped).
    pub fn get_path(&self, ino: u64) -> Option<String> {
        self.ino_to_path.read().get(&ino).cloned()
    }

    /// Number of mapped inodes, root included.
    pub fn len(&self) -> usize {
        self.ino_to_path.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Normalize a path for consistent lookup.
    fn normalize_path(path: &str) -> String {
        let mut normalized = path.to_string();

        if !normalized.starts_with('/') {
            normalized = format!("/{}", normalized);
        }

        // Remove trailing slash (except for root)
        if normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }

        normalized
    }

    /// Path of `name` inside the directory `parent_path`.
    pub fn child_path(parent_path: &str, name: &str) -> String {
        if parent_path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        }
    }

    /// Path of the directory containing `path`.
    pub fn parent_path(path: &str) -> &str {
        match path.rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((parent, _)) => parent,
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_attr_from_metadata() {
        let attr = InodeAttr::from_metadata(42, &Metadata::attachment(1024));
        assert_eq!(attr.ino, 42);
        assert_eq!(attr.kind, EntryKind::File);
        assert_eq!(attr.perm, 0o400);
        assert_eq!(attr.nlink, 2);
        assert_eq!(attr.size, 1024);
        assert_eq!(attr.blocks, 2);
    }

    #[test]
    fn test_attr_block_calculation() {
        for (size, blocks) in [(0, 0), (1, 1), (512, 1), (513, 2), (10000, 20)] {
            let attr = InodeAttr::from_metadata(1, &Metadata::attachment(size));
            assert_eq!(attr.blocks, blocks, "size {}", size);
        }
    }

    #[test]
    fn test_root_is_mapped() {
        let table = InodeTable::new();
        assert_eq!(table.get_ino("/"), Some(ROOT_INO));
        assert_eq!(table.get_path(ROOT_INO), Some("/".to_string()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let table = InodeTable::new();
        let a = table.get_or_create("/res.partner");
        let b = table.get_or_create("/res.partner/17");
        assert_ne!(a, b);
        assert_ne!(a, ROOT_INO);
        assert_eq!(table.get_or_create("/res.partner"), a);
        assert_eq!(table.get_or_create("/res.partner/"), a);
        assert_eq!(table.get_or_create("res.partner"), a);
        assert_eq!(table.get_path(b), Some("/res.partner/17".to_string()));
    }

    #[test]
    fn test_unknown_inode() {
        let table = InodeTable::new();
        assert_eq!(table.get_path(999), None);
        assert_eq!(table.get_ino("/nope"), None);
    }

    #[test]
    fn test_child_and_parent_path() {
        assert_eq!(InodeTable::child_path("/", "res.partner"), "/res.partner");
        assert_eq!(InodeTable::child_path("/res.partner", "17"), "/res.partner/17");
        assert_eq!(InodeTable::parent_path("/res.partner/17"), "/res.partner");
        assert_eq!(InodeTable::parent_path("/res.partner"), "/");
        assert_eq!(InodeTable::parent_path("/"), "/");
    }

    #[test]
    fn test_concurrent_allocation() {
        let table = Arc::new(InodeTable::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for j in 0..50 {
                        table.get_or_create(&format!("/m{}/{}", i % 2, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // Two distinct path sets of 50, plus root.
        assert_eq!(table.len(), 101);
    }
}

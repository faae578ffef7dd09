//! Synthesized attributes and directory listings.
//!
//! Nothing here is read from the store: kinds, modes and link counts are
//! fixed by position in the tree, and only file sizes come from content.

use crate::model_tree::Resolution;

/// Link count reported for directories.
pub const DIR_NLINK: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Attributes of one entry, before an inode is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub perm: u16,
    pub nlink: u32,
    pub size: u64,
}

impl Metadata {
    /// Model-Tree directory: root, model or record. Never writable.
    pub fn read_only_dir() -> Self {
        Metadata {
            kind: EntryKind::Directory,
            perm: 0o500,
            nlink: DIR_NLINK,
            size: 0,
        }
    }

    /// Attachment content, read-only to the owner.
    pub fn attachment(size: u64) -> Self {
        Metadata {
            kind: EntryKind::File,
            perm: 0o400,
            nlink: 2,
            size,
        }
    }

    /// CSV-Import root: write-only.
    pub fn drop_box() -> Self {
        Metadata {
            kind: EntryKind::Directory,
            perm: 0o200,
            nlink: DIR_NLINK,
            size: 0,
        }
    }

    /// A file being uploaded; `size` is what has been buffered so far.
    pub fn pending_upload(size: u64) -> Self {
        Metadata {
            kind: EntryKind::File,
            perm: 0o200,
            nlink: 1,
            size,
        }
    }

    /// Attributes for a resolved Model-Tree address, `None` if it names
    /// nothing.
    pub fn from_resolution(resolution: Resolution) -> Option<Self> {
        match resolution {
            Resolution::Root | Resolution::Model | Resolution::Record => {
                Some(Metadata::read_only_dir())
            }
            Resolution::Attachment { size } => Some(Metadata::attachment(size)),
            Resolution::NotFound => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Children of one directory. All children of a directory share a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    kind: EntryKind,
    names: Vec<String>,
}

impl Listing {
    pub fn new(kind: EntryKind, names: Vec<String>) -> Self {
        Listing { kind, names }
    }

    /// Kind of every child.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Child names, without `.` and `..`.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `.`, `..`, then every child.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        [".", ".."]
            .into_iter()
            .chain(self.names.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

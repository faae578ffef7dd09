//! FUSE filesystem over an OpenERP-style object store.
//!
//! Two trees can be mounted:
//!
//! - **model**: read-only `/model/record_id/attachment_label`, where each
//!   attachment reads as its decoded content.
//! - **csvimport**: a flat write-only directory; a file written into it is
//!   imported as CSV into the model named after the file when it is closed.
//!
//! # Architecture
//!
//! - `model_tree` and `csv_import` implement the two trees over any
//!   [`ObjectService`](oerpfs_core::ObjectService)
//! - `dispatch` picks one of them at mount time
//! - `common` maps inodes to paths and tree errors to errno-level errors
//! - `unix_fuse` is the `fuser::Filesystem` impl for macOS/Linux
//!
//! # Example
//!
//! ```ignore
//! use oerpfs_config::MountConfig;
//! use oerpfs_fuse::OerpFs;
//!
//! let fs = OerpFs::from_config(MountConfig::default())?;
//! fs.mount(Path::new("/mnt/erp"), false)?;
//! ```

pub mod address;
mod async_bridge;
pub mod common;
pub mod csv_import;
pub mod dispatch;
mod error;
mod inode;
pub mod metadata;
pub mod model_tree;
#[cfg(unix)]
mod unix_fuse;

pub use address::{attachment_label, id_from_label, PathAddress};
pub use async_bridge::{block_on, init_runtime, FuseError};
pub use common::{DirEntry, FsOpError, OerpFs, OerpFsCore, ReadDirResult};
pub use csv_import::CsvImport;
pub use dispatch::Tree;
pub use error::{ImportError, TreeError};
pub use inode::{InodeAttr, InodeTable, ROOT_INO};
pub use metadata::{EntryKind, Listing, Metadata};
pub use model_tree::{ModelTree, Resolution};

//! Mount-time choice between the two trees.

use std::sync::Arc;

use oerpfs_config::TreeType;
use oerpfs_core::ObjectService;

use crate::address::PathAddress;
use crate::csv_import::CsvImport;
use crate::error::TreeError;
use crate::metadata::{Listing, Metadata};
use crate::model_tree::ModelTree;

/// The tree served by a mount. Fixed for the lifetime of the mount.
pub enum Tree<S> {
    Model(ModelTree<S>),
    CsvImport(CsvImport<S>),
}

impl<S: ObjectService> Tree<S> {
    pub fn new(tree_type: TreeType, store: Arc<S>) -> Self {
        match tree_type {
            TreeType::Model => Tree::Model(ModelTree::new(store)),
            TreeType::CsvImport => Tree::CsvImport(CsvImport::new(store)),
        }
    }

    pub fn tree_type(&self) -> TreeType {
        match self {
            Tree::Model(_) => TreeType::Model,
            Tree::CsvImport(_) => TreeType::CsvImport,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Tree::Model(_))
    }

    /// Attributes of `path`, or `None` if it names nothing.
    pub async fn stat(&self, path: &str) -> Result<Option<Metadata>, TreeError> {
        match self {
            Tree::Model(tree) => {
                let resolution = tree.resolve(&PathAddress::parse(path)).await?;
                Ok(Metadata::from_resolution(resolution))
            }
            Tree::CsvImport(tree) => Ok(tree.stat(path)),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Listing, TreeError> {
        match self {
            Tree::Model(tree) => tree.list(&PathAddress::parse(path)).await,
            Tree::CsvImport(tree) => tree.list(path),
        }
    }

    pub async fn read(&self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, TreeError> {
        match self {
            Tree::Model(tree) => tree.read(&PathAddress::parse(path), offset, size).await,
            Tree::CsvImport(_) => Err(TreeError::PermissionDenied(path.to_string())),
        }
    }

    pub fn create(&mut self, path: &str) -> Result<Metadata, TreeError> {
        match self {
            Tree::Model(_) => Err(TreeError::ReadOnly(path.to_string())),
            Tree::CsvImport(tree) => tree.create(path),
        }
    }

    pub fn write(&mut self, path: &str, data: &[u8], offset: u64) -> Result<usize, TreeError> {
        match self {
            Tree::Model(_) => Err(TreeError::ReadOnly(path.to_string())),
            Tree::CsvImport(tree) => tree.write(path, data, offset),
        }
    }

    /// Mode, owner, time and size changes.
    pub fn setattr(&mut self, path: &str) -> Result<Metadata, TreeError> {
        match self {
            Tree::Model(_) => Err(TreeError::ReadOnly(path.to_string())),
            Tree::CsvImport(tree) => Ok(tree.setattr(path)),
        }
    }

    /// Close of a file handle. Commits the upload in CSV mode; nothing to
    /// do in the model tree.
    pub async fn release(&mut self, path: &str) -> Result<(), TreeError> {
        match self {
            Tree::Model(_) => Ok(()),
            Tree::CsvImport(tree) => tree.release(path).await.map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oerpfs_remote::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.add_model("res.partner");
        store.add_record("res.partner", 17);
        store.add_attachment("res.partner", 17, 9, "contract.pdf", b"HELLO");
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_model_tree_dispatch() {
        let mut tree = Tree::new(TreeType::Model, store());
        assert_eq!(tree.tree_type(), TreeType::Model);
        assert!(tree.is_read_only());

        let md = tree.stat("/res.partner/17/9-contract.pdf").await.unwrap().unwrap();
        assert_eq!(md, Metadata::attachment(5));
        assert_eq!(tree.stat("/nonexistent.model").await.unwrap(), None);
        assert_eq!(tree.read("/res.partner/17/9-contract.pdf", 2, 10).await.unwrap(), b"LLO");

        assert!(matches!(tree.create("/x.csv"), Err(TreeError::ReadOnly(_))));
        assert!(matches!(tree.write("/res.partner/17/9-contract.pdf", b"x", 0), Err(TreeError::ReadOnly(_))));
        assert!(matches!(tree.setattr("/res.partner"), Err(TreeError::ReadOnly(_))));
        assert!(tree.release("/res.partner/17/9-contract.pdf").await.is_ok());
    }

    #[tokio::test]
    async fn test_csv_dispatch() {
        let store = store();
        let mut tree = Tree::new(TreeType::CsvImport, store.clone());
        assert_eq!(tree.tree_type(), TreeType::CsvImport);
        assert!(!tree.is_read_only());

        // The model tree is not visible in CSV mode.
        assert_eq!(tree.stat("/res.partner").await.unwrap(), None);
        assert!(tree.stat("/").await.unwrap().unwrap().is_dir());

        tree.create("/partners.csv").unwrap();
        tree.write("/partners.csv", b"name\nAlice\n", 0).unwrap();
        assert!(matches!(tree.read("/partners.csv", 0, 10).await, Err(TreeError::PermissionDenied(_))));
        assert_eq!(tree.list("/").await.unwrap().names(), ["partners.csv"]);

        tree.release("/partners.csv").await.unwrap();
        assert_eq!(store.imports().len(), 1);
        assert!(tree.list("/").await.unwrap().is_empty());
    }
}

//! Implementations of [`oerpfs_core::ObjectService`].
//!
//! - [`XmlRpcConnection`] talks to a live store over XML-RPC.
//! - [`MemoryStore`] keeps everything in memory and is what the
//!   filesystem tests run against.

pub mod connection;
pub mod memory;
pub mod xmlrpc;

pub use connection::XmlRpcConnection;
pub use memory::MemoryStore;

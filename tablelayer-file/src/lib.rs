//! Filesystem BLOB store for tablelayer.
//!
//! Every object is one file in a configured directory. Ids are generated from the local time
//! (`YYYYMMDDHHmmss`) followed by a per-store sequence number.

pub mod config;
pub mod store;

pub use config::FileBlobConfig;
pub use store::{FileBlobStore, FileBlobStoreFactory};

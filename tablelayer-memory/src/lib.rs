//! In-memory table driver for tablelayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Driver` trait. It uses
//! async-aware read-write locks for concurrent access and is intended for development, testing
//! and small data sets.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB-style selectors** - Equality, comparison, `$in`/`$nin`, `$exists` and logical operators
//! - **Sorting and paging** - Multi-key sort, skip and limit
//! - **Schema bookkeeping** - Tables, fields and indexes are tracked per table
//!
//! # Quick Start
//!
//! ```ignore
//! use tablelayer::{prelude::*, memory::MemoryDriverFactory};
//! use bson::doc;
//!
//! let catalog = DriverCatalog::new()
//!     .with_driver("memory", MemoryDriverFactory)
//!     .with_blob("file", FileBlobStoreFactory);
//!
//! let db = Database::connect(
//!     DatabaseConfig { driver: "memory".into(), blob_store: doc! { "path": "files" }, ..Default::default() },
//!     &catalog,
//! )
//! .await?;
//!
//! db.add("users", doc! { "name": "Alice" }).await?;
//! ```

pub mod evaluator;
pub mod store;

pub use store::{MemoryDriver, MemoryDriverFactory};

//! A thin data-access layer that puts one permission-checked interface in front of pluggable
//! table stores and BLOB stores.
//!
//! This crate is the core of the tablelayer project and provides:
//!
//! - **Database facade** ([`database`]) - Permission and capability gating, call-shape normalisation, delegation
//! - **Driver abstraction** ([`driver`]) - Trait for implementing table storage backends
//! - **BLOB stores** ([`blob`]) - Trait for binary object storage
//! - **Capabilities** ([`capability`]) - Operation tags, capability sets and permission policy
//! - **Call shapes** ([`args`]) - The argument shapes accepted by `find`, `add`, `update` and `remove`
//! - **Query options** ([`query`]) - Sorting, paging and result shapes
//! - **Query builder** ([`builder`]) - Fluent, reusable query construction
//! - **Configuration** ([`config`]) - Database configuration and declarative field rules
//! - **Catalog and registry** ([`catalog`], [`registry`]) - Building databases by name and sharing them
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use tablelayer_core::{catalog::DriverCatalog, config::DatabaseConfig, database::Database};
//! use bson::doc;
//!
//! let catalog = DriverCatalog::new()
//!     .with_driver("memory", MemoryDriverFactory)
//!     .with_blob("file", FileBlobStoreFactory);
//!
//! let config = DatabaseConfig {
//!     driver: "memory".into(),
//!     blob_store: doc! { "path": "/var/lib/app/files" },
//!     ..Default::default()
//! };
//!
//! let db = Database::connect(config, &catalog).await?;
//! let id = db.add("users", doc! { "name": "Alice" }).await?;
//! ```

pub mod args;
pub mod blob;
pub mod builder;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod query;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

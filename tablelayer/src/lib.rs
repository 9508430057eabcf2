//! Main tablelayer crate: one permission-checked data-access interface over pluggable table
//! drivers and BLOB stores.
//!
//! This crate re-exports the core types and bundles the stock drivers:
//!
//! - `memory` - in-process tables for development and testing
//! - `file` - filesystem BLOB store
//! - `mongodb` - MongoDB tables (requires the `mongodb` feature)
//!
//! # Quick Start
//!
//! ```ignore
//! use tablelayer::{prelude::*, standard_registry};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DatabaseResult<()> {
//!     // databases/shop.json: { "driver": "memory", "blobStore": { "path": "/var/lib/shop" } }
//!     let registry = standard_registry(Registry::default_schema_dir());
//!     let db = registry.get("shop").await?;
//!
//!     db.add("items", doc! { "name": "lamp", "price": 40 }).await?;
//!
//!     let cheap = Builder::new(db.clone())
//!         .table("items")
//!         .filter("price", doc! { "$lt": 50 })
//!         .sort("price", SortDirection::Asc)
//!         .find()
//!         .await?;
//!
//!     println!("{cheap:?}");
//!     registry.clear().await
//! }
//! ```
//!
//! # Readonly databases
//!
//! With `"readonly": true` every write and schema operation fails with
//! [`DatabaseError::PermissionDenied`](error::DatabaseError::PermissionDenied) before the driver
//! is reached. The `enable_*` getters on [`Database`](database::Database) report which operations
//! are available.

use std::path::PathBuf;

pub mod prelude;

pub use tablelayer_core::{
    args, blob, builder, capability, catalog, config, database, driver, error, query, registry,
};

// Re-export BSON types for convenience
pub use bson;

use tablelayer_core::{catalog::DriverCatalog, registry::Registry};

/// In-memory table driver.
pub mod memory {
    pub use tablelayer_memory::{MemoryDriver, MemoryDriverFactory};
}

/// Filesystem BLOB store.
pub mod file {
    pub use tablelayer_file::{FileBlobConfig, FileBlobStore, FileBlobStoreFactory};
}

/// MongoDB table driver.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use tablelayer_mongodb::{MongoConfig, MongoDriver, MongoDriverFactory};
}

/// A catalog with every bundled driver and BLOB store registered under its configuration name.
pub fn standard_catalog() -> DriverCatalog {
    let catalog = DriverCatalog::new()
        .with_driver("memory", memory::MemoryDriverFactory)
        .with_blob("file", file::FileBlobStoreFactory);

    #[cfg(feature = "mongodb")]
    let catalog = catalog.with_driver("mongodb", mongodb::MongoDriverFactory);

    catalog
}

/// A registry reading definitions from `schema_dir` and building them with [`standard_catalog`].
pub fn standard_registry(schema_dir: impl Into<PathBuf>) -> Registry {
    Registry::new(schema_dir, standard_catalog())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bson::{Bson, doc};
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    use super::prelude::*;
    use super::*;

    fn write_definition(dir: &TempDir, name: &str, readonly: bool) {
        let definition = serde_json::json!({
            "driver": "memory",
            "blobStore": { "path": dir.path().to_string_lossy() },
            "readonly": readonly,
            "modifySchema": !readonly,
        });
        std::fs::write(dir.path().join(format!("{name}.json")), definition.to_string()).unwrap();
    }

    #[test]
    fn catalog_lists_bundled_names() {
        let catalog = standard_catalog();

        assert!(catalog.driver_names().contains(&"memory".to_string()));
        assert_eq!(catalog.blob_names(), vec!["file".to_string()]);
    }

    #[tokio::test]
    async fn registry_to_builder_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(&dir, "shop", false);

        let registry = standard_registry(dir.path());
        let db = registry.get("Shop").await.unwrap();
        assert!(Arc::ptr_eq(&db, &registry.get("shop").await.unwrap()));
        assert!(db.enable_create_table());
        assert!(!db.enable_map_reduce());

        assert!(db.create_table("items", doc! {}).await.unwrap());
        for (name, price) in [("lamp", 40), ("desk", 120), ("pen", 2), ("mug", 8)] {
            db.add("items", doc! { "name": name, "price": price }).await.unwrap();
        }

        let mut builder = Builder::new(db.clone());
        builder
            .table("items")
            .field("name")
            .filter("price", doc! { "$lt": 100 })
            .sort("price", SortDirection::Asc)
            .limit(2);

        let names = |rows: Vec<bson::Document>| {
            rows.iter()
                .map(|row| row.get_str("name").unwrap().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(builder.find().await.unwrap()), vec!["pen", "mug"]);
        builder.next_page();
        assert_eq!(names(builder.find().await.unwrap()), vec!["lamp"]);

        builder.reset();
        assert_eq!(
            builder.table("items").filter("name", "pen").set("price", 3).update().await.unwrap(),
            1
        );

        let price = db
            .find(
                "items",
                (
                    doc! { "name": "pen" },
                    FindOptions::builder().scalar("price").build(),
                ),
            )
            .await
            .unwrap()
            .into_scalar()
            .unwrap();
        assert_eq!(price, Some(Bson::Int32(3)));

        registry.clear().await.unwrap();
        assert!(registry.names().await.is_empty());
    }

    #[tokio::test]
    async fn blobs_are_stored_next_to_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(&dir, "media", false);

        let registry = standard_registry(dir.path());
        let db = registry.get("media").await.unwrap();

        let (id, mut writer) = db.blob_writer().await.unwrap();
        writer.write_all(b"\x89PNG").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(writer);

        db.add(db.blob_table(), doc! { "blob": id.as_str(), "type": "image/png" }).await.unwrap();

        let mut content = Vec::new();
        assert_eq!(db.read_blob(&id, &mut content).await.unwrap(), 4);
        assert_eq!(content, b"\x89PNG");

        db.remove_blob(&id).await.unwrap();
        assert!(db.read_blob(&id, &mut Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn readonly_definition_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        write_definition(&dir, "archive", true);

        let db = standard_registry(dir.path()).get("archive").await.unwrap();

        assert!(db.readonly());
        assert!(!db.modify_schema());
        assert!(!db.enable_add());
        assert!(matches!(
            db.add("items", doc! { "name": "lamp" }).await,
            Err(DatabaseError::PermissionDenied(_))
        ));
        assert!(matches!(
            db.create_table("items", doc! {}).await,
            Err(DatabaseError::PermissionDenied(_))
        ));
        assert!(db.blob_writer().await.is_err());
        assert!(db.find("items", ()).await.unwrap().into_rows().unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_blob_section_connects() {
        let config = DatabaseConfig {
            driver: "memory".into(),
            ..Default::default()
        };

        let db = Database::connect(config, &standard_catalog()).await.unwrap();
        assert!(db.enable_add());
    }

    #[tokio::test]
    async fn unknown_definition_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = standard_registry(dir.path());

        assert!(matches!(registry.get("ghost").await, Err(DatabaseError::NotFound(_))));
        assert!(matches!(registry.get("no way").await, Err(DatabaseError::InvalidName(_))));
    }
}

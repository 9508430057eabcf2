//! Driver abstraction for table storage backends.
//!
//! A [`Driver`] implements schema and row operations against a concrete data store. Apart from
//! [`Driver::find`], every operation is optional: a driver lists the ones it implements in
//! [`Driver::capabilities`] and leaves the others at their default, which reports
//! [`DatabaseError::NotSupported`]. The facade never calls an operation missing from the
//! capability set.
//!
//! Drivers are constructed by name through a [`DriverFactory`] registered in a
//! [`DriverCatalog`](crate::catalog::DriverCatalog).
//!
//! # Example
//!
//! ```ignore
//! use tablelayer::driver::Driver;
//! use bson::doc;
//!
//! let driver = MemoryDriver::new();
//! driver.add("users", doc! { "name": "Alice" }, Default::default()).await?;
//! let rows = driver.find("users", None, None, Default::default()).await?;
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::{
    capability::{Capabilities, Operation},
    config::FieldRule,
    error::{DatabaseError, DatabaseResult},
    query::{
        AddOptions, FindOptions, FindOutput, IndexInfo, IndexOptions, RemoveOptions, Sort,
        UpdateOptions,
    },
};

/// Name of the row identifier field.
pub const ROW_ID: &str = "_id";

fn unsupported(op: Operation) -> DatabaseError {
    DatabaseError::NotSupported(format!("{op} is not implemented by this driver"))
}

/// Abstract interface for table storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. The facade adds no synchronisation of its own, so a
/// driver shared between tasks is responsible for its own pooling or locking.
///
/// # Errors
///
/// Whatever a driver returns is handed to the caller unchanged.
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// The optional operations this driver implements.
    fn capabilities(&self) -> Capabilities;

    /// Lists the tables in the store.
    async fn get_tables(&self) -> DatabaseResult<Vec<String>> {
        Err(unsupported(Operation::GetTables))
    }

    /// Describes a table.
    async fn get_schema(&self, _table: &str) -> DatabaseResult<Document> {
        Err(unsupported(Operation::GetSchema))
    }

    /// Creates a table. Returns `false` when the table already existed.
    async fn create_table(&self, _table: &str, _schema: Document) -> DatabaseResult<bool> {
        Err(unsupported(Operation::CreateTable))
    }

    /// Replaces a table's schema.
    async fn alter_table(&self, _table: &str, _schema: Document) -> DatabaseResult<bool> {
        Err(unsupported(Operation::AlterTable))
    }

    /// Drops a table and all of its rows.
    async fn drop_table(&self, _table: &str) -> DatabaseResult<bool> {
        Err(unsupported(Operation::DropTable))
    }

    /// Field name to field schema.
    async fn get_fields(&self, _table: &str) -> DatabaseResult<Document> {
        Err(unsupported(Operation::GetFields))
    }

    /// Adds a field. A `default` entry in `schema` is written to existing rows.
    async fn add_field(&self, _table: &str, _field: &str, _schema: Document) -> DatabaseResult<bool> {
        Err(unsupported(Operation::AddField))
    }

    /// Changes a field. A `rename` entry in `schema` renames the field in existing rows.
    async fn alter_field(&self, _table: &str, _field: &str, _schema: Document) -> DatabaseResult<bool> {
        Err(unsupported(Operation::AlterField))
    }

    async fn remove_field(&self, _table: &str, _field: &str) -> DatabaseResult<bool> {
        Err(unsupported(Operation::RemoveField))
    }

    async fn get_indexes(&self, _table: &str) -> DatabaseResult<Vec<IndexInfo>> {
        Err(unsupported(Operation::GetIndexes))
    }

    /// Creates an index over `keys`. Returns `false` when an equal index already existed.
    async fn add_index(
        &self,
        _table: &str,
        _keys: Vec<Sort>,
        _options: IndexOptions,
    ) -> DatabaseResult<bool> {
        Err(unsupported(Operation::AddIndex))
    }

    async fn remove_index(&self, _table: &str, _keys: Vec<Sort>) -> DatabaseResult<bool> {
        Err(unsupported(Operation::RemoveIndex))
    }

    /// Generates a fresh row identifier.
    async fn create_id(&self, _table: Option<&str>) -> DatabaseResult<Bson> {
        Err(unsupported(Operation::CreateId))
    }

    /// Inserts or replaces a row keyed by its [`ROW_ID`]. Returns the row id.
    async fn save(&self, _table: &str, _row: Document) -> DatabaseResult<Bson> {
        Err(unsupported(Operation::Save))
    }

    /// Reads rows. `None` selects every row / every field.
    async fn find(
        &self,
        table: &str,
        selector: Option<Document>,
        fields: Option<Vec<String>>,
        options: FindOptions,
    ) -> DatabaseResult<FindOutput>;

    /// Inserts a new row. `data` must not carry a [`ROW_ID`]. Returns the new row id.
    async fn add(&self, _table: &str, _data: Document, _options: AddOptions) -> DatabaseResult<Bson> {
        Err(unsupported(Operation::Add))
    }

    /// Updates matching rows and returns how many were affected.
    async fn update(
        &self,
        _table: &str,
        _selector: Option<Document>,
        _data: Document,
        _options: UpdateOptions,
    ) -> DatabaseResult<u64> {
        Err(unsupported(Operation::Update))
    }

    /// Removes matching rows and returns how many were removed.
    async fn remove(
        &self,
        _table: &str,
        _selector: Option<Document>,
        _options: RemoveOptions,
    ) -> DatabaseResult<u64> {
        Err(unsupported(Operation::Remove))
    }

    /// Runs a map-reduce job. `map` and `reduce` are source text in the store's own language.
    async fn map_reduce(&self, _table: &str, _map: &str, _reduce: &str) -> DatabaseResult<Vec<Document>> {
        Err(unsupported(Operation::MapReduce))
    }

    async fn sql(&self, _query: &str) -> DatabaseResult<Vec<Document>> {
        Err(unsupported(Operation::Sql))
    }

    /// Releases connections and other resources. The default implementation is a no-op.
    async fn shutdown(&self) -> DatabaseResult<()> {
        Ok(())
    }
}

/// Builds a driver from the `store` section of a database configuration.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn build(&self, store: &Document) -> DatabaseResult<Arc<dyn Driver>>;

    /// Rules describing the `store` section, used to sanitize and document it.
    fn rules(&self) -> &'static [FieldRule] {
        &[]
    }
}

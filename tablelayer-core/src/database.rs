//! The database facade.
//!
//! A [`Database`] owns one [`Driver`] and one [`BlobStore`] under a single permission policy.
//! Every operation is checked against that policy and the driver's advertised capabilities before
//! it is delegated; driver results are returned unchanged.
//!
//! # Example
//!
//! ```ignore
//! use tablelayer::prelude::*;
//! use bson::doc;
//!
//! let config = DatabaseConfig { driver: "memory".into(), modify_schema: true, ..Default::default() };
//! let db = Database::connect(config, &standard_catalog()).await?;
//!
//! db.create_table("users", doc! {}).await?;
//! db.add("users", doc! { "name": "Alice" }).await?;
//!
//! let rows = db.find("users", doc! { "name": "Alice" }).await?.into_rows()?;
//! ```

use std::sync::Arc;

use bson::{Bson, Document};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::{
    args::{AddArgs, FindArgs, FindCall, RemoveArgs, UpdateArgs},
    blob::{BlobContext, BlobId, BlobStore, BlobWriter},
    capability::{Capabilities, Operation, Permission, Permissions},
    catalog::DriverCatalog,
    config::DatabaseConfig,
    driver::Driver,
    error::{DatabaseError, DatabaseResult},
    query::{FindOutput, IndexInfo, IndexOptions, Sort},
};

/// Generates the `enable_*` flag getters.
macro_rules! flags {
    ($($(#[$meta:meta])* $name:ident => $op:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> bool {
                self.enabled(Operation::$op)
            }
        )*
    };
}

/// Entry point for schema, row and BLOB operations on one configured store.
#[derive(Debug)]
pub struct Database {
    driver: Arc<dyn Driver>,
    blob: Arc<dyn BlobStore>,
    permissions: Permissions,
    capabilities: Capabilities,
    map_reduce_requested: bool,
    sql_requested: bool,
    values_table: String,
    blob_table: String,
}

impl Database {
    /// Builds the configured driver and BLOB store from the catalog.
    pub async fn connect(config: DatabaseConfig, catalog: &DriverCatalog) -> DatabaseResult<Self> {
        config.validate()?;

        let driver_factory = catalog.driver(&config.driver)?;
        let blob_factory = catalog.blob(&config.blob)?;

        let driver = driver_factory.build(&config.store).await?;
        let context = BlobContext { driver: driver.clone(), readonly: config.readonly };
        let blob = blob_factory.build(&config.blob_store, context).await?;

        let database = Self::from_parts(driver, blob, &config);
        info!(
            driver = %config.driver,
            blob = %config.blob,
            readonly = database.readonly(),
            modify_schema = database.modify_schema(),
            capabilities = ?database.capabilities,
            "database connected"
        );

        Ok(database)
    }

    /// Sanitizes a raw configuration document and connects.
    ///
    /// Values that fail their rule fall back to defaults and are logged, except for the driver
    /// and BLOB-store names, which must be valid and known.
    pub async fn from_document(mut document: Document, catalog: &DriverCatalog) -> DatabaseResult<Self> {
        let mut issues = Vec::new();
        DatabaseConfig::sanitize(&mut document, &mut issues, None, catalog);

        if let Some(issue) = issues
            .iter()
            .find(|issue| !issue.warn && matches!(issue.name.as_str(), "driver" | "blob"))
        {
            return Err(DatabaseError::Configuration(format!("{}: {}", issue.name, issue.message)));
        }

        for issue in &issues {
            warn!(field = %issue.name, message = %issue.message, "configuration value replaced by default");
        }

        Self::connect(DatabaseConfig::from_document(document)?, catalog).await
    }

    /// Wraps an already constructed driver and BLOB store.
    pub fn from_parts(driver: Arc<dyn Driver>, blob: Arc<dyn BlobStore>, config: &DatabaseConfig) -> Self {
        let capabilities = driver.capabilities();

        Self {
            driver,
            blob,
            permissions: Permissions::new(config.readonly, config.modify_schema),
            capabilities,
            map_reduce_requested: config.enable_map_reduce,
            sql_requested: config.enable_sql,
            values_table: config.values_table.clone(),
            blob_table: config.blob_table.clone(),
        }
    }

    pub fn readonly(&self) -> bool {
        self.permissions.readonly()
    }

    pub fn modify_schema(&self) -> bool {
        self.permissions.modify_schema()
    }

    /// The optional operations the driver advertised at construction.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn values_table(&self) -> &str {
        &self.values_table
    }

    pub fn blob_table(&self) -> &str {
        &self.blob_table
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob
    }

    /// Whether `op` may run: the permission policy allows it and the driver implements it.
    /// `find` is always enabled.
    pub fn enabled(&self, op: Operation) -> bool {
        match op.permission() {
            _ if op == Operation::Find => true,
            Permission::OptIn => {
                let requested = match op {
                    Operation::MapReduce => self.map_reduce_requested,
                    _ => self.sql_requested,
                };
                requested && self.capabilities.contains(op)
            }
            _ if !op.is_driver_operation() => self.permissions.allows(op),
            _ => self.permissions.allows(op) && self.capabilities.contains(op),
        }
    }

    flags! {
        enable_get_tables => GetTables;
        enable_get_schema => GetSchema;
        enable_create_table => CreateTable;
        enable_alter_table => AlterTable;
        enable_drop_table => DropTable;
        enable_get_fields => GetFields;
        enable_add_field => AddField;
        enable_alter_field => AlterField;
        enable_remove_field => RemoveField;
        enable_get_indexes => GetIndexes;
        enable_add_index => AddIndex;
        enable_remove_index => RemoveIndex;
        enable_create_id => CreateId;
        enable_save => Save;
        enable_add => Add;
        enable_update => Update;
        enable_remove => Remove;
        /// Requested by `enableMapReduce` and implemented by the driver.
        enable_map_reduce => MapReduce;
        /// Requested by `enableSql` and implemented by the driver.
        enable_sql => Sql;
        enable_write_blob => WriteBlob;
        enable_remove_blob => RemoveBlob;
    }

    fn ensure(&self, op: Operation) -> DatabaseResult<()> {
        if self.enabled(op) {
            return Ok(());
        }

        match op.permission() {
            Permission::OptIn => Err(DatabaseError::NotSupported(format!("{op} is not enabled"))),
            _ => Err(DatabaseError::PermissionDenied(op)),
        }
    }

    pub async fn get_tables(&self) -> DatabaseResult<Vec<String>> {
        debug!("get_tables");
        self.ensure(Operation::GetTables)?;
        self.driver.get_tables().await
    }

    pub async fn get_schema(&self, table: &str) -> DatabaseResult<Document> {
        debug!(table, "get_schema");
        self.ensure(Operation::GetSchema)?;
        self.driver.get_schema(table).await
    }

    pub async fn create_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        debug!(table, "create_table");
        self.ensure(Operation::CreateTable)?;
        self.driver.create_table(table, schema).await
    }

    pub async fn alter_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        debug!(table, "alter_table");
        self.ensure(Operation::AlterTable)?;
        self.driver.alter_table(table, schema).await
    }

    pub async fn drop_table(&self, table: &str) -> DatabaseResult<bool> {
        debug!(table, "drop_table");
        self.ensure(Operation::DropTable)?;
        self.driver.drop_table(table).await
    }

    pub async fn get_fields(&self, table: &str) -> DatabaseResult<Document> {
        debug!(table, "get_fields");
        self.ensure(Operation::GetFields)?;
        self.driver.get_fields(table).await
    }

    pub async fn add_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        debug!(table, field, "add_field");
        self.ensure(Operation::AddField)?;
        self.driver.add_field(table, field, schema).await
    }

    pub async fn alter_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        debug!(table, field, "alter_field");
        self.ensure(Operation::AlterField)?;
        self.driver.alter_field(table, field, schema).await
    }

    pub async fn remove_field(&self, table: &str, field: &str) -> DatabaseResult<bool> {
        debug!(table, field, "remove_field");
        self.ensure(Operation::RemoveField)?;
        self.driver.remove_field(table, field).await
    }

    pub async fn get_indexes(&self, table: &str) -> DatabaseResult<Vec<IndexInfo>> {
        debug!(table, "get_indexes");
        self.ensure(Operation::GetIndexes)?;
        self.driver.get_indexes(table).await
    }

    pub async fn add_index(&self, table: &str, keys: Vec<Sort>, options: IndexOptions) -> DatabaseResult<bool> {
        debug!(table, ?keys, "add_index");
        self.ensure(Operation::AddIndex)?;
        self.driver.add_index(table, keys, options).await
    }

    pub async fn remove_index(&self, table: &str, keys: Vec<Sort>) -> DatabaseResult<bool> {
        debug!(table, ?keys, "remove_index");
        self.ensure(Operation::RemoveIndex)?;
        self.driver.remove_index(table, keys).await
    }

    pub async fn create_id(&self, table: Option<&str>) -> DatabaseResult<Bson> {
        debug!(table, "create_id");
        self.ensure(Operation::CreateId)?;
        self.driver.create_id(table).await
    }

    pub async fn save(&self, table: &str, row: Document) -> DatabaseResult<Bson> {
        debug!(table, "save");
        self.ensure(Operation::Save)?;
        self.driver.save(table, row).await
    }

    /// Reads rows. `args` is any recognised call shape, e.g. `()`, a selector document, a field
    /// list, or a `(selector, fields, options)` tuple.
    pub async fn find(&self, table: &str, args: impl Into<FindArgs>) -> DatabaseResult<FindOutput> {
        let FindCall { selector, fields, options } = args.into().into_call();
        debug!(table, ?selector, ?fields, ?options, "find");
        self.driver.find(table, selector, fields, options).await
    }

    /// [`find`](Self::find) with a positional argument list.
    pub async fn find_positional(&self, table: &str, args: Vec<Bson>) -> DatabaseResult<FindOutput> {
        self.find(table, FindArgs::from_positional(args)?).await
    }

    /// Inserts a row and returns its id.
    pub async fn add(&self, table: &str, args: impl Into<AddArgs>) -> DatabaseResult<Bson> {
        self.ensure(Operation::Add)?;
        self.dispatch_add(table, args.into()).await
    }

    /// [`add`](Self::add) with a positional argument list. Permission is checked before parsing.
    pub async fn add_positional(&self, table: &str, args: Vec<Bson>) -> DatabaseResult<Bson> {
        self.ensure(Operation::Add)?;
        self.dispatch_add(table, AddArgs::from_positional(args)?).await
    }

    async fn dispatch_add(&self, table: &str, args: AddArgs) -> DatabaseResult<Bson> {
        debug!(table, "add");
        let (data, options) = args.into_parts();
        self.driver.add(table, data, options).await
    }

    /// Updates matching rows and returns how many changed.
    pub async fn update(&self, table: &str, args: impl Into<UpdateArgs>) -> DatabaseResult<u64> {
        self.ensure(Operation::Update)?;
        self.dispatch_update(table, args.into()).await
    }

    pub async fn update_positional(&self, table: &str, args: Vec<Bson>) -> DatabaseResult<u64> {
        self.ensure(Operation::Update)?;
        self.dispatch_update(table, UpdateArgs::from_positional(args)?).await
    }

    async fn dispatch_update(&self, table: &str, args: UpdateArgs) -> DatabaseResult<u64> {
        debug!(table, "update");
        let (selector, data, options) = args.into_parts();
        self.driver.update(table, selector, data, options).await
    }

    /// Removes matching rows and returns how many were removed.
    pub async fn remove(&self, table: &str, args: impl Into<RemoveArgs>) -> DatabaseResult<u64> {
        self.ensure(Operation::Remove)?;
        self.dispatch_remove(table, args.into()).await
    }

    pub async fn remove_positional(&self, table: &str, args: Vec<Bson>) -> DatabaseResult<u64> {
        self.ensure(Operation::Remove)?;
        self.dispatch_remove(table, RemoveArgs::from_positional(args)?).await
    }

    async fn dispatch_remove(&self, table: &str, args: RemoveArgs) -> DatabaseResult<u64> {
        debug!(table, "remove");
        let (selector, options) = args.into_parts();
        self.driver.remove(table, selector, options).await
    }

    pub async fn map_reduce(&self, table: &str, map: &str, reduce: &str) -> DatabaseResult<Vec<Document>> {
        debug!(table, "map_reduce");
        self.ensure(Operation::MapReduce)?;
        self.driver.map_reduce(table, map, reduce).await
    }

    pub async fn sql(&self, query: &str) -> DatabaseResult<Vec<Document>> {
        debug!(query, "sql");
        self.ensure(Operation::Sql)?;
        self.driver.sql(query).await
    }

    /// Allocates a BLOB and returns its id with a writer for the content.
    pub async fn blob_writer(&self) -> DatabaseResult<(BlobId, BlobWriter)> {
        debug!("blob_writer");
        self.ensure(Operation::WriteBlob)?;
        self.blob.writer().await
    }

    /// Copies BLOB `id` into `writer`.
    pub async fn read_blob(&self, id: &str, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> DatabaseResult<u64> {
        debug!(id, "read_blob");
        self.blob.read(id, writer).await
    }

    pub async fn remove_blob(&self, id: &str) -> DatabaseResult<()> {
        debug!(id, "remove_blob");
        self.ensure(Operation::RemoveBlob)?;
        self.blob.remove(id).await
    }

    /// Releases the driver's resources.
    pub async fn shutdown(&self) -> DatabaseResult<()> {
        debug!("shutdown");
        self.driver.shutdown().await
    }
}

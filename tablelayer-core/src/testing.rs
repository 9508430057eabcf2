//! Test doubles: a driver that records every call and a BLOB store that keeps nothing.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use tokio::io::AsyncWrite;

use crate::{
    args::FindCall,
    blob::{BlobContext, BlobId, BlobStore, BlobStoreFactory, BlobWriter},
    capability::{Capabilities, Operation},
    catalog::DriverCatalog,
    driver::{Driver, DriverFactory},
    error::{DatabaseError, DatabaseResult},
    query::{AddOptions, FindOptions, FindOutput, IndexInfo, IndexOptions, RemoveOptions, Sort, UpdateOptions},
};

/// One recorded driver call: the operation, its table (if any) and its remaining arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Operation,
    pub table: Option<String>,
    pub args: Vec<Bson>,
}

#[derive(Debug, Default)]
pub struct SpyDriver {
    capabilities: Capabilities,
    calls: Mutex<Vec<Call>>,
    finds: Mutex<Vec<FindCall>>,
    failing_shutdown: bool,
    shut_down: AtomicBool,
}

impl SpyDriver {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities, ..Default::default() }
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: Operation) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.op == op).collect()
    }

    pub fn finds(&self) -> Vec<FindCall> {
        self.finds.lock().unwrap().clone()
    }

    fn record(&self, op: Operation, table: Option<&str>, args: Vec<Bson>) {
        self.calls.lock().unwrap().push(Call { op, table: table.map(str::to_string), args });
    }
}

fn keys(keys: &[Sort]) -> Bson {
    Bson::Document(Sort::to_document(keys))
}

#[async_trait]
impl Driver for SpyDriver {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn get_tables(&self) -> DatabaseResult<Vec<String>> {
        self.record(Operation::GetTables, None, vec![]);
        Ok(vec!["t".to_string()])
    }

    async fn get_schema(&self, table: &str) -> DatabaseResult<Document> {
        self.record(Operation::GetSchema, Some(table), vec![]);
        Ok(Document::new())
    }

    async fn create_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        self.record(Operation::CreateTable, Some(table), vec![schema.into()]);
        Ok(true)
    }

    async fn alter_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        self.record(Operation::AlterTable, Some(table), vec![schema.into()]);
        Ok(true)
    }

    async fn drop_table(&self, table: &str) -> DatabaseResult<bool> {
        self.record(Operation::DropTable, Some(table), vec![]);
        Ok(true)
    }

    async fn get_fields(&self, table: &str) -> DatabaseResult<Document> {
        self.record(Operation::GetFields, Some(table), vec![]);
        Ok(Document::new())
    }

    async fn add_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        self.record(Operation::AddField, Some(table), vec![field.into(), schema.into()]);
        Ok(true)
    }

    async fn alter_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        self.record(Operation::AlterField, Some(table), vec![field.into(), schema.into()]);
        Ok(true)
    }

    async fn remove_field(&self, table: &str, field: &str) -> DatabaseResult<bool> {
        self.record(Operation::RemoveField, Some(table), vec![field.into()]);
        Ok(true)
    }

    async fn get_indexes(&self, table: &str) -> DatabaseResult<Vec<IndexInfo>> {
        self.record(Operation::GetIndexes, Some(table), vec![]);
        Ok(vec![])
    }

    async fn add_index(&self, table: &str, index: Vec<Sort>, options: IndexOptions) -> DatabaseResult<bool> {
        self.record(Operation::AddIndex, Some(table), vec![keys(&index), options.unique.into()]);
        Ok(true)
    }

    async fn remove_index(&self, table: &str, index: Vec<Sort>) -> DatabaseResult<bool> {
        self.record(Operation::RemoveIndex, Some(table), vec![keys(&index)]);
        Ok(true)
    }

    async fn create_id(&self, table: Option<&str>) -> DatabaseResult<Bson> {
        self.record(Operation::CreateId, table, vec![]);
        Ok(Bson::String("id-1".into()))
    }

    async fn save(&self, table: &str, row: Document) -> DatabaseResult<Bson> {
        self.record(Operation::Save, Some(table), vec![row.into()]);
        Ok(Bson::String("id-1".into()))
    }

    async fn find(
        &self,
        table: &str,
        selector: Option<Document>,
        fields: Option<Vec<String>>,
        options: FindOptions,
    ) -> DatabaseResult<FindOutput> {
        self.record(Operation::Find, Some(table), vec![]);
        self.finds.lock().unwrap().push(FindCall { selector, fields, options: options.clone() });

        Ok(match options.mode() {
            crate::query::FindMode::Multi => FindOutput::Rows(vec![doc! { "_id": 1 }]),
            crate::query::FindMode::Single => FindOutput::Row(Some(doc! { "_id": 1 })),
            crate::query::FindMode::Scalar(_) => FindOutput::Scalar(Some(Bson::Int32(1))),
        })
    }

    async fn add(&self, table: &str, data: Document, options: AddOptions) -> DatabaseResult<Bson> {
        self.record(Operation::Add, Some(table), vec![data.into(), options.extra.into()]);
        Ok(Bson::String("id-1".into()))
    }

    async fn update(
        &self,
        table: &str,
        selector: Option<Document>,
        data: Document,
        options: UpdateOptions,
    ) -> DatabaseResult<u64> {
        self.record(
            Operation::Update,
            Some(table),
            vec![
                selector.map(Bson::Document).unwrap_or(Bson::Null),
                data.into(),
                doc! { "single": options.single, "upsert": options.upsert, "replace": options.replace }.into(),
            ],
        );
        Ok(1)
    }

    async fn remove(
        &self,
        table: &str,
        selector: Option<Document>,
        options: RemoveOptions,
    ) -> DatabaseResult<u64> {
        self.record(
            Operation::Remove,
            Some(table),
            vec![
                selector.map(Bson::Document).unwrap_or(Bson::Null),
                doc! { "single": options.single }.into(),
            ],
        );
        Ok(1)
    }

    async fn map_reduce(&self, table: &str, map: &str, reduce: &str) -> DatabaseResult<Vec<Document>> {
        self.record(Operation::MapReduce, Some(table), vec![map.into(), reduce.into()]);
        Ok(vec![])
    }

    async fn sql(&self, query: &str) -> DatabaseResult<Vec<Document>> {
        self.record(Operation::Sql, None, vec![query.into()]);
        Ok(vec![])
    }

    async fn shutdown(&self) -> DatabaseResult<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        if self.failing_shutdown {
            return Err(DatabaseError::Backend("shutdown failed".into()));
        }
        Ok(())
    }
}

/// Builds [`SpyDriver`]s and keeps the last one so tests can inspect it.
#[derive(Debug, Clone)]
pub struct SpyFactory {
    capabilities: Capabilities,
    failing_shutdown: bool,
    built: Arc<Mutex<Option<Arc<SpyDriver>>>>,
}

impl Default for SpyFactory {
    fn default() -> Self {
        Self::new(Capabilities::all())
    }
}

impl SpyFactory {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities, failing_shutdown: false, built: Arc::default() }
    }

    /// A factory whose drivers fail to shut down.
    pub fn failing_shutdown() -> Self {
        Self { failing_shutdown: true, ..Self::default() }
    }

    pub fn driver(&self) -> Arc<SpyDriver> {
        self.built.lock().unwrap().clone().expect("no driver was built")
    }
}

#[async_trait]
impl DriverFactory for SpyFactory {
    async fn build(&self, _store: &Document) -> DatabaseResult<Arc<dyn Driver>> {
        let driver = Arc::new(SpyDriver {
            failing_shutdown: self.failing_shutdown,
            ..SpyDriver::new(self.capabilities)
        });
        *self.built.lock().unwrap() = Some(driver.clone());
        Ok(driver)
    }
}

#[derive(Debug)]
pub struct NullBlobStore;

#[async_trait]
impl BlobStore for NullBlobStore {
    async fn writer(&self) -> DatabaseResult<(BlobId, BlobWriter)> {
        Ok(("blob-1".to_string(), Box::new(tokio::io::sink())))
    }

    async fn read(&self, _id: &str, _writer: &mut (dyn AsyncWrite + Send + Unpin)) -> DatabaseResult<u64> {
        Ok(0)
    }

    async fn remove(&self, _id: &str) -> DatabaseResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NullBlobFactory;

#[async_trait]
impl BlobStoreFactory for NullBlobFactory {
    async fn build(&self, _config: &Document, _context: BlobContext) -> DatabaseResult<Arc<dyn BlobStore>> {
        Ok(Arc::new(NullBlobStore))
    }
}

/// A catalog with `factory` registered as driver `mock` and a null BLOB store as `null`.
pub fn mock_catalog(factory: &SpyFactory) -> DriverCatalog {
    DriverCatalog::new()
        .with_driver("mock", factory.clone())
        .with_blob("null", NullBlobFactory)
}

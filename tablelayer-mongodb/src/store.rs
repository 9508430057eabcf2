use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, Database as MongoDatabase, IndexModel,
    error::ErrorKind,
    options::{
        ClientOptions, FindOneOptions, FindOptions as MongoFindOptions,
        IndexOptions as MongoIndexOptions,
    },
};
use tracing::{debug, info};

use tablelayer_core::{
    capability::{Capabilities, Operation},
    config::FieldRule,
    driver::{Driver, DriverFactory, ROW_ID},
    error::{DatabaseError, DatabaseResult},
    query::{
        AddOptions, FindMode, FindOptions, FindOutput, IndexInfo, IndexOptions, RemoveOptions,
        Sort, SortDirection, UpdateOptions, index_name,
    },
};

use crate::config::MongoConfig;

/// MongoDB "namespace already exists" server error.
const NAMESPACE_EXISTS: i32 = 48;

#[derive(Debug, Clone)]
pub struct MongoDriver {
    client: Client,
    database: String,
}

impl MongoDriver {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    /// Connects using a `store` configuration section.
    pub async fn connect(config: &MongoConfig) -> DatabaseResult<Self> {
        let options = ClientOptions::parse(config.connection_string())
            .await
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;

        info!(host = %config.host, port = config.port, db = %config.db, "mongodb client created");
        Ok(Self::new(client, config.db.clone()))
    }

    fn database(&self) -> MongoDatabase {
        self.client.database(&self.database)
    }

    fn get_collection(&self, table: &str) -> MongoCollection<Document> {
        self.database().collection(table)
    }
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, ErrorKind::Command(ref command) if command.code == NAMESPACE_EXISTS)
}

fn projection(fields: &[String]) -> Document {
    fields.iter().map(|field| (field.clone(), Bson::Int32(1))).collect()
}

/// Wraps plain field data in `$set` so updates merge instead of replacing.
fn update_document(data: Document) -> Document {
    match data.keys().next() {
        Some(key) if key.starts_with('$') => data,
        _ => doc! { "$set": data },
    }
}

fn index_keys(keys: &Document) -> Vec<Sort> {
    keys.iter()
        .map(|(field, direction)| Sort::new(field.clone(), SortDirection::from_bson(direction)))
        .collect()
}

#[async_trait]
impl Driver for MongoDriver {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
            .without(Operation::GetSchema)
            .without(Operation::GetFields)
            .without(Operation::Sql)
    }

    async fn get_tables(&self) -> DatabaseResult<Vec<String>> {
        let mut names = self
            .database()
            .list_collection_names()
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;
        names.sort();
        Ok(names)
    }

    async fn create_table(&self, table: &str, _schema: Document) -> DatabaseResult<bool> {
        match self.database().create_collection(table).await {
            Ok(()) => Ok(true),
            Err(e) if is_namespace_exists(&e) => Ok(false),
            Err(e) => Err(DatabaseError::Backend(e.to_string())),
        }
    }

    /// Collections have no fixed schema, so there is nothing to alter.
    async fn alter_table(&self, _table: &str, _schema: Document) -> DatabaseResult<bool> {
        Ok(true)
    }

    async fn drop_table(&self, table: &str) -> DatabaseResult<bool> {
        self.get_collection(table)
            .drop()
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(true)
    }

    async fn add_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        if let Some(default) = schema.get("default") {
            self.get_collection(table)
                .update_many(
                    doc! { field: { "$exists": false } },
                    doc! { "$set": { field: default.clone() } },
                )
                .await
                .map_err(|e| DatabaseError::Backend(e.to_string()))?;
        }

        Ok(true)
    }

    async fn alter_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        if let Ok(new_name) = schema.get_str("rename") {
            self.get_collection(table)
                .update_many(
                    doc! { field: { "$exists": true } },
                    doc! { "$rename": { field: new_name } },
                )
                .await
                .map_err(|e| DatabaseError::Backend(e.to_string()))?;
        }

        Ok(true)
    }

    async fn remove_field(&self, table: &str, field: &str) -> DatabaseResult<bool> {
        self.get_collection(table)
            .update_many(doc! {}, doc! { "$unset": { field: "" } })
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(true)
    }

    async fn get_indexes(&self, table: &str) -> DatabaseResult<Vec<IndexInfo>> {
        let models = self
            .get_collection(table)
            .list_indexes()
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|model| {
                let keys = index_keys(&model.keys);
                let options = model.options.unwrap_or_default();

                IndexInfo {
                    name: options.name.unwrap_or_else(|| index_name(&keys)),
                    unique: options.unique.unwrap_or(false),
                    keys,
                }
            })
            .collect())
    }

    async fn add_index(&self, table: &str, keys: Vec<Sort>, options: IndexOptions) -> DatabaseResult<bool> {
        self.get_collection(table)
            .create_index(
                IndexModel::builder()
                    .keys(Sort::to_document(&keys))
                    .options(
                        MongoIndexOptions::builder()
                            .name(index_name(&keys))
                            .unique(options.unique)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(true)
    }

    async fn remove_index(&self, table: &str, keys: Vec<Sort>) -> DatabaseResult<bool> {
        self.get_collection(table)
            .drop_index(index_name(&keys))
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(true)
    }

    async fn create_id(&self, _table: Option<&str>) -> DatabaseResult<Bson> {
        Ok(Bson::ObjectId(ObjectId::new()))
    }

    async fn save(&self, table: &str, row: Document) -> DatabaseResult<Bson> {
        let collection = self.get_collection(table);

        match row.get(ROW_ID).cloned() {
            Some(id) => {
                collection
                    .replace_one(doc! { ROW_ID: id.clone() }, row)
                    .upsert(true)
                    .await
                    .map_err(|e| DatabaseError::Backend(e.to_string()))?;
                Ok(id)
            }
            None => Ok(collection
                .insert_one(row)
                .await
                .map_err(|e| DatabaseError::Backend(e.to_string()))?
                .inserted_id),
        }
    }

    async fn find(
        &self,
        table: &str,
        selector: Option<Document>,
        fields: Option<Vec<String>>,
        options: FindOptions,
    ) -> DatabaseResult<FindOutput> {
        let collection = self.get_collection(table);
        let selector = selector.unwrap_or_default();
        let sort = (!options.sort.is_empty()).then(|| Sort::to_document(&options.sort));
        debug!(table, ?selector, "mongodb find");

        match options.mode() {
            FindMode::Scalar(field) => {
                let mut one = FindOneOptions::default();
                one.sort = sort;
                one.projection = Some(doc! { field: 1 });

                let row = collection
                    .find_one(selector)
                    .with_options(one)
                    .await
                    .map_err(|e| DatabaseError::Backend(e.to_string()))?;

                Ok(FindOutput::Scalar(row.and_then(|row| row.get(field).cloned())))
            }
            FindMode::Single => {
                let mut one = FindOneOptions::default();
                one.sort = sort;
                one.projection = fields.as_deref().map(projection);

                let row = collection
                    .find_one(selector)
                    .with_options(one)
                    .await
                    .map_err(|e| DatabaseError::Backend(e.to_string()))?;

                Ok(FindOutput::Row(row))
            }
            FindMode::Multi => {
                let mut many = MongoFindOptions::default();
                many.sort = sort;
                many.skip = options.skip;
                many.limit = options.limit.map(|limit| limit as i64);
                many.projection = fields.as_deref().map(projection);

                let rows = collection
                    .find(selector)
                    .with_options(many)
                    .await
                    .map_err(|e| DatabaseError::Backend(e.to_string()))?
                    .try_collect::<Vec<Document>>()
                    .await
                    .map_err(|e| DatabaseError::Backend(e.to_string()))?;

                Ok(FindOutput::Rows(rows))
            }
        }
    }

    async fn add(&self, table: &str, data: Document, _options: AddOptions) -> DatabaseResult<Bson> {
        if data.contains_key(ROW_ID) {
            return Err(DatabaseError::InvalidDocument(format!(
                "new rows must not carry {ROW_ID}"
            )));
        }

        Ok(self
            .get_collection(table)
            .insert_one(data)
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?
            .inserted_id)
    }

    /// `replace` swaps out at most one row, since MongoDB cannot replace many at once.
    async fn update(
        &self,
        table: &str,
        selector: Option<Document>,
        data: Document,
        options: UpdateOptions,
    ) -> DatabaseResult<u64> {
        let collection = self.get_collection(table);
        let selector = selector.unwrap_or_default();

        let result = if options.replace {
            collection
                .replace_one(selector, data)
                .upsert(options.upsert)
                .await
        } else if options.single {
            collection
                .update_one(selector, update_document(data))
                .upsert(options.upsert)
                .await
        } else {
            collection
                .update_many(selector, update_document(data))
                .upsert(options.upsert)
                .await
        }
        .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(result.modified_count + u64::from(result.upserted_id.is_some()))
    }

    async fn remove(
        &self,
        table: &str,
        selector: Option<Document>,
        options: RemoveOptions,
    ) -> DatabaseResult<u64> {
        let collection = self.get_collection(table);
        let selector = selector.unwrap_or_default();

        let result = if options.single {
            collection.delete_one(selector).await
        } else {
            collection.delete_many(selector).await
        }
        .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(result.deleted_count)
    }

    async fn map_reduce(&self, table: &str, map: &str, reduce: &str) -> DatabaseResult<Vec<Document>> {
        let reply = self
            .database()
            .run_command(doc! {
                "mapReduce": table,
                "map": Bson::JavaScriptCode(map.to_string()),
                "reduce": Bson::JavaScriptCode(reduce.to_string()),
                "out": { "inline": 1 },
            })
            .await
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        let results = reply
            .get_array("results")
            .map_err(|e| DatabaseError::Backend(e.to_string()))?;

        Ok(results.iter().filter_map(|item| item.as_document().cloned()).collect())
    }

    async fn shutdown(&self) -> DatabaseResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builds [`MongoDriver`]s from a [`MongoConfig`] `store` section.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoDriverFactory;

#[async_trait]
impl DriverFactory for MongoDriverFactory {
    async fn build(&self, store: &Document) -> DatabaseResult<Arc<dyn Driver>> {
        let config = MongoConfig::from_store(store)?;
        Ok(Arc::new(MongoDriver::connect(&config).await?))
    }

    fn rules(&self) -> &'static [FieldRule] {
        MongoConfig::RULES
    }
}

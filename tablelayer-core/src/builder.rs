//! Fluent query construction over a [`Database`].
//!
//! A [`Builder`] accumulates a table, fields, equality conditions, sort keys, paging and values
//! through chained calls, then dispatches exactly one facade call per terminal method. Terminal
//! methods borrow the builder, so the accumulated state survives the call; use
//! [`Builder::reset`] to start a new query.
//!
//! ```ignore
//! let mut query = Builder::new(db.clone());
//! let rows = query
//!     .table("users")
//!     .field("name")
//!     .filter("active", true)
//!     .sort("name", SortDirection::Asc)
//!     .limit(20)
//!     .find()
//!     .await?;
//!
//! let next = query.next_page().find().await?;
//! ```

use std::sync::Arc;

use bson::{Bson, Document};

use crate::{
    args::{FindArgs, RemoveArgs, UpdateArgs},
    database::Database,
    error::{DatabaseError, DatabaseResult},
    query::{FindOptions, RemoveOptions, Sort, SortDirection, UpdateOptions},
};

#[derive(Debug, Clone, Default)]
pub struct Builder {
    database: Option<Arc<Database>>,
    table: Option<String>,
    fields: Vec<String>,
    conditions: Document,
    sort: Vec<Sort>,
    limit: Option<u64>,
    top: u64,
    values: Document,
}

impl Builder {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database: Some(database), ..Default::default() }
    }

    /// A builder with no database attached. Terminal calls fail until [`attach`](Self::attach).
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, database: Arc<Database>) -> &mut Self {
        self.database = Some(database);
        self
    }

    /// Clears the query state. The attached database is kept.
    pub fn reset(&mut self) -> &mut Self {
        *self = Self { database: self.database.take(), ..Default::default() };
        self
    }

    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    /// Adds a field to the projection. Duplicates are ignored.
    pub fn field(&mut self, field: impl Into<String>) -> &mut Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
        self
    }

    /// Adds an equality condition, replacing any earlier condition on `field`.
    pub fn filter(&mut self, field: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn sort(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.sort.push(Sort::new(field, direction));
        self
    }

    /// Sets the page size. Zero clears it.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Sets how many rows to skip.
    pub fn top(&mut self, top: u64) -> &mut Self {
        self.top = top;
        self
    }

    /// Advances `top` by one page. Does nothing when no limit is set.
    pub fn next_page(&mut self) -> &mut Self {
        if let Some(limit) = self.limit {
            self.top += limit;
        }
        self
    }

    /// Sets a value written by [`add`](Self::add) and [`update`](Self::update).
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Bson>) -> &mut Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn conditions(&self) -> &Document {
        &self.conditions
    }

    pub fn values(&self) -> &Document {
        &self.values
    }

    pub fn top_value(&self) -> u64 {
        self.top
    }

    fn target(&self) -> DatabaseResult<(&Database, &str)> {
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| DatabaseError::Precondition("no database attached".into()))?;
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| DatabaseError::Precondition("no table set".into()))?;

        Ok((database, table))
    }

    fn selector(&self) -> Option<Document> {
        (!self.conditions.is_empty()).then(|| self.conditions.clone())
    }

    /// Only the accumulator fields that were set. A single-row read always takes the first match.
    fn find_args(&self, single: bool) -> FindArgs {
        let options = FindOptions {
            sort: self.sort.clone(),
            skip: (self.top > 0 && !single).then_some(self.top),
            limit: self.limit,
            single,
            ..Default::default()
        };
        let fields = (!self.fields.is_empty()).then(|| self.fields.clone());

        FindArgs::Full(self.selector(), fields, options)
    }

    pub async fn find(&self) -> DatabaseResult<Vec<Document>> {
        let (database, table) = self.target()?;
        database.find(table, self.find_args(false)).await?.into_rows()
    }

    pub async fn find_one(&self) -> DatabaseResult<Option<Document>> {
        let (database, table) = self.target()?;
        database.find(table, self.find_args(true)).await?.into_row()
    }

    /// Inserts the accumulated values as a new row.
    pub async fn add(&self) -> DatabaseResult<Bson> {
        let (database, table) = self.target()?;
        database.add(table, self.values.clone()).await
    }

    /// Writes the accumulated values to every row matching the conditions.
    pub async fn update(&self) -> DatabaseResult<u64> {
        self.dispatch_update(UpdateOptions::default()).await
    }

    pub async fn update_one(&self) -> DatabaseResult<u64> {
        self.dispatch_update(UpdateOptions::single()).await
    }

    async fn dispatch_update(&self, options: UpdateOptions) -> DatabaseResult<u64> {
        let (database, table) = self.target()?;
        database
            .update(table, UpdateArgs::Full(self.selector(), self.values.clone(), options))
            .await
    }

    pub async fn remove(&self) -> DatabaseResult<u64> {
        self.dispatch_remove(RemoveOptions::default()).await
    }

    pub async fn remove_one(&self) -> DatabaseResult<u64> {
        self.dispatch_remove(RemoveOptions::single()).await
    }

    async fn dispatch_remove(&self, options: RemoveOptions) -> DatabaseResult<u64> {
        let (database, table) = self.target()?;
        database
            .remove(table, RemoveArgs::SelectorOptions(self.selector(), options))
            .await
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::{
        args::FindCall,
        capability::Operation,
        config::DatabaseConfig,
        testing::{SpyFactory, mock_catalog},
    };

    async fn database(factory: &SpyFactory) -> Arc<Database> {
        let config = DatabaseConfig { driver: "mock".into(), blob: "null".into(), ..Default::default() };
        Arc::new(Database::connect(config, &mock_catalog(factory)).await.unwrap())
    }

    #[tokio::test]
    async fn find_dispatches_once_with_deduplicated_fields() {
        let factory = SpyFactory::default();
        let mut builder = Builder::new(database(&factory).await);

        builder.table("t").field("a").field("a").filter("x", 1);
        let rows = builder.find().await.unwrap();

        assert_eq!(rows, vec![doc! { "_id": 1 }]);
        assert_eq!(
            factory.driver().finds(),
            vec![FindCall {
                selector: Some(doc! { "x": 1 }),
                fields: Some(vec!["a".to_string()]),
                options: FindOptions::default(),
            }]
        );
    }

    #[tokio::test]
    async fn options_are_sparse() {
        let factory = SpyFactory::default();
        let mut builder = Builder::new(database(&factory).await);

        builder.table("t").sort("name", SortDirection::Desc).limit(10);
        builder.find_one().await.unwrap();
        builder.next_page().find().await.unwrap();

        let finds = factory.driver().finds();
        assert_eq!(finds[0].selector, None);
        assert_eq!(finds[0].fields, None);
        assert_eq!(
            finds[0].options,
            FindOptions::builder()
                .sort("name", SortDirection::Desc)
                .limit(10)
                .single(true)
                .build()
        );
        assert_eq!(finds[1].options.skip, Some(10));
        assert!(!finds[1].options.single);
    }

    #[tokio::test]
    async fn find_one_reads_the_first_match_on_any_page() {
        let factory = SpyFactory::default();
        let mut builder = Builder::new(database(&factory).await);

        builder.table("t").limit(5).next_page().next_page();
        assert_eq!(builder.top_value(), 10);
        builder.find_one().await.unwrap();

        let finds = factory.driver().finds();
        assert_eq!(finds[0].options.skip, None);
        assert!(finds[0].options.single);
    }

    #[test]
    fn next_page_without_limit_is_a_no_op() {
        let mut builder = Builder::detached();
        builder.top(5).next_page();
        assert_eq!(builder.top_value(), 5);

        builder.limit(3).next_page().next_page();
        assert_eq!(builder.top_value(), 11);
    }

    #[tokio::test]
    async fn terminals_need_table_and_database() {
        let mut builder = Builder::detached();
        builder.table("t");
        assert!(matches!(builder.find().await, Err(DatabaseError::Precondition(_))));

        let factory = SpyFactory::default();
        let mut builder = Builder::new(database(&factory).await);
        assert!(matches!(builder.add().await, Err(DatabaseError::Precondition(_))));
        assert!(factory.driver().calls().is_empty());

        builder.table("t").set("a", 1);
        builder.add().await.unwrap();
        assert_eq!(factory.driver().calls_to(Operation::Add).len(), 1);
    }

    #[tokio::test]
    async fn state_survives_terminals_until_reset() {
        let factory = SpyFactory::default();
        let mut builder = Builder::new(database(&factory).await);

        builder.table("t").filter("x", 1).set("a", 2);
        builder.update_one().await.unwrap();
        builder.remove().await.unwrap();

        let update = &factory.driver().calls_to(Operation::Update)[0];
        assert_eq!(update.args[0], Bson::Document(doc! { "x": 1 }));
        assert_eq!(update.args[1], Bson::Document(doc! { "a": 2 }));
        assert_eq!(
            update.args[2],
            Bson::Document(doc! { "single": true, "upsert": false, "replace": false })
        );
        let remove = &factory.driver().calls_to(Operation::Remove)[0];
        assert_eq!(remove.args[0], Bson::Document(doc! { "x": 1 }));

        builder.reset();
        assert!(builder.conditions().is_empty());
        assert!(builder.values().is_empty());
        assert!(matches!(builder.remove_one().await, Err(DatabaseError::Precondition(_))));
        builder.table("t");
        builder.remove_one().await.unwrap();
        assert_eq!(factory.driver().calls_to(Operation::Remove).len(), 2);
    }
}

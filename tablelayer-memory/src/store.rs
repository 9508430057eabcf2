//! In-memory table storage.
//!
//! Tables are kept as ordered row vectors behind an async-aware read-write lock. Selectors are
//! evaluated by [`SelectorEvaluator`]; every query scans its table.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use tracing::debug;
use uuid::Uuid;

use tablelayer_core::{
    capability::{Capabilities, Operation},
    driver::{Driver, DriverFactory, ROW_ID},
    error::{DatabaseError, DatabaseResult},
    query::{
        AddOptions, FindMode, FindOptions, FindOutput, IndexInfo, IndexOptions, RemoveOptions,
        Sort, UpdateOptions, index_name,
    },
};

use crate::evaluator::{SelectorEvaluator, compare_rows, is_operator_document, lookup};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    schema: Document,
    fields: Document,
    rows: Vec<Document>,
    indexes: Vec<IndexInfo>,
}

impl MemoryTable {
    fn with_schema(schema: Document) -> Self {
        let fields = schema.get_document("fields").cloned().unwrap_or_default();
        Self { schema, fields, ..Default::default() }
    }

    fn matching(&self, selector: Option<&Document>) -> DatabaseResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, row) in self.rows.iter().enumerate() {
            let keep = match selector {
                Some(selector) => SelectorEvaluator::new(row).matches(selector)?,
                None => true,
            };
            if keep {
                positions.push(position);
            }
        }

        Ok(positions)
    }
}

type TableMap = HashMap<String, MemoryTable>;

/// Thread-safe in-memory driver.
///
/// `MemoryDriver` is cloneable; clones share the same tables. Writing to a table that does not
/// exist creates it, as MongoDB does. Indexes are recorded and reported but not enforced.
///
/// # Example
///
/// ```ignore
/// use tablelayer_memory::MemoryDriver;
/// use tablelayer::driver::Driver;
/// use bson::doc;
///
/// let driver = MemoryDriver::new();
/// let id = driver.add("users", doc! { "name": "Alice" }, Default::default()).await?;
/// let rows = driver.find("users", None, None, Default::default()).await?.into_rows()?;
/// assert_eq!(rows[0].get("_id"), Some(&id));
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryDriver {
    tables: Arc<RwLock<TableMap>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_id() -> Bson {
        Bson::String(Uuid::new_v4().simple().to_string())
    }
}

fn table_not_found(table: &str) -> DatabaseError {
    DatabaseError::TableNotFound(table.to_string())
}

/// Keeps `_id` and the requested fields.
fn project(row: &Document, fields: Option<&[String]>) -> Document {
    match fields {
        None => row.clone(),
        Some(fields) => row
            .iter()
            .filter(|(key, _)| key.as_str() == ROW_ID || fields.iter().any(|field| field == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

/// Applies `data` to `row`: update operators, a full replacement, or a field merge.
fn apply_update(row: &mut Document, data: &Document, replace: bool) -> DatabaseResult<()> {
    if is_operator_document(data) {
        for (op, operand) in data {
            let fields = operand.as_document().ok_or_else(|| {
                DatabaseError::InvalidDocument(format!("{op} expects a document"))
            })?;

            for (field, value) in fields {
                match op.as_str() {
                    "$set" => {
                        row.insert(field.clone(), value.clone());
                    }
                    "$unset" => {
                        row.remove(field);
                    }
                    "$inc" => {
                        let current = row.get(field).cloned().unwrap_or(Bson::Int32(0));
                        row.insert(field.clone(), increment(field, &current, value)?);
                    }
                    _ => {
                        return Err(DatabaseError::InvalidDocument(format!(
                            "unsupported update operator {op}"
                        )));
                    }
                }
            }
        }
    } else if replace {
        let mut replacement = Document::new();
        if let Some(id) = row.get(ROW_ID) {
            replacement.insert(ROW_ID, id.clone());
        }
        for (field, value) in data {
            if field != ROW_ID {
                replacement.insert(field.clone(), value.clone());
            }
        }
        *row = replacement;
    } else {
        for (field, value) in data {
            if field != ROW_ID {
                row.insert(field.clone(), value.clone());
            }
        }
    }

    Ok(())
}

fn increment(field: &str, current: &Bson, by: &Bson) -> DatabaseResult<Bson> {
    let overflow = || DatabaseError::InvalidDocument(format!("incrementing {field} overflows"));

    Ok(match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map_or(Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) => {
            Bson::Int64(i64::from(*a).checked_add(*b).ok_or_else(overflow)?)
        }
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(i64::from(*b)).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + f64::from(*b)),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(f64::from(*a) + b),
        _ => {
            return Err(DatabaseError::InvalidDocument(format!(
                "cannot increment non-numeric field {field}"
            )));
        }
    })
}

/// The plain equality fields of a selector, used as the base of an upserted row.
fn equality_fields(selector: Option<&Document>) -> Document {
    selector
        .into_iter()
        .flatten()
        .filter(|(key, value)| {
            !key.starts_with('$')
                && !key.contains('.')
                && !matches!(value, Bson::Document(doc) if is_operator_document(doc))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl Driver for MemoryDriver {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
            .without(Operation::MapReduce)
            .without(Operation::Sql)
    }

    async fn get_tables(&self) -> DatabaseResult<Vec<String>> {
        let mut tables = self.tables.read().await.keys().cloned().collect::<Vec<_>>();
        tables.sort();
        Ok(tables)
    }

    async fn get_schema(&self, table: &str) -> DatabaseResult<Document> {
        let tables = self.tables.read().await;
        let entry = tables.get(table).ok_or_else(|| table_not_found(table))?;

        let mut schema = entry.schema.clone();
        schema.insert("fields", entry.fields.clone());
        Ok(schema)
    }

    async fn create_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Ok(false);
        }

        tables.insert(table.to_string(), MemoryTable::with_schema(schema));
        debug!(table, "memory table created");
        Ok(true)
    }

    async fn alter_table(&self, table: &str, schema: Document) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        if let Ok(fields) = schema.get_document("fields") {
            entry.fields = fields.clone();
        }
        entry.schema = schema;
        Ok(true)
    }

    async fn drop_table(&self, table: &str) -> DatabaseResult<bool> {
        Ok(self.tables.write().await.remove(table).is_some())
    }

    async fn get_fields(&self, table: &str) -> DatabaseResult<Document> {
        let tables = self.tables.read().await;
        let entry = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(entry.fields.clone())
    }

    async fn add_field(&self, table: &str, field: &str, schema: Document) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        if entry.fields.contains_key(field) {
            return Ok(false);
        }

        if let Some(default) = schema.get("default") {
            for row in entry.rows.iter_mut().filter(|row| !row.contains_key(field)) {
                row.insert(field, default.clone());
            }
        }
        entry.fields.insert(field, schema);
        Ok(true)
    }

    async fn alter_field(&self, table: &str, field: &str, mut schema: Document) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        if entry.fields.remove(field).is_none() {
            return Ok(false);
        }

        let name = match schema.remove("rename") {
            Some(Bson::String(new_name)) => {
                for row in entry.rows.iter_mut() {
                    if let Some(value) = row.remove(field) {
                        row.insert(new_name.clone(), value);
                    }
                }
                new_name
            }
            Some(other) => {
                return Err(DatabaseError::InvalidDocument(format!(
                    "rename must be a field name, found {other}"
                )));
            }
            None => field.to_string(),
        };

        entry.fields.insert(name, schema);
        Ok(true)
    }

    async fn remove_field(&self, table: &str, field: &str) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        for row in entry.rows.iter_mut() {
            row.remove(field);
        }
        Ok(entry.fields.remove(field).is_some())
    }

    async fn get_indexes(&self, table: &str) -> DatabaseResult<Vec<IndexInfo>> {
        let tables = self.tables.read().await;
        let entry = tables.get(table).ok_or_else(|| table_not_found(table))?;
        Ok(entry.indexes.clone())
    }

    async fn add_index(&self, table: &str, keys: Vec<Sort>, options: IndexOptions) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let name = index_name(&keys);
        if entry.indexes.iter().any(|index| index.name == name) {
            return Ok(false);
        }

        entry.indexes.push(IndexInfo { name, keys, unique: options.unique });
        Ok(true)
    }

    async fn remove_index(&self, table: &str, keys: Vec<Sort>) -> DatabaseResult<bool> {
        let mut tables = self.tables.write().await;
        let entry = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let name = index_name(&keys);
        let before = entry.indexes.len();
        entry.indexes.retain(|index| index.name != name);
        Ok(entry.indexes.len() != before)
    }

    async fn create_id(&self, _table: Option<&str>) -> DatabaseResult<Bson> {
        Ok(Self::new_id())
    }

    async fn save(&self, table: &str, mut row: Document) -> DatabaseResult<Bson> {
        let id = match row.get(ROW_ID) {
            Some(id) => id.clone(),
            None => {
                let id = Self::new_id();
                row.insert(ROW_ID, id.clone());
                id
            }
        };

        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();

        match entry.rows.iter_mut().find(|existing| existing.get(ROW_ID) == Some(&id)) {
            Some(existing) => *existing = row,
            None => entry.rows.push(row),
        }

        Ok(id)
    }

    async fn find(
        &self,
        table: &str,
        selector: Option<Document>,
        fields: Option<Vec<String>>,
        options: FindOptions,
    ) -> DatabaseResult<FindOutput> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).map(|entry| entry.rows.as_slice()).unwrap_or_default();

        let mut matched = SelectorEvaluator::filter_rows(rows, selector.as_ref())?;
        if !options.sort.is_empty() {
            matched.sort_by(|a, b| compare_rows(a, b, &options.sort));
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let fields = fields.as_deref();

        Ok(match options.mode() {
            FindMode::Scalar(field) => {
                FindOutput::Scalar(matched.first().and_then(|row| lookup(row, field)).cloned())
            }
            FindMode::Single => FindOutput::Row(matched.first().map(|row| project(row, fields))),
            FindMode::Multi => FindOutput::Rows(
                matched
                    .into_iter()
                    .skip(skip)
                    .take(options.limit.map_or(usize::MAX, |limit| limit as usize))
                    .map(|row| project(row, fields))
                    .collect(),
            ),
        })
    }

    async fn add(&self, table: &str, data: Document, _options: AddOptions) -> DatabaseResult<Bson> {
        if data.contains_key(ROW_ID) {
            return Err(DatabaseError::InvalidDocument(format!(
                "new rows must not carry {ROW_ID}"
            )));
        }

        let id = Self::new_id();
        let mut row = Document::new();
        row.insert(ROW_ID, id.clone());
        for (field, value) in data {
            row.insert(field, value);
        }

        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .rows
            .push(row);

        Ok(id)
    }

    async fn update(
        &self,
        table: &str,
        selector: Option<Document>,
        data: Document,
        options: UpdateOptions,
    ) -> DatabaseResult<u64> {
        let mut tables = self.tables.write().await;

        match tables.get_mut(table) {
            Some(entry) => {
                let mut positions = entry.matching(selector.as_ref())?;
                if options.single {
                    positions.truncate(1);
                }

                if !positions.is_empty() || !options.upsert {
                    // every row is updated on a copy first so a failure leaves the table untouched
                    let mut staged = Vec::with_capacity(positions.len());
                    for position in positions {
                        let mut row = entry.rows[position].clone();
                        apply_update(&mut row, &data, options.replace)?;
                        staged.push((position, row));
                    }

                    let changed = staged.len() as u64;
                    for (position, row) in staged {
                        entry.rows[position] = row;
                    }
                    return Ok(changed);
                }
            }
            None if !options.upsert => return Ok(0),
            None => {}
        }

        let mut row = equality_fields(selector.as_ref());
        apply_update(&mut row, &data, options.replace)?;
        if !row.contains_key(ROW_ID) {
            row.insert(ROW_ID, Self::new_id());
        }
        tables.entry(table.to_string()).or_default().rows.push(row);

        Ok(1)
    }

    async fn remove(
        &self,
        table: &str,
        selector: Option<Document>,
        options: RemoveOptions,
    ) -> DatabaseResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut positions = entry.matching(selector.as_ref())?;
        if options.single {
            positions.truncate(1);
        }

        for &position in positions.iter().rev() {
            entry.rows.remove(position);
        }

        Ok(positions.len() as u64)
    }
}

/// Builds [`MemoryDriver`]s. Each build starts with empty tables; the `store` section is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryDriverFactory;

#[async_trait]
impl DriverFactory for MemoryDriverFactory {
    async fn build(&self, _store: &Document) -> DatabaseResult<Arc<dyn Driver>> {
        Ok(Arc::new(MemoryDriver::new()))
    }
}

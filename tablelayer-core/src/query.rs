//! Query options, sort specifications and result shapes shared by the facade and drivers.
//!
//! Options can be built directly or parsed from a BSON document, which is how dynamic callers
//! (definition files, positional argument lists) supply them:
//!
//! ```ignore
//! use tablelayer::query::{FindOptions, SortDirection};
//! use bson::doc;
//!
//! let options = FindOptions::builder()
//!     .sort("created", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//!
//! let parsed = FindOptions::try_from(&doc! { "sort": [["created", -1]], "limit": 10 })?;
//! assert_eq!(options, parsed);
//! ```

use bson::{Bson, Document};

use crate::error::{DatabaseError, DatabaseResult};

/// Sort direction for query results and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// Reads a direction marker. Only `-1`, `false` and `"desc"` mean descending.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::Int32(-1) | Bson::Int64(-1) | Bson::Boolean(false) => SortDirection::Desc,
            Bson::Double(d) if *d == -1.0 => SortDirection::Desc,
            Bson::String(s) if s == "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    /// The MongoDB-style numeric marker (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort specification for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    /// Parses a sort list: a bare field name, or an array whose items are field names or
    /// `[field, direction]` pairs.
    pub fn parse_list(value: &Bson) -> DatabaseResult<Vec<Sort>> {
        match value {
            Bson::String(field) => Ok(vec![Sort::asc(field.clone())]),
            Bson::Array(items) => items
                .iter()
                .map(|item| match item {
                    Bson::String(field) => Ok(Sort::asc(field.clone())),
                    Bson::Array(pair) => match pair.as_slice() {
                        [Bson::String(field)] => Ok(Sort::asc(field.clone())),
                        [Bson::String(field), direction] => Ok(Sort::new(
                            field.clone(),
                            SortDirection::from_bson(direction),
                        )),
                        _ => Err(DatabaseError::ArgumentShape(
                            "sort pairs must be [field, direction]".into(),
                        )),
                    },
                    _ => Err(DatabaseError::ArgumentShape(
                        "sort items must be field names or [field, direction] pairs".into(),
                    )),
                })
                .collect(),
            _ => Err(DatabaseError::ArgumentShape(
                "sort must be a field name or an array".into(),
            )),
        }
    }

    /// Renders a sort list as a `{field: 1 | -1}` document, preserving order.
    pub fn to_document(sorts: &[Sort]) -> Document {
        sorts
            .iter()
            .map(|sort| (sort.field.clone(), Bson::Int32(sort.direction.as_i32())))
            .collect()
    }
}

/// Conventional index name for a key list: `field_1_other_-1`.
pub fn index_name(keys: &[Sort]) -> String {
    keys.iter()
        .map(|key| format!("{}_{}", key.field, key.direction.as_i32()))
        .collect::<Vec<_>>()
        .join("_")
}

/// Options recognised by `find`. Unrecognised keys are kept in `extra` for the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<Sort>,
    /// Rows to skip. `top` is accepted as an alias when parsing.
    pub skip: Option<u64>,
    /// Maximum rows to return; always greater than zero.
    pub limit: Option<u64>,
    /// Return only this field of the first match.
    pub scalar: Option<String>,
    /// Return the first match as a single row.
    pub single: bool,
    pub extra: Document,
}

/// How a driver should shape the result of `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindMode<'a> {
    Multi,
    Single,
    Scalar(&'a str),
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }

    /// `scalar` wins over `single`.
    pub fn mode(&self) -> FindMode<'_> {
        match (&self.scalar, self.single) {
            (Some(field), _) => FindMode::Scalar(field),
            (None, true) => FindMode::Single,
            (None, false) => FindMode::Multi,
        }
    }
}

impl TryFrom<&Document> for FindOptions {
    type Error = DatabaseError;

    fn try_from(document: &Document) -> DatabaseResult<Self> {
        let mut options = FindOptions::default();

        for (key, value) in document {
            match key.as_str() {
                "sort" => options.sort = Sort::parse_list(value)?,
                "skip" | "top" => options.skip = Some(count(key, value)?),
                "limit" => {
                    let limit = count(key, value)?;
                    if limit == 0 {
                        return Err(DatabaseError::ArgumentShape(
                            "limit must be greater than zero".into(),
                        ));
                    }
                    options.limit = Some(limit);
                }
                "scalar" => match value {
                    Bson::String(field) => options.scalar = Some(field.clone()),
                    _ => {
                        return Err(DatabaseError::ArgumentShape(
                            "scalar must be a field name".into(),
                        ));
                    }
                },
                "single" => options.single = flag(key, value)?,
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(options)
    }
}

/// Fluent construction of [`FindOptions`].
#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort::new(field, direction));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// A zero limit is ignored.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn scalar(mut self, field: impl Into<String>) -> Self {
        self.options.scalar = Some(field.into());
        self
    }

    pub fn single(mut self, single: bool) -> Self {
        self.options.single = single;
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Options for `add`. No common keys exist; everything is passed to the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOptions {
    pub extra: Document,
}

impl From<&Document> for AddOptions {
    fn from(document: &Document) -> Self {
        Self { extra: document.clone() }
    }
}

/// Options for `update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Update only the first match.
    pub single: bool,
    /// Insert when nothing matches.
    pub upsert: bool,
    /// Replace the whole row instead of merging fields.
    pub replace: bool,
    pub extra: Document,
}

impl UpdateOptions {
    pub fn single() -> Self {
        Self { single: true, ..Default::default() }
    }
}

impl TryFrom<&Document> for UpdateOptions {
    type Error = DatabaseError;

    fn try_from(document: &Document) -> DatabaseResult<Self> {
        let mut options = UpdateOptions::default();

        for (key, value) in document {
            match key.as_str() {
                "single" => options.single = flag(key, value)?,
                "upsert" => options.upsert = flag(key, value)?,
                "replace" => options.replace = flag(key, value)?,
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(options)
    }
}

/// Options for `remove`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveOptions {
    /// Remove only the first match.
    pub single: bool,
    pub extra: Document,
}

impl RemoveOptions {
    pub fn single() -> Self {
        Self { single: true, ..Default::default() }
    }
}

impl TryFrom<&Document> for RemoveOptions {
    type Error = DatabaseError;

    fn try_from(document: &Document) -> DatabaseResult<Self> {
        let mut options = RemoveOptions::default();

        for (key, value) in document {
            match key.as_str() {
                "single" => options.single = flag(key, value)?,
                _ => {
                    options.extra.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(options)
    }
}

/// Options for `add_index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
}

/// An index as reported by `get_indexes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub keys: Vec<Sort>,
    pub unique: bool,
}

/// The result of `find`, shaped by [`FindOptions::mode`].
#[derive(Debug, Clone, PartialEq)]
pub enum FindOutput {
    Rows(Vec<Document>),
    Row(Option<Document>),
    Scalar(Option<Bson>),
}

impl FindOutput {
    /// The matching rows. A single-row result becomes a list of at most one row.
    pub fn into_rows(self) -> DatabaseResult<Vec<Document>> {
        match self {
            FindOutput::Rows(rows) => Ok(rows),
            FindOutput::Row(row) => Ok(row.into_iter().collect()),
            FindOutput::Scalar(_) => Err(DatabaseError::InvalidDocument(
                "expected rows, found a scalar result".into(),
            )),
        }
    }

    /// The first matching row.
    pub fn into_row(self) -> DatabaseResult<Option<Document>> {
        match self {
            FindOutput::Row(row) => Ok(row),
            FindOutput::Rows(rows) => Ok(rows.into_iter().next()),
            FindOutput::Scalar(_) => Err(DatabaseError::InvalidDocument(
                "expected a row, found a scalar result".into(),
            )),
        }
    }

    pub fn into_scalar(self) -> DatabaseResult<Option<Bson>> {
        match self {
            FindOutput::Scalar(value) => Ok(value),
            _ => Err(DatabaseError::InvalidDocument(
                "expected a scalar result".into(),
            )),
        }
    }
}

fn count(key: &str, value: &Bson) -> DatabaseResult<u64> {
    let count = match value {
        Bson::Int32(n) if *n >= 0 => Some(*n as u64),
        Bson::Int64(n) if *n >= 0 => Some(*n as u64),
        Bson::Double(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
        _ => None,
    };

    count.ok_or_else(|| {
        DatabaseError::ArgumentShape(format!("{key} must be a non-negative integer"))
    })
}

fn flag(key: &str, value: &Bson) -> DatabaseResult<bool> {
    match value {
        Bson::Boolean(b) => Ok(*b),
        Bson::Null => Ok(false),
        _ => Err(DatabaseError::ArgumentShape(format!("{key} must be a boolean"))),
    }
}

//! Call shapes accepted by the variable-argument facade operations.
//!
//! `find`, `add`, `update` and `remove` accept several argument shapes. Each operation has a
//! tagged enum naming the shapes it recognises. Typed callers build the enum directly (usually
//! through a `From` impl); dynamic callers hand a positional argument list to `from_positional`,
//! which resolves it with a single ordered match and rejects anything else as
//! [`DatabaseError::ArgumentShape`].
//!
//! ```ignore
//! use tablelayer::args::FindArgs;
//! use bson::{Bson, doc};
//!
//! let args = FindArgs::from_positional(vec![
//!     Bson::Document(doc! { "active": true }),
//!     Bson::Array(vec!["name".into()]),
//! ])?;
//! assert!(matches!(args, FindArgs::SelectorFields(..)));
//! ```

use bson::{Bson, Document};

use crate::{
    error::{DatabaseError, DatabaseResult},
    query::{AddOptions, FindOptions, RemoveOptions, UpdateOptions},
};

/// The arguments of one `find` call after the table name.
#[derive(Debug, Clone, PartialEq)]
pub enum FindArgs {
    /// `find(table)`
    Table,
    /// `find(table, selector)`
    Selector(Option<Document>),
    /// `find(table, fields)`
    Fields(Vec<String>),
    /// `find(table, selector, options)`
    SelectorOptions(Option<Document>, FindOptions),
    /// `find(table, selector, fields)`
    SelectorFields(Option<Document>, Vec<String>),
    /// `find(table, selector, fields, options)`
    Full(Option<Document>, Option<Vec<String>>, FindOptions),
}

/// The canonical `find` call every shape normalises to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindCall {
    pub selector: Option<Document>,
    pub fields: Option<Vec<String>>,
    pub options: FindOptions,
}

impl FindArgs {
    /// Resolves a positional argument list (without the table name).
    pub fn from_positional(args: Vec<Bson>) -> DatabaseResult<Self> {
        let shape = match args.as_slice() {
            [] => FindArgs::Table,
            [Bson::Array(fields)] => FindArgs::Fields(field_list(fields)?),
            [selector] => FindArgs::Selector(selector_arg(selector)?),
            [selector, Bson::Array(fields)] => {
                FindArgs::SelectorFields(selector_arg(selector)?, field_list(fields)?)
            }
            [selector, Bson::Document(options)] => {
                FindArgs::SelectorOptions(selector_arg(selector)?, FindOptions::try_from(options)?)
            }
            [selector, Bson::Null] => FindArgs::Selector(selector_arg(selector)?),
            [_, other] => return Err(shape_error("find", "fields or options", other)),
            [selector, fields, options] => FindArgs::Full(
                selector_arg(selector)?,
                optional_fields(fields)?,
                optional_find_options(options)?,
            ),
            _ => return Err(arity_error("find", &args)),
        };

        Ok(shape)
    }

    pub fn into_call(self) -> FindCall {
        match self {
            FindArgs::Table => FindCall::default(),
            FindArgs::Selector(selector) => FindCall { selector, ..Default::default() },
            FindArgs::Fields(fields) => FindCall { fields: Some(fields), ..Default::default() },
            FindArgs::SelectorOptions(selector, options) => FindCall { selector, fields: None, options },
            FindArgs::SelectorFields(selector, fields) => FindCall {
                selector,
                fields: Some(fields),
                ..Default::default()
            },
            FindArgs::Full(selector, fields, options) => FindCall { selector, fields, options },
        }
    }
}

impl From<()> for FindArgs {
    fn from(_: ()) -> Self {
        FindArgs::Table
    }
}

impl From<Document> for FindArgs {
    fn from(selector: Document) -> Self {
        FindArgs::Selector(Some(selector))
    }
}

impl From<Vec<String>> for FindArgs {
    fn from(fields: Vec<String>) -> Self {
        FindArgs::Fields(fields)
    }
}

impl From<(Document, FindOptions)> for FindArgs {
    fn from((selector, options): (Document, FindOptions)) -> Self {
        FindArgs::SelectorOptions(Some(selector), options)
    }
}

impl From<(Document, Vec<String>)> for FindArgs {
    fn from((selector, fields): (Document, Vec<String>)) -> Self {
        FindArgs::SelectorFields(Some(selector), fields)
    }
}

impl From<(Document, Vec<String>, FindOptions)> for FindArgs {
    fn from((selector, fields, options): (Document, Vec<String>, FindOptions)) -> Self {
        FindArgs::Full(Some(selector), Some(fields), options)
    }
}

impl From<FindCall> for FindArgs {
    fn from(call: FindCall) -> Self {
        FindArgs::Full(call.selector, call.fields, call.options)
    }
}

/// The arguments of one `add` call after the table name.
#[derive(Debug, Clone, PartialEq)]
pub enum AddArgs {
    /// `add(table, data)`
    Data(Document),
    /// `add(table, data, options)`
    DataOptions(Document, AddOptions),
}

impl AddArgs {
    pub fn from_positional(args: Vec<Bson>) -> DatabaseResult<Self> {
        match args.as_slice() {
            [Bson::Document(data)] => Ok(AddArgs::Data(data.clone())),
            [Bson::Document(data), Bson::Document(options)] => {
                Ok(AddArgs::DataOptions(data.clone(), AddOptions::from(options)))
            }
            [Bson::Document(_), other] => Err(shape_error("add", "options", other)),
            [other, ..] if args.len() <= 2 => Err(shape_error("add", "data", other)),
            _ => Err(arity_error("add", &args)),
        }
    }

    pub fn into_parts(self) -> (Document, AddOptions) {
        match self {
            AddArgs::Data(data) => (data, AddOptions::default()),
            AddArgs::DataOptions(data, options) => (data, options),
        }
    }
}

impl From<Document> for AddArgs {
    fn from(data: Document) -> Self {
        AddArgs::Data(data)
    }
}

impl From<(Document, AddOptions)> for AddArgs {
    fn from((data, options): (Document, AddOptions)) -> Self {
        AddArgs::DataOptions(data, options)
    }
}

/// The arguments of one `update` call after the table name.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateArgs {
    /// `update(table, data)`: every row.
    Data(Document),
    /// `update(table, selector, data)`
    SelectorData(Option<Document>, Document),
    /// `update(table, selector, data, options)`
    Full(Option<Document>, Document, UpdateOptions),
}

impl UpdateArgs {
    pub fn from_positional(args: Vec<Bson>) -> DatabaseResult<Self> {
        match args.as_slice() {
            [Bson::Document(data)] => Ok(UpdateArgs::Data(data.clone())),
            [selector, Bson::Document(data)] => {
                Ok(UpdateArgs::SelectorData(selector_arg(selector)?, data.clone()))
            }
            [selector, Bson::Document(data), Bson::Document(options)] => Ok(UpdateArgs::Full(
                selector_arg(selector)?,
                data.clone(),
                UpdateOptions::try_from(options)?,
            )),
            [_, other] | [_, other, _] if !matches!(other, Bson::Document(_)) => {
                Err(shape_error("update", "data", other))
            }
            [_, _, other] => Err(shape_error("update", "options", other)),
            _ => Err(arity_error("update", &args)),
        }
    }

    pub fn into_parts(self) -> (Option<Document>, Document, UpdateOptions) {
        match self {
            UpdateArgs::Data(data) => (None, data, UpdateOptions::default()),
            UpdateArgs::SelectorData(selector, data) => (selector, data, UpdateOptions::default()),
            UpdateArgs::Full(selector, data, options) => (selector, data, options),
        }
    }
}

impl From<Document> for UpdateArgs {
    fn from(data: Document) -> Self {
        UpdateArgs::Data(data)
    }
}

impl From<(Document, Document)> for UpdateArgs {
    fn from((selector, data): (Document, Document)) -> Self {
        UpdateArgs::SelectorData(Some(selector), data)
    }
}

impl From<(Document, Document, UpdateOptions)> for UpdateArgs {
    fn from((selector, data, options): (Document, Document, UpdateOptions)) -> Self {
        UpdateArgs::Full(Some(selector), data, options)
    }
}

/// The arguments of one `remove` call after the table name.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveArgs {
    /// `remove(table)`: every row.
    All,
    /// `remove(table, selector)`
    Selector(Option<Document>),
    /// `remove(table, selector, options)`
    SelectorOptions(Option<Document>, RemoveOptions),
}

impl RemoveArgs {
    pub fn from_positional(args: Vec<Bson>) -> DatabaseResult<Self> {
        match args.as_slice() {
            [] => Ok(RemoveArgs::All),
            [selector] => Ok(RemoveArgs::Selector(selector_arg(selector)?)),
            [selector, Bson::Document(options)] => Ok(RemoveArgs::SelectorOptions(
                selector_arg(selector)?,
                RemoveOptions::try_from(options)?,
            )),
            [_, other] => Err(shape_error("remove", "options", other)),
            _ => Err(arity_error("remove", &args)),
        }
    }

    pub fn into_parts(self) -> (Option<Document>, RemoveOptions) {
        match self {
            RemoveArgs::All => (None, RemoveOptions::default()),
            RemoveArgs::Selector(selector) => (selector, RemoveOptions::default()),
            RemoveArgs::SelectorOptions(selector, options) => (selector, options),
        }
    }
}

impl From<()> for RemoveArgs {
    fn from(_: ()) -> Self {
        RemoveArgs::All
    }
}

impl From<Document> for RemoveArgs {
    fn from(selector: Document) -> Self {
        RemoveArgs::Selector(Some(selector))
    }
}

impl From<(Document, RemoveOptions)> for RemoveArgs {
    fn from((selector, options): (Document, RemoveOptions)) -> Self {
        RemoveArgs::SelectorOptions(Some(selector), options)
    }
}

fn selector_arg(value: &Bson) -> DatabaseResult<Option<Document>> {
    match value {
        Bson::Document(selector) => Ok(Some(selector.clone())),
        Bson::Null => Ok(None),
        other => Err(shape_error("call", "selector", other)),
    }
}

fn field_list(values: &[Bson]) -> DatabaseResult<Vec<String>> {
    values
        .iter()
        .map(|value| match value {
            Bson::String(name) => Ok(name.clone()),
            other => Err(DatabaseError::ArgumentShape(format!(
                "field names must be strings, found {:?}",
                other.element_type()
            ))),
        })
        .collect()
}

/// A field list that may be passed as `null`.
fn optional_fields(value: &Bson) -> DatabaseResult<Option<Vec<String>>> {
    match value {
        Bson::Array(fields) => Ok(Some(field_list(fields)?)),
        Bson::Null => Ok(None),
        other => Err(shape_error("find", "fields", other)),
    }
}

/// Find options that may be passed as `null`, meaning the defaults.
fn optional_find_options(value: &Bson) -> DatabaseResult<FindOptions> {
    match value {
        Bson::Document(options) => FindOptions::try_from(options),
        Bson::Null => Ok(FindOptions::default()),
        other => Err(shape_error("find", "options", other)),
    }
}

fn shape_error(op: &str, position: &str, value: &Bson) -> DatabaseError {
    DatabaseError::ArgumentShape(format!(
        "{op}: unexpected {:?} as {position}",
        value.element_type()
    ))
}

fn arity_error(op: &str, args: &[Bson]) -> DatabaseError {
    DatabaseError::ArgumentShape(format!("{op}: no call shape takes {} arguments", args.len()))
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn fields(names: &[&str]) -> Bson {
        Bson::Array(names.iter().map(|name| Bson::String(name.to_string())).collect())
    }

    #[test]
    fn find_shapes_normalise_to_one_call() {
        let selector = doc! { "x": 1 };
        let options = doc! { "limit": 5 };

        let table = FindArgs::from_positional(vec![]).unwrap().into_call();
        assert_eq!(table, FindCall::default());

        let call = FindArgs::from_positional(vec![selector.clone().into()]).unwrap().into_call();
        assert_eq!(call.selector, Some(selector.clone()));
        assert_eq!(call.fields, None);

        let call = FindArgs::from_positional(vec![fields(&["a"])]).unwrap().into_call();
        assert_eq!(call.selector, None);
        assert_eq!(call.fields, Some(vec!["a".to_string()]));

        let call = FindArgs::from_positional(vec![selector.clone().into(), options.clone().into()])
            .unwrap()
            .into_call();
        assert_eq!(call.selector, Some(selector.clone()));
        assert_eq!(call.options.limit, Some(5));

        let call = FindArgs::from_positional(vec![selector.clone().into(), fields(&["a", "b"])])
            .unwrap()
            .into_call();
        assert_eq!(call.fields, Some(vec!["a".to_string(), "b".to_string()]));

        let full = FindArgs::from_positional(vec![
            selector.clone().into(),
            fields(&["a"]),
            options.into(),
        ])
        .unwrap();
        assert!(matches!(full, FindArgs::Full(..)));
        let call = full.into_call();
        assert_eq!(call.selector, Some(selector));
        assert_eq!(call.fields, Some(vec!["a".to_string()]));
        assert_eq!(call.options.limit, Some(5));
    }

    #[test]
    fn null_selector_means_every_row() {
        let call = FindArgs::from_positional(vec![Bson::Null, fields(&["a"])])
            .unwrap()
            .into_call();
        assert_eq!(call.selector, None);
        assert_eq!(call.fields, Some(vec!["a".to_string()]));
    }

    #[test]
    fn null_fields_and_options_take_defaults() {
        let selector = doc! { "x": 1 };

        let call = FindArgs::from_positional(vec![selector.clone().into(), Bson::Null])
            .unwrap()
            .into_call();
        assert_eq!(call, FindCall { selector: Some(selector.clone()), ..Default::default() });

        let call = FindArgs::from_positional(vec![Bson::Null, Bson::Null, Bson::Null])
            .unwrap()
            .into_call();
        assert_eq!(call, FindCall::default());

        let call = FindArgs::from_positional(vec![selector.clone().into(), fields(&["a"]), Bson::Null])
            .unwrap()
            .into_call();
        assert_eq!(call.selector, Some(selector));
        assert_eq!(call.fields, Some(vec!["a".to_string()]));
        assert_eq!(call.options, FindOptions::default());
    }

    #[test]
    fn wrong_types_are_reported_by_position() {
        let Err(DatabaseError::ArgumentShape(message)) =
            FindArgs::from_positional(vec![doc! {}.into(), Bson::Int32(1)])
        else {
            panic!("expected an argument shape error");
        };
        assert!(message.contains("fields or options"), "{message}");

        let Err(DatabaseError::ArgumentShape(message)) =
            FindArgs::from_positional(vec![doc! {}.into(), Bson::Null, Bson::Int32(1)])
        else {
            panic!("expected an argument shape error");
        };
        assert!(message.contains("options"), "{message}");
    }

    #[test]
    fn unrecognised_find_shapes() {
        assert!(matches!(
            FindArgs::from_positional(vec![Bson::Int32(42)]),
            Err(DatabaseError::ArgumentShape(_))
        ));
        assert!(matches!(
            FindArgs::from_positional(vec![doc! {}.into(), Bson::Int32(1)]),
            Err(DatabaseError::ArgumentShape(_))
        ));
        assert!(matches!(
            FindArgs::from_positional(vec![doc! {}.into(), fields(&["a"]), fields(&["b"])]),
            Err(DatabaseError::ArgumentShape(_))
        ));
        assert!(matches!(
            FindArgs::from_positional(vec![Bson::Null; 4]),
            Err(DatabaseError::ArgumentShape(_))
        ));
        assert!(matches!(
            FindArgs::from_positional(vec![Bson::Array(vec![Bson::Int32(1)])]),
            Err(DatabaseError::ArgumentShape(_))
        ));
    }

    #[test]
    fn typed_find_shapes() {
        assert_eq!(FindArgs::from(()), FindArgs::Table);
        assert_eq!(
            FindArgs::from((doc! { "x": 1 }, vec!["a".to_string()])),
            FindArgs::SelectorFields(Some(doc! { "x": 1 }), vec!["a".to_string()])
        );
    }

    #[test]
    fn add_shapes() {
        let (data, options) = AddArgs::from_positional(vec![doc! { "a": 1 }.into()])
            .unwrap()
            .into_parts();
        assert_eq!(data, doc! { "a": 1 });
        assert_eq!(options, AddOptions::default());

        let (_, options) =
            AddArgs::from_positional(vec![doc! { "a": 1 }.into(), doc! { "w": 1 }.into()])
                .unwrap()
                .into_parts();
        assert_eq!(options.extra, doc! { "w": 1 });

        assert!(AddArgs::from_positional(vec![]).is_err());
        assert!(AddArgs::from_positional(vec![Bson::Int32(1)]).is_err());
        assert!(AddArgs::from_positional(vec![doc! {}.into(), Bson::Int32(1)]).is_err());
    }

    #[test]
    fn update_shapes() {
        let (selector, data, options) = UpdateArgs::from_positional(vec![doc! { "a": 1 }.into()])
            .unwrap()
            .into_parts();
        assert_eq!(selector, None);
        assert_eq!(data, doc! { "a": 1 });
        assert!(!options.single);

        let (selector, data, _) =
            UpdateArgs::from_positional(vec![doc! { "x": 1 }.into(), doc! { "a": 2 }.into()])
                .unwrap()
                .into_parts();
        assert_eq!(selector, Some(doc! { "x": 1 }));
        assert_eq!(data, doc! { "a": 2 });

        let (_, _, options) = UpdateArgs::from_positional(vec![
            doc! { "x": 1 }.into(),
            doc! { "a": 2 }.into(),
            doc! { "single": true, "upsert": true }.into(),
        ])
        .unwrap()
        .into_parts();
        assert!(options.single);
        assert!(options.upsert);
        assert!(!options.replace);

        assert!(UpdateArgs::from_positional(vec![]).is_err());
        assert!(UpdateArgs::from_positional(vec![doc! {}.into(), Bson::Int32(1)]).is_err());
        assert!(
            UpdateArgs::from_positional(vec![doc! {}.into(), doc! {}.into(), Bson::Int32(1)])
                .is_err()
        );
    }

    #[test]
    fn remove_shapes() {
        assert_eq!(RemoveArgs::from_positional(vec![]).unwrap(), RemoveArgs::All);

        let (selector, options) = RemoveArgs::from_positional(vec![
            doc! { "x": 1 }.into(),
            doc! { "single": true }.into(),
        ])
        .unwrap()
        .into_parts();
        assert_eq!(selector, Some(doc! { "x": 1 }));
        assert!(options.single);

        assert!(RemoveArgs::from_positional(vec![Bson::Int32(1)]).is_err());
        assert!(RemoveArgs::from_positional(vec![doc! {}.into(), Bson::Int32(1)]).is_err());
    }
}

//! Database configuration and declarative configuration rules.
//!
//! Configuration sections are described by static tables of [`FieldRule`]s. A rule table can
//! [`sanitize`] a raw document (replacing invalid or missing values with defaults and collecting
//! [`ConfigIssue`]s), [`test`] it, or render [`help`] for one field. Driver and BLOB-store
//! factories publish rules for their own sections, so a whole configuration can be checked before
//! anything is connected.
//!
//! # Example
//!
//! ```ignore
//! use tablelayer::config::{self, DatabaseConfig};
//! use bson::doc;
//!
//! let mut raw = doc! { "driver": "memory", "readonly": "yes" };
//! let mut issues = Vec::new();
//! config::sanitize(DatabaseConfig::RULES, &mut raw, &mut issues, None);
//!
//! assert_eq!(raw.get_bool("readonly")?, false);
//! assert_eq!(issues[0].name, "readonly");
//! ```

use std::{path::Path, sync::LazyLock};

use bson::{Bson, Document};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    catalog::DriverCatalog,
    error::{DatabaseError, DatabaseResult},
};

pub const DEFAULT_DRIVER: &str = "mongodb";
pub const DEFAULT_BLOB: &str = "file";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]([-_0-9a-z]{0,18}[0-9a-z])?$").expect("identifier pattern is valid")
});

/// Whether `name` is a valid driver, BLOB-store, table-alias or database name.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// The accepted shape of a configuration value.
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    String,
    /// A string matching [`is_identifier`].
    Identifier,
    /// A string matching the given regular expression.
    Pattern(&'static str),
    Bool,
    Integer { min: i64, max: i64 },
    Document,
    /// A path to an existing directory.
    Directory,
}

/// Declarative description of one configuration field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub required: bool,
    pub default: fn() -> Bson,
    pub caption: &'static str,
    pub example: &'static str,
    pub description: &'static str,
}

impl FieldRule {
    fn check(&self, value: &Bson) -> Result<(), String> {
        match (self.kind, value) {
            (RuleKind::String, Bson::String(_)) => Ok(()),
            (RuleKind::Identifier, Bson::String(s)) if is_identifier(s) => Ok(()),
            (RuleKind::Identifier, Bson::String(_)) => Err("not a valid identifier".into()),
            (RuleKind::Pattern(pattern), Bson::String(s)) => {
                let regex = Regex::new(pattern).map_err(|e| e.to_string())?;
                if regex.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("does not match {pattern}"))
                }
            }
            (RuleKind::Directory, Bson::String(s)) if Path::new(s).is_dir() => Ok(()),
            (RuleKind::Directory, Bson::String(_)) => Err("directory not found".into()),
            (RuleKind::Bool, Bson::Boolean(_)) => Ok(()),
            (RuleKind::Integer { min, max }, value) => match integer(value) {
                Some(n) if (min..=max).contains(&n) => Ok(()),
                Some(_) => Err(format!("must be between {min} and {max}")),
                None => Err("must be an integer".into()),
            },
            (RuleKind::Document, Bson::Document(_)) => Ok(()),
            (RuleKind::Bool, _) => Err("must be true or false".into()),
            (RuleKind::Document, _) => Err("must be a document".into()),
            (_, _) => Err("must be a string".into()),
        }
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

/// A problem found while sanitizing a configuration section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the field, e.g. `store.port`.
    pub name: String,
    pub message: String,
    /// The value was missing and a default was used.
    pub warn: bool,
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_string(),
    }
}

/// Replaces missing or invalid values in `target` with the rule defaults and records an issue for
/// each replacement.
pub fn sanitize(
    rules: &[FieldRule],
    target: &mut Document,
    issues: &mut Vec<ConfigIssue>,
    prefix: Option<&str>,
) {
    for rule in rules {
        let outcome = match target.get(rule.name) {
            None | Some(Bson::Null) => Err((true, "not set".to_string())),
            Some(value) => rule.check(value).map_err(|message| (false, message)),
        };

        if let Err((warn, message)) = outcome {
            target.insert(rule.name, (rule.default)());
            issues.push(ConfigIssue {
                name: qualified(prefix, rule.name),
                message,
                warn: warn && !rule.required,
            });
        }
    }
}

/// Checks `target` without modifying it.
///
/// Fails with a configuration error listing every non-warning issue, unless `warn_only` is set,
/// in which case the issues are only logged. Returns all issues found.
pub fn test(rules: &[FieldRule], target: &Document, warn_only: bool) -> DatabaseResult<Vec<ConfigIssue>> {
    let mut issues = Vec::new();
    sanitize(rules, &mut target.clone(), &mut issues, None);

    report(&issues, warn_only)?;

    Ok(issues)
}

fn report(issues: &[ConfigIssue], warn_only: bool) -> DatabaseResult<()> {
    let errors = issues
        .iter()
        .filter(|issue| !issue.warn)
        .map(|issue| format!("{}: {}", issue.name, issue.message))
        .collect::<Vec<_>>();

    if warn_only || errors.is_empty() {
        for issue in issues {
            warn!(field = %issue.name, message = %issue.message, "configuration value replaced by default");
        }
        return Ok(());
    }

    Err(DatabaseError::Configuration(errors.join("; ")))
}

/// Describes the rule called `name`.
pub fn help(rules: &[FieldRule], name: &str) -> Option<String> {
    rules.iter().find(|rule| rule.name == name).map(|rule| {
        format!(
            "{} ({}){}\n  default: {}\n  example: {}\n  {}",
            rule.name,
            rule.caption,
            if rule.required { ", required" } else { "" },
            (rule.default)(),
            rule.example,
            rule.description,
        )
    })
}

fn default_driver() -> Bson {
    Bson::String(DEFAULT_DRIVER.into())
}

fn default_blob() -> Bson {
    Bson::String(DEFAULT_BLOB.into())
}

fn empty_document() -> Bson {
    Bson::Document(Document::new())
}

fn default_values_table() -> Bson {
    Bson::String("val".into())
}

fn default_blob_table() -> Bson {
    Bson::String("blob".into())
}

fn default_false() -> Bson {
    Bson::Boolean(false)
}

/// Configuration of one database connection.
///
/// Deserializes from camelCase keys, so JSON definition files look like
/// `{"driver": "mongodb", "store": {"db": "app"}, "readonly": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    /// Name of the driver in the catalog.
    pub driver: String,
    /// Driver-specific connection settings.
    pub store: Document,
    /// Name of the BLOB store in the catalog.
    pub blob: String,
    /// BLOB-store-specific settings.
    pub blob_store: Document,
    /// Table holding application-wide values.
    pub values_table: String,
    /// Table holding BLOB metadata.
    pub blob_table: String,
    pub readonly: bool,
    /// Allow schema changes. Ignored when `readonly` is set.
    pub modify_schema: bool,
    pub enable_map_reduce: bool,
    pub enable_sql: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            store: Document::new(),
            blob: DEFAULT_BLOB.to_string(),
            blob_store: Document::new(),
            values_table: "val".to_string(),
            blob_table: "blob".to_string(),
            readonly: false,
            modify_schema: false,
            enable_map_reduce: false,
            enable_sql: false,
        }
    }
}

impl DatabaseConfig {
    pub const RULES: &'static [FieldRule] = &[
        FieldRule {
            name: "driver",
            kind: RuleKind::Identifier,
            required: false,
            default: default_driver,
            caption: "database driver",
            example: "mongodb",
            description: "Each kind of database is accessed through its own driver.",
        },
        FieldRule {
            name: "store",
            kind: RuleKind::Document,
            required: false,
            default: empty_document,
            caption: "connection settings",
            example: "{\"db\": \"cocotte\"}",
            description: "Driver specific; see the driver's own rules.",
        },
        FieldRule {
            name: "blob",
            kind: RuleKind::Identifier,
            required: false,
            default: default_blob,
            caption: "BLOB store",
            example: "file",
            description: "Where binary objects are kept.",
        },
        FieldRule {
            name: "blobStore",
            kind: RuleKind::Document,
            required: false,
            default: empty_document,
            caption: "BLOB store settings",
            example: "{\"path\": \"files\"}",
            description: "BLOB store specific; see the store's own rules.",
        },
        FieldRule {
            name: "valuesTable",
            kind: RuleKind::Identifier,
            required: false,
            default: default_values_table,
            caption: "application values table",
            example: "app_values",
            description: "Table holding values shared by the whole application.",
        },
        FieldRule {
            name: "blobTable",
            kind: RuleKind::Identifier,
            required: false,
            default: default_blob_table,
            caption: "BLOB metadata table",
            example: "files",
            description: "Table holding BLOB metadata.",
        },
        FieldRule {
            name: "readonly",
            kind: RuleKind::Bool,
            required: false,
            default: default_false,
            caption: "read only",
            example: "true/false",
            description: "Connections that only read data should be readonly.",
        },
        FieldRule {
            name: "modifySchema",
            kind: RuleKind::Bool,
            required: false,
            default: default_false,
            caption: "schema changes",
            example: "true/false",
            description: "Allows creating and altering tables, fields and indexes. Forced off when readonly.",
        },
        FieldRule {
            name: "enableMapReduce",
            kind: RuleKind::Bool,
            required: false,
            default: default_false,
            caption: "map-reduce",
            example: "true/false",
            description: "Allows map-reduce when the driver supports it.",
        },
        FieldRule {
            name: "enableSql",
            kind: RuleKind::Bool,
            required: false,
            default: default_false,
            caption: "sql",
            example: "true/false",
            description: "Allows raw SQL when the driver supports it.",
        },
    ];

    /// Strictly deserializes a configuration document. Missing keys take their defaults; values of
    /// the wrong type are configuration errors.
    pub fn from_document(document: Document) -> DatabaseResult<Self> {
        bson::de::deserialize_from_document(document)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))
    }

    pub fn from_json(text: &str) -> DatabaseResult<Self> {
        serde_json::from_str(text).map_err(|e| DatabaseError::Configuration(e.to_string()))
    }

    pub fn to_document(&self) -> DatabaseResult<Document> {
        Ok(bson::ser::serialize_to_document(self)?)
    }

    /// Sanitizes a raw configuration including the driver and BLOB-store sections, whose rules
    /// come from the catalog. Unknown driver or BLOB-store names fall back to the defaults.
    pub fn sanitize(
        target: &mut Document,
        issues: &mut Vec<ConfigIssue>,
        prefix: Option<&str>,
        catalog: &DriverCatalog,
    ) {
        sanitize(Self::RULES, target, issues, prefix);

        let driver = target.get_str("driver").unwrap_or(DEFAULT_DRIVER).to_string();
        if catalog.driver(&driver).is_err() {
            target.insert("driver", default_driver());
            issues.push(ConfigIssue {
                name: qualified(prefix, "driver"),
                message: format!("unknown driver {driver:?}"),
                warn: false,
            });
        }

        let blob = target.get_str("blob").unwrap_or(DEFAULT_BLOB).to_string();
        if catalog.blob(&blob).is_err() {
            target.insert("blob", default_blob());
            issues.push(ConfigIssue {
                name: qualified(prefix, "blob"),
                message: format!("unknown BLOB store {blob:?}"),
                warn: false,
            });
        }

        let driver = target.get_str("driver").unwrap_or(DEFAULT_DRIVER).to_string();
        if let (Ok(factory), Ok(store)) = (catalog.driver(&driver), target.get_document_mut("store")) {
            sanitize(factory.rules(), store, issues, Some(&qualified(prefix, "store")));
        }

        let blob = target.get_str("blob").unwrap_or(DEFAULT_BLOB).to_string();
        if let (Ok(factory), Ok(store)) = (catalog.blob(&blob), target.get_document_mut("blobStore")) {
            sanitize(factory.rules(), store, issues, Some(&qualified(prefix, "blobStore")));
        }
    }

    /// Checks identifier fields. Called before a database is constructed.
    pub fn validate(&self) -> DatabaseResult<()> {
        for (key, value) in [
            ("driver", &self.driver),
            ("blob", &self.blob),
            ("valuesTable", &self.values_table),
            ("blobTable", &self.blob_table),
        ] {
            if !is_identifier(value) {
                return Err(DatabaseError::Configuration(format!(
                    "{key} is not a valid identifier: {value:?}"
                )));
            }
        }

        Ok(())
    }
}

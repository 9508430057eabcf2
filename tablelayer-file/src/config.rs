use std::path::PathBuf;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tablelayer_core::{
    config::{self, FieldRule, RuleKind},
    error::{DatabaseError, DatabaseResult},
};

/// The `blobStore` section for the file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBlobConfig {
    /// Directory the objects are written to. Must exist. Defaults to the working directory.
    pub path: PathBuf,
}

impl Default for FileBlobConfig {
    fn default() -> Self {
        Self {
            path: default_dir(),
        }
    }
}

fn default_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_path() -> Bson {
    Bson::String(default_dir().to_string_lossy().into_owned())
}

impl FileBlobConfig {
    pub const RULES: &'static [FieldRule] = &[FieldRule {
        name: "path",
        kind: RuleKind::Directory,
        required: false,
        default: default_path,
        caption: "storage directory",
        example: "/usr/blob_data",
        description: "An existing, writable directory. Directories that do not exist are ignored.",
    }];

    /// Reads a `blobStore` section and checks the resulting directory exists.
    pub fn from_section(section: &Document) -> DatabaseResult<Self> {
        let mut section = section.clone();
        let mut issues = Vec::new();
        config::sanitize(Self::RULES, &mut section, &mut issues, Some("blobStore"));

        for issue in issues.iter().filter(|issue| !issue.warn) {
            warn!(field = %issue.name, message = %issue.message, "file store setting replaced by default");
        }

        let config: Self = bson::de::deserialize_from_document(section)
            .map_err(|e| DatabaseError::Configuration(e.to_string()))?;

        if !config.path.is_dir() {
            return Err(DatabaseError::Configuration(format!(
                "BLOB directory does not exist ({})",
                config.path.display()
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn existing_directory_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().into_owned();

        let config = FileBlobConfig::from_section(&doc! { "path": path }).unwrap();
        assert_eq!(config.path, dir.path());
    }

    #[test]
    fn missing_directory_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().into_owned();

        let mut section = doc! { "path": missing };
        let mut issues = Vec::new();
        config::sanitize(FileBlobConfig::RULES, &mut section, &mut issues, Some("blobStore"));

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].name, "blobStore.path");
        assert!(!issues[0].warn);
        assert_eq!(section.get("path"), Some(&default_path()));
    }

    #[test]
    fn empty_section_uses_working_directory() {
        let config = FileBlobConfig::from_section(&doc! {}).unwrap();

        assert_eq!(config.path, std::env::current_dir().unwrap());
        assert_eq!(config, FileBlobConfig::default());
    }
}

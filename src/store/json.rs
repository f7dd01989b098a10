#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fs, io::ErrorKind, marker::PhantomData, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{Repository, write_atomic};

/// Review flags keyed by student identifier.
pub type ReviewStatus = BTreeMap<String, bool>;

/// A persisted auto-check run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCheckResults {
    /// When the result set was created (RFC 3339).
    pub checked_at: String,
    /// Assignment the results were computed for.
    pub assignment: String,
    /// Diagnostic per student; an empty string means no issues.
    #[serde(default)]
    pub results:    BTreeMap<String, String>,
}

/// A table stored as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    /// Backing file.
    path:  PathBuf,
    /// Marker for the stored type.
    _kind: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T> {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:  path.into(),
            _kind: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Repository for JsonStore<T> {
    type Table = T;

    fn load(&self) -> Result<Option<T>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", self.path.display()));
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .with_context(|| format!("Could not parse {}", self.path.display()))
    }

    fn save(&self, table: &T) -> Result<()> {
        let mut text = serde_json::to_string_pretty(table)
            .with_context(|| format!("Could not serialize {}", self.path.display()))?;
        text.push('\n');
        write_atomic(&self.path, text.as_bytes())
    }
}

/// Review-status table.
pub type ReviewStore = JsonStore<ReviewStatus>;

/// Auto-check result set.
pub type AutoCheckStore = JsonStore<AutoCheckResults>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_check_file_without_results_still_parses() {
        let parsed: AutoCheckResults =
            serde_json::from_str(r#"{"checked_at": "2024-05-01T10:00:00", "assignment": "k1"}"#)
                .unwrap();
        assert!(parsed.results.is_empty());
        assert_eq!(parsed.assignment, "k1");
    }

    #[test]
    fn non_ascii_is_written_verbatim() {
        let mut results = AutoCheckResults::default();
        results
            .results
            .insert("B1".into(), "kadai.cに 感想を記入してください。".into());
        let text = serde_json::to_string_pretty(&results).unwrap();
        assert!(text.contains("感想を記入してください"));
    }
}

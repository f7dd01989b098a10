#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Typed repositories over the three flat files an assignment keeps: the
//! feedback-augmented roster, the review-status table and the auto-check
//! result set.
//!
//! Every save rewrites the whole file through a temporary sibling and an
//! atomic rename. Concurrent writers are not coordinated: the last rename
//! wins, but no reader ever sees a half-written table.

/// Generic JSON-backed repository and the two JSON tables.
pub mod json;
/// The roster table and its feedback-augmented working copy.
pub mod roster;

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub use json::{AutoCheckResults, AutoCheckStore, JsonStore, ReviewStatus, ReviewStore};
pub use roster::{RosterStore, RosterTable};

/// Load/save access to one persisted table.
pub trait Repository {
    /// In-memory form of the table.
    type Table;

    /// Loads the table, or `None` if it has never been written.
    fn load(&self) -> Result<Option<Self::Table>>;

    /// Replaces the persisted table with `table`.
    fn save(&self, table: &Self::Table) -> Result<()>;
}

/// Writes `bytes` to `path` so that the old content is replaced in one step.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Could not create a temporary file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Could not write {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Could not flush {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("Could not replace {}", path.display()))?;
    Ok(())
}

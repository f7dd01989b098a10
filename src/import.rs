#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Creates an assignment from an uploaded roster and a ZIP of student
//! folders.

use std::{
    fs::{self, File},
    io::{self, Cursor},
    path::{Component, Path, PathBuf},
};

use anyhow::Context;

use crate::{
    autocheck::missing_column,
    config::{AssignmentContext, AssignmentManifest, Columns},
    constants::{
        IMPORTED_ROSTER_FILE, IMPORTED_SUBMISSION_DIR, MANIFEST_FILE, MAX_ARCHIVE_BYTES,
        SOURCE_SUFFIX,
    },
    error::{Result, ReviewError},
    store::RosterTable,
};

/// Entries under this top-level directory are metadata added by macOS.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Rejects names that are empty or would leave their parent directory.
fn validate_name(kind: &str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    let mut components = Path::new(trimmed).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if trimmed.is_empty() || !single_normal || trimmed.contains(['/', '\\']) {
        return Err(ReviewError::InvalidInput(format!("`{name}` is not a valid {kind}")));
    }
    Ok(())
}

/// An archive entry that passed the path check.
struct Entry {
    /// Index in the archive.
    index:  usize,
    /// Relative path inside the archive.
    path:   PathBuf,
    /// Whether the entry is a directory.
    is_dir: bool,
}

/// Lists the archive's entries, rejecting any that escape the root.
fn safe_entries<R: io::Read + io::Seek>(archive: &mut zip::ZipArchive<R>) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(archive.len());
    let mut total = 0u64;
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        let path = file
            .enclosed_name()
            .ok_or_else(|| ReviewError::UnsafeArchivePath(file.name().to_string()))?;

        total = total.saturating_add(file.size());
        if total > MAX_ARCHIVE_BYTES {
            return Err(ReviewError::InvalidInput(
                "the archive is too large once uncompressed".to_string(),
            ));
        }

        if path.starts_with(MACOS_METADATA_DIR) || path.as_os_str().is_empty() {
            continue;
        }
        entries.push(Entry {
            index,
            path,
            is_dir: file.is_dir(),
        });
    }
    Ok(entries)
}

/// The single top-level directory wrapping every student folder, if any.
///
/// Only recognised when every file sits at least two levels below it.
fn wrapper_dir(entries: &[Entry]) -> Option<PathBuf> {
    let first = entries
        .iter()
        .find(|e| !e.is_dir)?
        .path
        .components()
        .next()?;
    let wrapper = PathBuf::from(first.as_os_str());
    let wraps_all = entries.iter().all(|e| {
        e.path.starts_with(&wrapper) && (e.is_dir || e.path.components().count() >= 3)
    });
    wraps_all.then_some(wrapper)
}

/// Unpacks a ZIP of student folders into `dest`.
pub fn unpack_submissions(archive_bytes: &[u8], dest: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))?;
    let entries = safe_entries(&mut archive)?;
    let wrapper = wrapper_dir(&entries);

    fs::create_dir_all(dest).with_context(|| format!("Could not create {}", dest.display()))?;
    let mut written = 0;
    for entry in &entries {
        let relative = match &wrapper {
            Some(w) => entry.path.strip_prefix(w).unwrap_or(&entry.path),
            None => entry.path.as_path(),
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let out_path = dest.join(relative);
        if !out_path.starts_with(dest) {
            return Err(ReviewError::UnsafeArchivePath(entry.path.display().to_string()));
        }

        if entry.is_dir {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Could not create {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let mut file = archive.by_index(entry.index)?;
        let mut out = File::create(&out_path)
            .with_context(|| format!("Could not create {}", out_path.display()))?;
        io::copy(&mut file, &mut out)
            .with_context(|| format!("Could not extract {}", entry.path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// Writes roster, submissions and manifest into the fresh directory `dir`.
fn populate(
    dir: &Path,
    name: &str,
    source_base: &str,
    roster_bytes: &[u8],
    archive_bytes: &[u8],
) -> Result<AssignmentManifest> {
    let roster_path = dir.join(IMPORTED_ROSTER_FILE);
    fs::write(&roster_path, roster_bytes)
        .with_context(|| format!("Could not write {}", roster_path.display()))?;

    let files = unpack_submissions(archive_bytes, &dir.join(IMPORTED_SUBMISSION_DIR))?;
    tracing::info!("Unpacked {files} submission files for {name}");

    let manifest = AssignmentManifest {
        name:           name.to_string(),
        source_base:    source_base.to_string(),
        roster_file:    IMPORTED_ROSTER_FILE.to_string(),
        submission_dir: IMPORTED_SUBMISSION_DIR.to_string(),
        columns:        Columns::default(),
        imported_at:    chrono::Local::now().to_rfc3339(),
    };
    let text = serde_json::to_string_pretty(&manifest).context("Could not serialize manifest")?;
    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, text)
        .with_context(|| format!("Could not write {}", manifest_path.display()))?;
    Ok(manifest)
}

/// Creates assignment `name` under `root` from a roster and a submission
/// archive.
///
/// Nothing is left behind if any step fails. An existing assignment with
/// the same name is never overwritten.
pub fn import_assignment(
    root: &Path,
    name: &str,
    source_base: &str,
    roster_bytes: &[u8],
    archive_bytes: &[u8],
) -> Result<AssignmentContext> {
    let name = name.trim();
    let source_base = source_base.trim();
    let source_base = source_base.strip_suffix(SOURCE_SUFFIX).unwrap_or(source_base);
    validate_name("assignment name", name)?;
    validate_name("source file name", source_base)?;

    let roster = RosterTable::from_bytes(roster_bytes)?;
    let columns = Columns::default();
    for column in [&columns.id, &columns.status] {
        if roster.column(column).is_none() {
            return Err(missing_column(column));
        }
    }

    fs::create_dir_all(root).with_context(|| format!("Could not create {}", root.display()))?;
    let dir = root.join(name);
    // create_dir claims the name atomically; a concurrent import loses here
    match fs::create_dir(&dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(ReviewError::AssignmentExists(name.to_string()));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Could not create {}", dir.display()))
                .into());
        }
    }

    match populate(&dir, name, source_base, roster_bytes, archive_bytes) {
        Ok(manifest) => {
            tracing::info!("Imported assignment {name} into {}", dir.display());
            Ok(manifest.context(&dir))
        }
        Err(e) => {
            tracing::warn!("Import of {name} failed, removing {}: {e}", dir.display());
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!("Could not remove {}: {cleanup}", dir.display());
            }
            Err(e)
        }
    }
}

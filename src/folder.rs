#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Locating student submission folders and reading the files inside them.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

/// Whether a directory entry named `name` belongs to `student_id`.
///
/// The identifier must be a prefix of the name and must not run on into
/// further letters or digits, so `123` owns `123_alice` but not `1234_bob`.
fn owns(name: &str, student_id: &str) -> bool {
    match name.strip_prefix(student_id) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_alphanumeric()),
        None => false,
    }
}

/// Finds the submission folder of `student_id` under `submission_root`.
///
/// Only directories are considered. Entries are visited in the order the filesystem returns them and the
/// first one owned by the identifier wins. That order is platform dependent:
/// if two folders carry the same identifier prefix, which one is returned is
/// not specified. Returns `None` when nothing matches or the root cannot be
/// read.
pub fn find_submission_folder(student_id: &str, submission_root: &Path) -> Option<PathBuf> {
    if student_id.is_empty() {
        return None;
    }

    let entries = match fs::read_dir(submission_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Cannot list {}: {e}", submission_root.display());
            return None;
        }
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .find(|e| owns(&e.file_name().to_string_lossy(), student_id))
        .map(|e| e.path())
}

/// Names of the regular files directly inside `folder`, sorted.
pub fn list_files(folder: &Path) -> Vec<String> {
    let mut files: Vec<String> = match fs::read_dir(folder) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Reads a student-authored text file; undecodable bytes become U+FFFD.
///
/// Returns `None` if the file does not exist or cannot be read.
pub fn read_lossy(path: &Path) -> Option<String> {
    fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads a file and silently drops every byte sequence that is not UTF-8.
pub fn read_dropping_invalid(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect())
}

#[cfg(test)]
mod tests {
    use super::owns;

    #[test]
    fn identifier_followed_by_separator_is_owned() {
        assert!(owns("123_alice", "123"));
        assert!(owns("123", "123"));
        assert!(owns("123 山田", "123"));
        assert!(owns("B123456_taro_assignsubmission_file_", "B123456"));
    }

    #[test]
    fn longer_identifiers_and_substrings_are_not_owned() {
        assert!(!owns("1234_bob", "123"));
        assert!(!owns("x123_carol", "123"));
        assert!(!owns("12", "123"));
    }
}

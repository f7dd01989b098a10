#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::time::Duration;

/// Errors surfaced by review operations.
///
/// Expected absences (no folder yet, no cached diagnostic, no review flag)
/// are never errors; they show up as `None` or empty strings instead.
#[derive(thiserror::Error, Debug)]
pub enum ReviewError {
    /// The student identifier is not present in the roster.
    #[error("Student `{0}` was not found in the roster.")]
    StudentNotFound(String),
    /// No assignment with this name is configured or imported.
    #[error("Assignment `{0}` was not found.")]
    AssignmentNotFound(String),
    /// The student has no submission folder.
    #[error("No submission folder was found for `{0}`.")]
    FolderNotFound(String),
    /// The submission folder exists but the requested file does not.
    #[error("`{file}` was not found in the submission of `{student_id}`.")]
    FileNotFound {
        /// Identifier of the student.
        student_id: String,
        /// Name of the missing file.
        file:       String,
    },
    /// The formatter did not finish in time.
    #[error("The formatter did not finish within {0:?}.")]
    FormatterTimeout(Duration),
    /// The formatter exited unsuccessfully.
    #[error("The formatter failed ({status}):\n{stderr}")]
    FormatterFailed {
        /// Exit status, as displayed by the OS.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The formatter executable could not be located or started.
    #[error("The formatter `{0}` could not be started.")]
    FormatterUnavailable(String),
    /// An archive entry would be written outside the import root.
    #[error("Archive entry `{0}` escapes the import directory.")]
    UnsafeArchivePath(String),
    /// The archive could not be read.
    #[error("The archive could not be read: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Uploaded text could not be decoded.
    #[error("The roster could not be decoded: {0}")]
    Encoding(String),
    /// An assignment with this name already exists.
    #[error("Assignment `{0}` already exists.")]
    AssignmentExists(String),
    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Reading or writing one of the backing stores failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ReviewError {
    /// Whether this error means "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReviewError::StudentNotFound(_)
                | ReviewError::AssignmentNotFound(_)
                | ReviewError::FolderNotFound(_)
                | ReviewError::FileNotFound { .. }
        )
    }
}

/// Result alias used throughout the library.
pub type Result<T, E = ReviewError> = std::result::Result<T, E>;

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{ffi::OsString, path::PathBuf};

use which::which;

use crate::{
    config::{AssignmentContext, FormatterSettings},
    error::{Result, ReviewError},
    folder::find_submission_folder,
    process::{RunError, run_collect},
};

/// Locates the formatter executable.
fn formatter_path(program: &str) -> Result<OsString> {
    which(program)
        .map(PathBuf::into_os_string)
        .map_err(|_| ReviewError::FormatterUnavailable(program.to_string()))
}

/// Returns the student's source file reformatted by the external formatter.
///
/// Missing folders and files are reported as not-found errors; a formatter
/// that runs out of time or exits unsuccessfully is reported separately.
pub async fn format_source(
    ctx: &AssignmentContext,
    student_id: &str,
    settings: &FormatterSettings,
) -> Result<String> {
    let folder = find_submission_folder(student_id, ctx.submission_root())
        .ok_or_else(|| ReviewError::FolderNotFound(student_id.to_string()))?;
    let source_file = ctx.source_file_name();
    let path = folder.join(&source_file);
    if !path.is_file() {
        return Err(ReviewError::FileNotFound {
            student_id: student_id.to_string(),
            file:       source_file,
        });
    }

    let program = formatter_path(settings.program())?;
    let args = vec![
        OsString::from(format!("--style={}", settings.style())),
        path.into_os_string(),
    ];

    let captured = match run_collect(&program, &args, Some(settings.timeout())).await {
        Ok(captured) => captured,
        Err(RunError::TimedOut(limit)) => {
            tracing::warn!("Formatter timed out on {student_id} after {limit:?}");
            return Err(ReviewError::FormatterTimeout(limit));
        }
        Err(RunError::Spawn(e)) => {
            tracing::warn!("Could not start {}: {e}", settings.program());
            return Err(ReviewError::FormatterUnavailable(settings.program().to_string()));
        }
        Err(RunError::Io(e)) => return Err(ReviewError::Storage(e)),
    };

    if !captured.status.success() {
        let stderr = String::from_utf8_lossy(&captured.stderr).trim().to_string();
        tracing::warn!("Formatter failed on {student_id}: {stderr}");
        return Err(ReviewError::FormatterFailed {
            status: captured.status.to_string(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&captured.stdout).into_owned())
}

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    constants::{
        AUTO_CHECK_FILE, DEFAULT_ASSIGNMENTS_ROOT, DEFAULT_BIND_ADDR, DEFAULT_FEEDBACK_COLUMN,
        DEFAULT_FORMAT_STYLE, DEFAULT_FORMAT_TIMEOUT_SECS, DEFAULT_FORMATTER, DEFAULT_ID_COLUMN,
        DEFAULT_NAME_COLUMN, DEFAULT_STATUS_COLUMN, DEFAULT_SUBMITTED_MARKER, FEEDBACK_CSV_FILE,
        HISTORY_SUFFIX, MANIFEST_FILE, REVIEW_STATUS_FILE, SOURCE_SUFFIX,
    },
    error::{Result, ReviewError},
};

/// Names of the roster columns the reconciler relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Columns {
    /// Unique student identifier.
    pub id:               String,
    /// Display name.
    pub name:             String,
    /// Free-text submission status.
    pub status:           String,
    /// Instructor feedback comment, added to the working copy on first use.
    pub feedback:         String,
    /// Substring of `status` marking a submitted row.
    pub submitted_marker: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            id:               DEFAULT_ID_COLUMN.to_string(),
            name:             DEFAULT_NAME_COLUMN.to_string(),
            status:           DEFAULT_STATUS_COLUMN.to_string(),
            feedback:         DEFAULT_FEEDBACK_COLUMN.to_string(),
            submitted_marker: DEFAULT_SUBMITTED_MARKER.to_string(),
        }
    }
}

/// Everything that identifies one grading round's data set.
///
/// Every operation takes the context explicitly; two contexts never share
/// any state beyond what they point to on disk.
#[derive(Debug, Clone, TypedBuilder, Serialize)]
#[builder(field_defaults(setter(into)))]
pub struct AssignmentContext {
    /// Label recorded in the auto-check store and used for export names.
    name:            String,
    /// Base name of the source file, e.g. `kadai03` for `kadai03.c`.
    source_base:     String,
    /// Instructor-supplied roster.
    roster_path:     PathBuf,
    /// Directory holding one folder per student.
    submission_root: PathBuf,
    /// Feedback-augmented working copy of the roster.
    feedback_path:   PathBuf,
    /// Review-status table.
    review_path:     PathBuf,
    /// Auto-check result set.
    auto_check_path: PathBuf,
    /// Roster column layout.
    #[builder(default)]
    columns:         Columns,
}

impl AssignmentContext {
    /// Creates a context whose side stores live next to the roster in `dir`.
    pub fn in_dir(
        name: impl Into<String>,
        source_base: impl Into<String>,
        dir: &Path,
        roster_file: &str,
        submission_dir: &str,
    ) -> Self {
        Self::builder()
            .name(name)
            .source_base(source_base)
            .roster_path(dir.join(roster_file))
            .submission_root(dir.join(submission_dir))
            .feedback_path(dir.join(FEEDBACK_CSV_FILE))
            .review_path(dir.join(REVIEW_STATUS_FILE))
            .auto_check_path(dir.join(AUTO_CHECK_FILE))
            .build()
    }

    /// Returns a copy of this context with a different column layout.
    pub fn with_columns(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    /// Assignment label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base name of the source file.
    pub fn source_base(&self) -> &str {
        &self.source_base
    }

    /// Expected source file name, `{base}.c`.
    pub fn source_file_name(&self) -> String {
        format!("{}{SOURCE_SUFFIX}", self.source_base)
    }

    /// Expected test-history file name, `{base}-test-history.txt`.
    pub fn history_file_name(&self) -> String {
        format!("{}{HISTORY_SUFFIX}", self.source_base)
    }

    /// Original roster path.
    pub fn roster_path(&self) -> &Path {
        &self.roster_path
    }

    /// Submission root directory.
    pub fn submission_root(&self) -> &Path {
        &self.submission_root
    }

    /// Feedback-augmented roster path.
    pub fn feedback_path(&self) -> &Path {
        &self.feedback_path
    }

    /// Review-status table path.
    pub fn review_path(&self) -> &Path {
        &self.review_path
    }

    /// Auto-check result set path.
    pub fn auto_check_path(&self) -> &Path {
        &self.auto_check_path
    }

    /// Roster column layout.
    pub fn columns(&self) -> &Columns {
        &self.columns
    }
}

/// On-disk description of an imported assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentManifest {
    /// Assignment label.
    pub name:           String,
    /// Base name of the source file.
    pub source_base:    String,
    /// Roster file name, relative to the assignment directory.
    pub roster_file:    String,
    /// Submission directory name, relative to the assignment directory.
    pub submission_dir: String,
    /// Roster column layout.
    #[serde(default)]
    pub columns:        Columns,
    /// When the assignment was imported.
    pub imported_at:    String,
}

impl AssignmentManifest {
    /// Reads the manifest stored in `dir`.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Could not parse {}", path.display()))
    }

    /// Builds the context described by this manifest, rooted at `dir`.
    pub fn context(&self, dir: &Path) -> AssignmentContext {
        AssignmentContext::in_dir(
            self.name.clone(),
            self.source_base.clone(),
            dir,
            &self.roster_file,
            &self.submission_dir,
        )
        .with_columns(self.columns.clone())
    }
}

/// How the external formatter is invoked.
#[derive(Debug, Clone)]
pub struct FormatterSettings {
    /// Executable name or path.
    program: String,
    /// Value passed as `--style=`.
    style:   String,
    /// Time the formatter may take before it is killed.
    timeout: Duration,
}

impl Default for FormatterSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_FORMATTER.to_string(),
            style:   DEFAULT_FORMAT_STYLE.to_string(),
            timeout: Duration::from_secs(DEFAULT_FORMAT_TIMEOUT_SECS),
        }
    }
}

impl FormatterSettings {
    /// Creates formatter settings.
    pub fn new(program: impl Into<String>, style: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            style: style.into(),
            timeout,
        }
    }

    /// Executable name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Style argument.
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Assignment configured through `ASSIGNMENT_*` variables, if any.
    default_assignment: Option<AssignmentContext>,
    /// Directory holding imported assignments.
    assignments_root:   PathBuf,
    /// Listen address of the HTTP server.
    bind_addr:          String,
    /// Formatter invocation.
    formatter:          FormatterSettings,
}

/// Reads a non-empty, trimmed environment variable.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl Settings {
    /// Reads settings from the environment (call `dotenvy::dotenv` first).
    pub fn from_env() -> Self {
        let default_assignment = match (
            env_var("ASSIGNMENT_DIR"),
            env_var("CSV_FILE"),
            env_var("SUBMISSION_DIR"),
            env_var("ASSIGNMENT_NAME"),
        ) {
            (Some(dir), Some(csv), Some(submissions), Some(name)) => {
                Some(AssignmentContext::in_dir(
                    name.clone(),
                    name,
                    Path::new(&dir),
                    &csv,
                    &submissions,
                ))
            }
            _ => {
                tracing::debug!("ASSIGNMENT_* variables incomplete; no default assignment");
                None
            }
        };

        let timeout = env_var("REVU_FORMAT_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FORMAT_TIMEOUT_SECS);

        Self {
            default_assignment,
            assignments_root: env_var("ASSIGNMENTS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSIGNMENTS_ROOT)),
            bind_addr: env_var("REVU_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            formatter: FormatterSettings::new(
                env_var("REVU_FORMATTER").unwrap_or_else(|| DEFAULT_FORMATTER.to_string()),
                env_var("REVU_FORMAT_STYLE").unwrap_or_else(|| DEFAULT_FORMAT_STYLE.to_string()),
                Duration::from_secs(timeout),
            ),
        }
    }

    /// Builds settings without touching the environment.
    pub fn new(
        default_assignment: Option<AssignmentContext>,
        assignments_root: impl Into<PathBuf>,
        formatter: FormatterSettings,
    ) -> Self {
        Self {
            default_assignment,
            assignments_root: assignments_root.into(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            formatter,
        }
    }

    /// Listen address of the HTTP server.
    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    /// Formatter invocation.
    pub fn formatter(&self) -> &FormatterSettings {
        &self.formatter
    }

    /// Registry over the default and imported assignments.
    pub fn registry(&self) -> AssignmentRegistry {
        AssignmentRegistry::new(self.default_assignment.clone(), self.assignments_root.clone())
    }
}

/// Short description of an available assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentSummary {
    /// Name used to select the assignment.
    pub id:          String,
    /// Assignment label.
    pub name:        String,
    /// Base name of the source file.
    pub source_base: String,
    /// Whether this is the environment-configured assignment.
    pub is_default:  bool,
}

/// Resolves assignment names to contexts.
///
/// Lookups always go back to disk, so assignments imported while the
/// server runs are visible immediately.
#[derive(Debug, Clone)]
pub struct AssignmentRegistry {
    /// Environment-configured assignment.
    default: Option<AssignmentContext>,
    /// Directory holding one sub-directory per imported assignment.
    root:    PathBuf,
}

impl AssignmentRegistry {
    /// Creates a registry.
    pub fn new(default: Option<AssignmentContext>, root: impl Into<PathBuf>) -> Self {
        Self {
            default,
            root: root.into(),
        }
    }

    /// Directory holding imported assignments.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `name`, or the default assignment when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<AssignmentContext> {
        match name {
            None => self
                .default
                .clone()
                .ok_or_else(|| ReviewError::AssignmentNotFound("(default)".to_string())),
            Some(name) => {
                if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                    return Err(ReviewError::InvalidInput(format!(
                        "`{name}` is not a valid assignment name"
                    )));
                }
                let dir = self.root.join(name);
                if dir.join(MANIFEST_FILE).is_file() {
                    return Ok(AssignmentManifest::load(&dir)?.context(&dir));
                }
                match &self.default {
                    Some(ctx) if ctx.name() == name => Ok(ctx.clone()),
                    _ => Err(ReviewError::AssignmentNotFound(name.to_string())),
                }
            }
        }
    }

    /// Lists the default assignment followed by imported ones, sorted by id.
    pub fn list(&self) -> Result<Vec<AssignmentSummary>> {
        let mut out = Vec::new();
        if let Some(ctx) = &self.default {
            out.push(AssignmentSummary {
                id:          ctx.name().to_string(),
                name:        ctx.name().to_string(),
                source_base: ctx.source_base().to_string(),
                is_default:  true,
            });
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };

        let mut imported = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let dir = entry.path();
            if !dir.join(MANIFEST_FILE).is_file() {
                continue;
            }
            match AssignmentManifest::load(&dir) {
                Ok(manifest) => imported.push(AssignmentSummary {
                    id:          entry.file_name().to_string_lossy().into_owned(),
                    name:        manifest.name,
                    source_base: manifest.source_base,
                    is_default:  false,
                }),
                Err(e) => tracing::warn!("Skipping {}: {e:#}", dir.display()),
            }
        }
        imported.sort_by(|a, b| a.id.cmp(&b.id));
        out.extend(imported);
        Ok(out)
    }
}

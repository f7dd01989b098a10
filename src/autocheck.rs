#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    config::AssignmentContext,
    constants::HISTORY_HINT,
    error::{Result, ReviewError},
    folder::{find_submission_folder, read_dropping_invalid},
    header,
    reconcile::submitted_rows,
    store::{AutoCheckResults, AutoCheckStore, Repository, RosterStore},
};

/// Counters reported by a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    /// Submitted rows in the roster.
    pub total:        usize,
    /// Rows that were checked.
    pub checked:      usize,
    /// Rows whose diagnostic is non-empty.
    pub issues_found: usize,
    /// Submitted rows skipped because their identifier cell is blank.
    pub skipped:      usize,
}

/// Whether, when and for which assignment a result set exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckStatus {
    /// Whether any result set has been stored.
    pub checked:    bool,
    /// Creation time of the stored result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<String>,
    /// Assignment label recorded with the result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<String>,
}

/// Message asking for both required files.
pub fn missing_files_message(source_file: &str, history_file: &str) -> String {
    format!("この課題では \"{source_file}\" と \"{history_file}\" を提出してください。")
}

/// Message listing header fields left blank in `source_file`.
pub fn header_message(source_file: &str, missing: &[&str]) -> String {
    format!(
        "{source_file}に{}を記入してください。",
        missing.iter().map(|f| format!(" {f}")).join(",")
    )
}

/// Message for a source file that exists but could not be read.
pub fn unreadable_message(source_file: &str) -> String {
    format!("{source_file}を読み込めませんでした。")
}

/// Derives completeness diagnostics from submission folders.
#[derive(Debug, Clone)]
pub struct AutoCheckEngine<'a> {
    /// Assignment being checked.
    ctx:     &'a AssignmentContext,
    /// Where results are kept.
    results: AutoCheckStore,
}

impl<'a> AutoCheckEngine<'a> {
    /// Creates an engine for `ctx`.
    pub fn new(ctx: &'a AssignmentContext) -> Self {
        Self {
            ctx,
            results: AutoCheckStore::new(ctx.auto_check_path()),
        }
    }

    /// Computes the diagnostic for one student without storing it.
    ///
    /// An empty string means the submission passed every check.
    pub fn check(&self, student_id: &str) -> String {
        let source_file = self.ctx.source_file_name();
        let history_file = self.ctx.history_file_name();
        let folder = find_submission_folder(student_id, self.ctx.submission_root());

        let source_path = folder
            .as_deref()
            .map(|f| f.join(&source_file))
            .filter(|p| p.is_file());
        let history_present = folder
            .as_deref()
            .is_some_and(|f| f.join(&history_file).is_file());

        let mut diagnostic = String::new();
        if source_path.is_none() || !history_present {
            diagnostic.push_str(&missing_files_message(&source_file, &history_file));
            if !history_present {
                diagnostic.push_str(HISTORY_HINT);
            }
        }

        if let Some(source_path) = source_path {
            self.check_header(&source_path, &source_file, &mut diagnostic);
        }

        diagnostic.trim().to_string()
    }

    /// Appends the header message for the source at `path`, if any.
    ///
    /// Bytes that are not valid UTF-8 are dropped before scanning.
    fn check_header(&self, path: &Path, source_file: &str, diagnostic: &mut String) {
        let source = match read_dropping_invalid(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Could not read {}: {e}", path.display());
                diagnostic.push_str(&unreadable_message(source_file));
                return;
            }
        };
        let missing = header::scan(&source);
        if !missing.is_empty() {
            diagnostic.push_str(&header_message(source_file, &missing));
        }
    }

    /// Checks one student and upserts the result into the stored set.
    ///
    /// Other students' entries are left alone; the set's timestamp is only
    /// written when the set is created here.
    pub fn check_student(&self, student_id: &str) -> Result<String> {
        let columns = self.ctx.columns();
        let roster = self.roster().open()?;
        let id_col = roster
            .column(&columns.id)
            .ok_or_else(|| missing_column(&columns.id))?;
        if roster.find_row(id_col, student_id).is_none() {
            return Err(ReviewError::StudentNotFound(student_id.to_string()));
        }

        let diagnostic = self.check(student_id);
        let mut stored = self.results.load()?.unwrap_or_else(|| self.fresh_results());
        stored
            .results
            .insert(student_id.trim().to_string(), diagnostic.clone());
        self.results.save(&stored)?;

        tracing::debug!("Auto-checked {student_id} for {}", self.ctx.name());
        Ok(diagnostic)
    }

    /// Checks every submitted student and replaces the stored result set.
    ///
    /// The new set is built fully in memory and written in one atomic step;
    /// if anything fails before that, the previous set is left untouched.
    pub fn check_all(&self) -> Result<CheckSummary> {
        let columns = self.ctx.columns();
        let roster = self.roster().open()?;
        let id_col = roster
            .column(&columns.id)
            .ok_or_else(|| missing_column(&columns.id))?;

        let mut summary = CheckSummary::default();
        let mut fresh = self.fresh_results();
        for row in submitted_rows(&roster, columns)? {
            summary.total += 1;
            let student_id = roster.cell(row, id_col).trim();
            if student_id.is_empty() {
                summary.skipped += 1;
                continue;
            }

            let diagnostic = self.check(student_id);
            summary.checked += 1;
            if !diagnostic.is_empty() {
                summary.issues_found += 1;
            }
            fresh.results.insert(student_id.to_string(), diagnostic);
        }

        self.results.save(&fresh)?;
        tracing::info!(
            "Auto-check for {}: {} checked, {} with issues, {} skipped",
            self.ctx.name(),
            summary.checked,
            summary.issues_found,
            summary.skipped
        );
        Ok(summary)
    }

    /// Reports whether a result set exists.
    pub fn status(&self) -> Result<CheckStatus> {
        Ok(match self.results.load()? {
            Some(stored) => CheckStatus {
                checked:    true,
                checked_at: Some(stored.checked_at),
                assignment: Some(stored.assignment),
            },
            None => CheckStatus::default(),
        })
    }

    /// Stored diagnostics, if a result set exists.
    pub fn stored(&self) -> Result<Option<AutoCheckResults>> {
        Ok(self.results.load()?)
    }

    /// An empty result set stamped with the current time.
    fn fresh_results(&self) -> AutoCheckResults {
        AutoCheckResults {
            checked_at: chrono::Local::now().to_rfc3339(),
            assignment: self.ctx.name().to_string(),
            results:    Default::default(),
        }
    }

    /// Roster store of the context.
    fn roster(&self) -> RosterStore {
        RosterStore::new(
            self.ctx.roster_path(),
            self.ctx.feedback_path(),
            self.ctx.columns().feedback.clone(),
        )
    }
}

/// Error for a roster lacking a required column.
pub(crate) fn missing_column(name: &str) -> ReviewError {
    ReviewError::InvalidInput(format!("the roster has no `{name}` column"))
}

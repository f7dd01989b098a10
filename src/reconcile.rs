#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Merges the roster, the submission tree, the auto-check result set and the
//! review-status table into one record per student.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    autocheck::{AutoCheckEngine, missing_column},
    config::{AssignmentContext, Columns},
    constants::REVIEWED_KEY,
    error::{Result, ReviewError},
    folder::{find_submission_folder, list_files, read_lossy},
    store::{Repository, ReviewStatus, ReviewStore, RosterStore, RosterTable},
};

/// Indices of the rows whose status contains the submitted marker.
pub fn submitted_rows(table: &RosterTable, columns: &Columns) -> Result<Vec<usize>> {
    let status_col = table
        .column(&columns.status)
        .ok_or_else(|| missing_column(&columns.status))?;
    Ok((0..table.rows().len())
        .filter(|&row| table.cell(row, status_col).contains(&columns.submitted_marker))
        .collect())
}

/// One roster cell after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Column name.
    pub column: String,
    /// Cell text; `None` when the cell is blank.
    pub value:  Option<String>,
}

/// The merged view of one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    /// Identifier; never absent.
    student_id:    String,
    /// Every roster column in file order.
    cells:         Vec<Cell>,
    /// Feedback comment; `Some("")` once an empty comment has been saved.
    feedback:      Option<String>,
    /// Regular files in the submission folder.
    files:         Vec<String>,
    /// Auto-check diagnostic: the cached one in listings, a fresh one in
    /// [`StudentDetail`].
    auto_feedback: String,
    /// Whether feedback has been saved at least once.
    reviewed:      bool,
}

impl StudentRecord {
    /// Student identifier.
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Normalized roster cells.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Value of the cell in `column`; `None` if blank or no such column.
    pub fn cell(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.column == column)
            .and_then(|c| c.value.as_deref())
    }

    /// Feedback comment.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Files in the submission folder.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Auto-check diagnostic carried by this record.
    pub fn auto_feedback(&self) -> &str {
        &self.auto_feedback
    }

    /// Whether the student has been reviewed.
    pub fn reviewed(&self) -> bool {
        self.reviewed
    }
}

impl Serialize for StudentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 3))?;
        for cell in &self.cells {
            map.serialize_entry(&cell.column, &cell.value)?;
        }
        map.serialize_entry("files", &self.files)?;
        map.serialize_entry("auto_feedback", &self.auto_feedback)?;
        map.serialize_entry(REVIEWED_KEY, if self.reviewed { "1" } else { "" })?;
        map.end()
    }
}

/// A student record together with the submitted files' contents.
#[derive(Debug, Clone, Serialize)]
pub struct StudentDetail {
    /// Merged record; its `auto_feedback` is computed now.
    pub student:           StudentRecord,
    /// Source file text; `None` if it was not submitted.
    pub source_code:       Option<String>,
    /// Test-history text; `None` if it was not submitted.
    pub test_history:      Option<String>,
    /// Regular files in the submission folder.
    pub files:             Vec<String>,
    /// Assignment label.
    pub assignment_name:   String,
    /// Diagnostic from the stored result set, empty if none is stored.
    pub auto_check_result: String,
}

/// Reads and writes the per-student view of one assignment.
#[derive(Debug, Clone)]
pub struct RosterReconciler<'a> {
    /// Assignment being reviewed.
    ctx:     &'a AssignmentContext,
    /// Roster and working copy.
    roster:  RosterStore,
    /// Review flags.
    reviews: ReviewStore,
    /// Auto-check engine, used for its stored results.
    engine:  AutoCheckEngine<'a>,
}

impl<'a> RosterReconciler<'a> {
    /// Creates a reconciler for `ctx`.
    pub fn new(ctx: &'a AssignmentContext) -> Self {
        Self {
            ctx,
            roster: RosterStore::new(
                ctx.roster_path(),
                ctx.feedback_path(),
                ctx.columns().feedback.clone(),
            ),
            reviews: ReviewStore::new(ctx.review_path()),
            engine: AutoCheckEngine::new(ctx),
        }
    }

    /// Merged records of all submitted students, in roster order.
    ///
    /// Diagnostics come from the stored result set only; no check is run.
    pub fn list_students(&self) -> Result<Vec<StudentRecord>> {
        let table = self.roster.open()?;
        let id_col = self.id_column(&table)?;
        let reviews = self.reviews.load()?.unwrap_or_default();
        let diagnostics = self.stored_diagnostics()?;

        Ok(submitted_rows(&table, self.ctx.columns())?
            .into_iter()
            .filter(|&row| !table.cell(row, id_col).trim().is_empty())
            .map(|row| self.merge_row(&table, row, id_col, &reviews, &diagnostics))
            .collect())
    }

    /// Merged record and file contents of one student, submitted or not.
    pub fn get_student(&self, student_id: &str) -> Result<StudentDetail> {
        let table = self.roster.open()?;
        let id_col = self.id_column(&table)?;
        let row = table
            .find_row(id_col, student_id)
            .ok_or_else(|| ReviewError::StudentNotFound(student_id.to_string()))?;
        let reviews = self.reviews.load()?.unwrap_or_default();
        let diagnostics = self.stored_diagnostics()?;
        let mut student = self.merge_row(&table, row, id_col, &reviews, &diagnostics);
        let live = self.engine.check(&student.student_id);
        let auto_check_result = std::mem::replace(&mut student.auto_feedback, live);

        let folder = find_submission_folder(student.student_id(), self.ctx.submission_root());
        let read = |name: String| {
            folder
                .as_deref()
                .and_then(|f| read_lossy(&f.join(name)))
        };

        Ok(StudentDetail {
            source_code: read(self.ctx.source_file_name()),
            test_history: read(self.ctx.history_file_name()),
            files: student.files.clone(),
            assignment_name: self.ctx.name().to_string(),
            auto_check_result,
            student,
        })
    }

    /// Stores `comment` verbatim as the student's feedback and marks the
    /// student reviewed.
    ///
    /// An unknown identifier leaves both tables untouched and is reported as
    /// [`ReviewError::StudentNotFound`].
    pub fn save_feedback(&self, student_id: &str, comment: &str) -> Result<()> {
        let mut table = self.roster.open()?;
        let id_col = self.id_column(&table)?;
        let feedback_column = &self.ctx.columns().feedback;
        table.ensure_column(feedback_column);
        let fb_col = table
            .column(feedback_column)
            .ok_or_else(|| missing_column(feedback_column))?;

        let Some(row) = table.find_row(id_col, student_id) else {
            tracing::warn!(
                "Feedback for unknown student {student_id} in {} was not saved",
                self.ctx.name()
            );
            return Err(ReviewError::StudentNotFound(student_id.to_string()));
        };

        table.set_cell(row, fb_col, comment);
        self.roster.save(&table)?;

        let key = table.cell(row, id_col).trim().to_string();
        let mut reviews = self.reviews.load()?.unwrap_or_default();
        reviews.insert(key, true);
        self.reviews.save(&reviews)?;

        tracing::info!("Saved feedback for {student_id} in {}", self.ctx.name());
        Ok(())
    }

    /// The working roster as CSV bytes preceded by a UTF-8 BOM.
    pub fn export_csv(&self) -> Result<Vec<u8>> {
        let table = self.roster.open()?;
        Ok(table.to_csv_bytes(true)?)
    }

    /// File name suggested for [`Self::export_csv`].
    pub fn export_file_name(&self) -> String {
        format!("feedback_{}.csv", self.ctx.name())
    }

    /// Index of the identifier column.
    fn id_column(&self, table: &RosterTable) -> Result<usize> {
        let id = &self.ctx.columns().id;
        table.column(id).ok_or_else(|| missing_column(id))
    }

    /// Stored diagnostics, or an empty map if no check has run.
    fn stored_diagnostics(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .engine
            .stored()?
            .map(|stored| stored.results)
            .unwrap_or_default())
    }

    /// Builds the merged record of `row`.
    fn merge_row(
        &self,
        table: &RosterTable,
        row: usize,
        id_col: usize,
        reviews: &ReviewStatus,
        diagnostics: &BTreeMap<String, String>,
    ) -> StudentRecord {
        let student_id = table.cell(row, id_col).trim().to_string();
        let reviewed = reviews.get(&student_id).copied().unwrap_or(false);
        let feedback_column = &self.ctx.columns().feedback;

        let cells = table
            .headers()
            .iter()
            .enumerate()
            .map(|(col, column)| {
                let raw = table.cell(row, col);
                let value = if col == id_col {
                    Some(student_id.clone())
                } else if column == feedback_column && reviewed {
                    Some(raw.to_string())
                } else if raw.is_empty() {
                    None
                } else {
                    Some(raw.to_string())
                };
                Cell {
                    column: column.clone(),
                    value,
                }
            })
            .collect::<Vec<_>>();

        let feedback = cells
            .iter()
            .find(|c| &c.column == feedback_column)
            .and_then(|c| c.value.clone());

        let files = find_submission_folder(&student_id, self.ctx.submission_root())
            .map(|folder| list_files(&folder))
            .unwrap_or_default();

        StudentRecord {
            auto_feedback: diagnostics.get(&student_id).cloned().unwrap_or_default(),
            student_id,
            cells,
            feedback,
            files,
            reviewed,
        }
    }
}

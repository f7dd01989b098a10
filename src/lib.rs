//! # revu
//!
//! Review console for C programming assignments: reconciles the course
//! roster with student submission folders, checks each submission for the
//! required files and header fields, and records instructor feedback.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Submission completeness checks and their stored results
pub mod autocheck;
/// Assignment contexts, process settings and the assignment registry
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Error type shared by every operation
pub mod error;
/// Locating student folders in the submission tree
pub mod folder;
/// Running the external source formatter
pub mod formatter;
/// Header comment scanning
pub mod header;
/// Creating assignments from uploaded archives
pub mod import;
/// Running subprocesses with a deadline
pub mod process;
/// Merged per-student views and feedback persistence
pub mod reconcile;
/// HTTP API
pub mod server;
/// On-disk stores: roster working copy, review flags, auto-check results
pub mod store;

pub use autocheck::{AutoCheckEngine, CheckStatus, CheckSummary};
pub use config::{AssignmentContext, AssignmentRegistry, Columns, FormatterSettings, Settings};
pub use error::{Result, ReviewError};
pub use folder::find_submission_folder;
pub use reconcile::{RosterReconciler, StudentDetail, StudentRecord};

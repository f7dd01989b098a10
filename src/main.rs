#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # revu
//! ## Introduction
//!
//! A review console for C programming assignments.
//!
//! `revu serve` starts the HTTP API; the other subcommands run the same
//! operations once from the terminal.
//!
//! ## Configuration
//!
//! Settings are read from the environment, and from a `.env` file in the
//! working directory if present. `ASSIGNMENT_DIR`, `CSV_FILE`,
//! `SUBMISSION_DIR` and `ASSIGNMENT_NAME` together describe the default
//! assignment; imported assignments live under `ASSIGNMENTS_ROOT`.

use std::{path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use revu::{
    AssignmentContext, AutoCheckEngine, RosterReconciler, Settings, StudentRecord,
    formatter::format_source, import::import_assignment, server,
};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Start the HTTP API
    Serve,
    /// List submitted students
    List(Option<String>),
    /// Show one student
    Show(Option<String>, String),
    /// Check one student, or every submitted student
    Check(Option<String>, Option<String>),
    /// Check every submitted student
    CheckAll(Option<String>),
    /// Report whether a result set exists
    Status(Option<String>),
    /// Save a feedback comment
    Feedback(Option<String>, String, String),
    /// Write the feedback roster to a file
    Export(Option<String>, Option<PathBuf>),
    /// Print one student's formatted source
    Format(Option<String>, String),
    /// List available assignments
    Assignments,
    /// Create an assignment from a roster and a ZIP of submissions
    Import(String, String, PathBuf, PathBuf),
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the assignment selector
    fn a() -> impl Parser<Option<String>> {
        long("assignment")
            .short('a')
            .help("Imported assignment to use instead of the default one")
            .argument::<String>("NAME")
            .optional()
    }

    /// parses a student identifier
    fn s() -> impl Parser<String> {
        positional("ID").help("Student identifier")
    }

    let serve = pure(Cmd::Serve)
        .to_options()
        .command("serve")
        .help("Start the HTTP API");

    let list = construct!(Cmd::List(a()))
        .to_options()
        .command("list")
        .help("List submitted students");

    let show = construct!(Cmd::Show(a(), s()))
        .to_options()
        .command("show")
        .help("Show one student's record and files");

    let check_id = positional::<String>("ID")
        .help("Student identifier; all submitted students if omitted")
        .optional();
    let check = construct!(Cmd::Check(a(), check_id))
        .to_options()
        .command("check")
        .help("Run the completeness check and store the result");

    let check_all = construct!(Cmd::CheckAll(a()))
        .to_options()
        .command("check-all")
        .help("Check every submitted student, replacing stored results");

    let status = construct!(Cmd::Status(a()))
        .to_options()
        .command("status")
        .help("Report whether a check has been run");

    let comment = positional::<String>("COMMENT").help("Feedback comment; may be empty");
    let feedback = construct!(Cmd::Feedback(a(), s(), comment))
        .to_options()
        .command("feedback")
        .help("Save a feedback comment and mark the student reviewed");

    let path = positional::<PathBuf>("PATH")
        .help("Output file; defaults to feedback_<assignment>.csv")
        .optional();
    let export = construct!(Cmd::Export(a(), path))
        .to_options()
        .command("export")
        .help("Write the feedback roster as CSV");

    let format = construct!(Cmd::Format(a(), s()))
        .to_options()
        .command("format")
        .help("Print a student's source through the formatter");

    let assignments = pure(Cmd::Assignments)
        .to_options()
        .command("assignments")
        .help("List available assignments");

    let name = positional::<String>("NAME").help("Name of the new assignment");
    let base = positional::<String>("BASE").help("Source file base name, e.g. kadai03");
    let roster = positional::<PathBuf>("ROSTER").help("Roster CSV");
    let zip = positional::<PathBuf>("ZIP").help("ZIP of student folders");
    let import = construct!(Cmd::Import(name, base, roster, zip))
        .to_options()
        .command("import")
        .help("Create an assignment from a roster and a submission archive");

    let cmd = construct!([
        serve,
        list,
        show,
        check,
        check_all,
        status,
        feedback,
        export,
        format,
        assignments,
        import
    ]);

    cmd.to_options()
        .descr("Review console for C programming assignments")
        .run()
}

/// One line of the student table.
#[derive(Tabled)]
struct StudentRow {
    /// Identifier
    #[tabled(rename = "ID")]
    id:       String,
    /// Display name
    #[tabled(rename = "Name")]
    name:     String,
    /// Number of submitted files
    #[tabled(rename = "Files")]
    files:    usize,
    /// Review flag
    #[tabled(rename = "Reviewed")]
    reviewed: String,
    /// Stored diagnostic
    #[tabled(rename = "Auto-check")]
    issues:   String,
}

impl StudentRow {
    /// Builds the row for `record`, reading the name from `name_column`.
    fn new(record: &StudentRecord, name_column: &str) -> Self {
        Self {
            id:       record.student_id().to_string(),
            name:     record.cell(name_column).unwrap_or_default().to_string(),
            files:    record.files().len(),
            reviewed: if record.reviewed() { "yes" } else { "" }.to_string(),
            issues:   record.auto_feedback().to_string(),
        }
    }
}

/// Prints the submitted students of `ctx` as a table.
fn print_students(ctx: &AssignmentContext) -> Result<()> {
    let records = RosterReconciler::new(ctx).list_students()?;
    let rows = records
        .iter()
        .map(|r| StudentRow::new(r, &ctx.columns().name))
        .collect::<Vec<_>>();
    println!(
        "{}",
        Table::new(&rows)
            .with(Panel::header(format!(
                "{}: {} submitted",
                ctx.name(),
                rows.len()
            )))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(40).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
    );
    Ok(())
}

/// Log level from `REVU_LOG`, INFO if unset or unparseable.
fn log_level() -> Level {
    std::env::var("REVU_LOG")
        .ok()
        .and_then(|s| Level::from_str(s.trim()).ok())
        .unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(log_level());
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let settings = Settings::from_env();
    let registry = settings.registry();
    let cmd = options();

    match cmd {
        Cmd::Serve => server::serve(settings).await?,
        Cmd::List(a) => print_students(&registry.resolve(a.as_deref())?)?,
        Cmd::Show(a, id) => {
            let ctx = registry.resolve(a.as_deref())?;
            let detail = RosterReconciler::new(&ctx).get_student(&id)?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
        Cmd::Check(a, Some(id)) => {
            let ctx = registry.resolve(a.as_deref())?;
            let diagnostic = AutoCheckEngine::new(&ctx).check_student(&id)?;
            if diagnostic.is_empty() {
                println!("{id}: no issues");
            } else {
                println!("{id}: {diagnostic}");
            }
        }
        Cmd::Check(a, None) | Cmd::CheckAll(a) => {
            let ctx = registry.resolve(a.as_deref())?;
            let summary = AutoCheckEngine::new(&ctx).check_all()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Cmd::Status(a) => {
            let ctx = registry.resolve(a.as_deref())?;
            let status = AutoCheckEngine::new(&ctx).status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Cmd::Feedback(a, id, comment) => {
            let ctx = registry.resolve(a.as_deref())?;
            RosterReconciler::new(&ctx).save_feedback(&id, &comment)?;
        }
        Cmd::Export(a, path) => {
            let ctx = registry.resolve(a.as_deref())?;
            let reconciler = RosterReconciler::new(&ctx);
            let path = path.unwrap_or_else(|| PathBuf::from(reconciler.export_file_name()));
            std::fs::write(&path, reconciler.export_csv()?)
                .with_context(|| format!("Could not write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        Cmd::Format(a, id) => {
            let ctx = registry.resolve(a.as_deref())?;
            print!("{}", format_source(&ctx, &id, settings.formatter()).await?);
        }
        Cmd::Assignments => {
            println!("{}", serde_json::to_string_pretty(&registry.list()?)?);
        }
        Cmd::Import(name, base, roster, zip) => {
            let roster_bytes = std::fs::read(&roster)
                .with_context(|| format!("Could not read {}", roster.display()))?;
            let zip_bytes =
                std::fs::read(&zip).with_context(|| format!("Could not read {}", zip.display()))?;
            let ctx =
                import_assignment(registry.root(), &name, &base, &roster_bytes, &zip_bytes)?;
            eprintln!("Imported {} ({})", ctx.name(), ctx.source_file_name());
        }
    };

    Ok(())
}

use std::fs;

use revu::{
    AutoCheckEngine, ReviewError,
    autocheck::{header_message, missing_files_message, unreadable_message},
    constants::HISTORY_HINT,
};

#[path = "review_support.rs"]
mod review_support;

use review_support::{
    Fixture, HISTORY_FILE, NO_REFLECTION_SOURCE, SOURCE_FILE, read,
};

#[test]
fn missing_folder_names_both_files_and_skips_the_header() {
    let fx = Fixture::new("autocheck");
    let diagnostic = AutoCheckEngine::new(&fx.ctx).check("B001");

    assert!(diagnostic.starts_with(&missing_files_message(SOURCE_FILE, HISTORY_FILE)));
    assert!(diagnostic.contains(HISTORY_HINT.trim()));
    assert!(!diagnostic.contains("記入してください"));
}

#[test]
fn complete_submission_has_no_issues() {
    let fx = Fixture::new("autocheck");
    fx.submit_complete("B001_yamada");

    assert_eq!(AutoCheckEngine::new(&fx.ctx).check("B001"), "");
}

#[test]
fn missing_history_and_blank_field_are_both_reported() {
    let fx = Fixture::new("autocheck");
    fx.submit("B002_sato", &[(SOURCE_FILE, NO_REFLECTION_SOURCE)]);

    let diagnostic = AutoCheckEngine::new(&fx.ctx).check("B002");
    assert!(diagnostic.starts_with(&missing_files_message(SOURCE_FILE, HISTORY_FILE)));
    assert!(diagnostic.contains(HISTORY_HINT.trim()));
    assert!(diagnostic.ends_with(&header_message(SOURCE_FILE, &["感想"])));
}

#[test]
fn undecodable_bytes_do_not_count_as_header_content() {
    let fx = Fixture::new("autocheck");
    let dir = fx.submit("B002_sato", &[(HISTORY_FILE, "ok\n")]);
    let (head, tail) = NO_REFLECTION_SOURCE
        .split_once("感想:")
        .expect("reflection label");
    let source = [
        head.as_bytes(),
        "感想: ".as_bytes(),
        &b"\xff\xfe"[..],
        tail.as_bytes(),
    ]
    .concat();
    fs::write(dir.join(SOURCE_FILE), &source).expect("write source");

    let diagnostic = AutoCheckEngine::new(&fx.ctx).check("B002");
    assert_eq!(diagnostic, header_message(SOURCE_FILE, &["感想"]));
}

#[cfg(unix)]
#[test]
fn unreadable_source_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new("autocheck");
    let dir = fx.submit_complete("B001_yamada");
    let source = dir.join(SOURCE_FILE);
    fs::set_permissions(&source, fs::Permissions::from_mode(0o000)).expect("chmod source");
    if fs::read(&source).is_ok() {
        // permission bits are not enforced for this user
        return;
    }

    let diagnostic = AutoCheckEngine::new(&fx.ctx).check("B001");
    assert_eq!(diagnostic, unreadable_message(SOURCE_FILE));
}

#[test]
fn missing_source_omits_the_history_hint() {
    let fx = Fixture::new("autocheck");
    fx.submit("B001_yamada", &[(HISTORY_FILE, "ok\n")]);

    let diagnostic = AutoCheckEngine::new(&fx.ctx).check("B001");
    assert_eq!(diagnostic, missing_files_message(SOURCE_FILE, HISTORY_FILE));
}

#[test]
fn batch_run_is_repeatable_and_counts_issues() {
    let fx = Fixture::new("autocheck");
    fx.submit_complete("B001_yamada");
    let engine = AutoCheckEngine::new(&fx.ctx);

    let summary = engine.check_all().expect("first run");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.issues_found, 1);
    assert_eq!(summary.skipped, 0);
    let first = engine.stored().expect("load").expect("result set").results;

    engine.check_all().expect("second run");
    let second = engine.stored().expect("load").expect("result set").results;

    assert_eq!(first, second);
    assert_eq!(first.keys().collect::<Vec<_>>(), ["B001", "B002"]);
    assert_eq!(first["B001"], "");
    assert!(!first.contains_key("B003"));
}

#[test]
fn batch_run_replaces_stale_entries() {
    let fx = Fixture::new("autocheck");
    fs::write(
        fx.ctx.auto_check_path(),
        r#"{"checked_at": "2020-01-01T00:00:00+09:00", "assignment": "old", "results": {"GHOST": "x"}}"#,
    )
    .expect("seed results");

    AutoCheckEngine::new(&fx.ctx).check_all().expect("run");

    let stored = read(fx.ctx.auto_check_path());
    assert!(!stored.contains("GHOST"));
    assert!(!stored.contains("2020-01-01"));
    assert!(stored.contains("\"assignment\": \"kadai3\""));
}

#[test]
fn blank_identifiers_are_skipped() {
    let roster = "広大ID,フルネーム,ステータス\nB001,山田 太郎,提出済み\n,名無し,提出済み\n";
    let fx = Fixture::with_roster("autocheck", roster.as_bytes());

    let summary = AutoCheckEngine::new(&fx.ctx).check_all().expect("run");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn single_check_upserts_without_touching_others() {
    let fx = Fixture::new("autocheck");
    let engine = AutoCheckEngine::new(&fx.ctx);
    engine.check_all().expect("batch run");
    let before = engine.stored().expect("load").expect("result set");
    assert_ne!(before.results["B002"], "");

    fx.submit_complete("B002_sato");
    let diagnostic = engine.check_student("B002").expect("single run");
    assert_eq!(diagnostic, "");

    let after = engine.stored().expect("load").expect("result set");
    assert_eq!(after.checked_at, before.checked_at);
    assert_eq!(after.results["B002"], "");
    assert_eq!(after.results["B001"], before.results["B001"]);
}

#[test]
fn single_check_creates_the_result_set() {
    let fx = Fixture::new("autocheck");
    let engine = AutoCheckEngine::new(&fx.ctx);
    assert!(engine.stored().expect("load").is_none());

    engine.check_student("B003").expect("single run");

    let stored = engine.stored().expect("load").expect("result set");
    assert_eq!(stored.results.len(), 1);
    assert_eq!(stored.assignment, "kadai3");
}

#[test]
fn single_check_of_unknown_student_is_not_found() {
    let fx = Fixture::new("autocheck");
    let err = AutoCheckEngine::new(&fx.ctx)
        .check_student("NOBODY")
        .expect_err("unknown student");
    assert!(matches!(err, ReviewError::StudentNotFound(ref id) if id == "NOBODY"));
    assert!(!fx.ctx.auto_check_path().exists());
}

#[test]
fn status_reflects_the_stored_set() {
    let fx = Fixture::new("autocheck");
    let engine = AutoCheckEngine::new(&fx.ctx);

    let status = engine.status().expect("status");
    assert!(!status.checked);
    assert_eq!(status.checked_at, None);

    engine.check_all().expect("run");
    let status = engine.status().expect("status");
    assert!(status.checked);
    assert!(status.checked_at.is_some());
    assert_eq!(status.assignment.as_deref(), Some("kadai3"));
}

use std::fs;

use revu::{
    AssignmentRegistry, AutoCheckEngine, ReviewError, RosterReconciler,
    import::import_assignment,
};

#[path = "review_support.rs"]
mod review_support;

use review_support::{COMPLETE_SOURCE, HISTORY_FILE, ROSTER, SOURCE_FILE, temp_root, zip_bytes};

#[test]
fn wrapped_archive_is_unpacked_into_a_usable_assignment() {
    let root = temp_root("import");
    let archive = zip_bytes(&[
        ("kadai3/", ""),
        ("kadai3/B001_yamada/kadai3.c", COMPLETE_SOURCE),
        ("kadai3/B001_yamada/kadai3-test-history.txt", "ok\n"),
        ("kadai3/B002_sato/kadai3.c", "int main(void) { return 0; }\n"),
        ("__MACOSX/kadai3/._B001_yamada", "junk"),
    ]);

    let ctx = import_assignment(&root, "week3", "kadai3.c", ROSTER.as_bytes(), &archive)
        .expect("import");

    assert_eq!(ctx.name(), "week3");
    assert_eq!(ctx.source_file_name(), SOURCE_FILE);
    let submissions = root.join("week3").join("submissions");
    assert!(submissions.join("B001_yamada").join(SOURCE_FILE).is_file());
    assert!(submissions.join("B001_yamada").join(HISTORY_FILE).is_file());
    assert!(!submissions.join("kadai3").exists());
    assert!(!submissions.join("__MACOSX").exists());

    let registry = AssignmentRegistry::new(None, &root);
    let resolved = registry.resolve(Some("week3")).expect("resolve");
    assert_eq!(resolved.submission_root(), submissions.as_path());

    let listed = registry.list().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "week3");
    assert!(!listed[0].is_default);

    assert_eq!(AutoCheckEngine::new(&resolved).check("B001"), "");
    let students = RosterReconciler::new(&resolved)
        .list_students()
        .expect("students");
    assert_eq!(students[0].files().len(), 2);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn flat_archive_is_unpacked_as_is() {
    let root = temp_root("import");
    let archive = zip_bytes(&[("B001_yamada/kadai3.c", COMPLETE_SOURCE)]);

    import_assignment(&root, "flat", "kadai3", ROSTER.as_bytes(), &archive).expect("import");

    assert!(
        root.join("flat")
            .join("submissions")
            .join("B001_yamada")
            .join(SOURCE_FILE)
            .is_file()
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn traversal_entries_are_rejected_and_nothing_is_left_behind() {
    let root = temp_root("import");
    let archive = zip_bytes(&[
        ("B001_yamada/kadai3.c", COMPLETE_SOURCE),
        ("../escaped.c", "int main(void) { return 1; }\n"),
    ]);

    let err = import_assignment(&root, "evil", "kadai3", ROSTER.as_bytes(), &archive)
        .expect_err("unsafe archive");

    assert!(matches!(err, ReviewError::UnsafeArchivePath(_)));
    assert!(!root.join("evil").exists());
    assert!(!root.join("escaped.c").exists());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn corrupt_archive_is_rejected_and_cleaned_up() {
    let root = temp_root("import");

    let err = import_assignment(&root, "broken", "kadai3", ROSTER.as_bytes(), b"not a zip")
        .expect_err("corrupt archive");

    assert!(matches!(err, ReviewError::Archive(_)));
    assert!(!root.join("broken").exists());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn existing_assignment_is_never_overwritten() {
    let root = temp_root("import");
    let archive = zip_bytes(&[("B001_yamada/kadai3.c", COMPLETE_SOURCE)]);
    import_assignment(&root, "week3", "kadai3", ROSTER.as_bytes(), &archive).expect("first");
    let manifest = fs::read(root.join("week3").join("assignment.json")).expect("manifest");

    let err = import_assignment(&root, "week3", "kadai4", ROSTER.as_bytes(), &archive)
        .expect_err("second import");

    assert!(matches!(err, ReviewError::AssignmentExists(ref name) if name == "week3"));
    assert_eq!(
        fs::read(root.join("week3").join("assignment.json")).expect("manifest"),
        manifest
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn roster_without_required_columns_is_rejected() {
    let root = temp_root("import");
    let archive = zip_bytes(&[("B001_yamada/kadai3.c", COMPLETE_SOURCE)]);

    let err = import_assignment(&root, "week3", "kadai3", "名前,点数\n山田,1\n".as_bytes(), &archive)
        .expect_err("bad roster");

    assert!(matches!(err, ReviewError::InvalidInput(_)));
    assert!(!root.join("week3").exists());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn path_like_names_are_rejected() {
    let root = temp_root("import");
    let archive = zip_bytes(&[("B001_yamada/kadai3.c", COMPLETE_SOURCE)]);

    for name in ["../week3", "a/b", ""] {
        let err = import_assignment(&root, name, "kadai3", ROSTER.as_bytes(), &archive)
            .expect_err("invalid name");
        assert!(matches!(err, ReviewError::InvalidInput(_)));
    }
    assert!(fs::read_dir(&root).expect("root").next().is_none());

    let _ = fs::remove_dir_all(root);
}

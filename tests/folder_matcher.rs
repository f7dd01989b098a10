use std::fs;

use revu::find_submission_folder;

#[path = "review_support.rs"]
mod review_support;

use review_support::temp_root;

#[test]
fn identifier_does_not_claim_a_longer_identifier() {
    let root = temp_root("folders");
    fs::create_dir_all(root.join("1234_bob")).expect("create folder");
    fs::create_dir_all(root.join("123_alice")).expect("create folder");

    let found = find_submission_folder("123", &root).expect("folder for 123");
    assert_eq!(found.file_name().unwrap(), "123_alice");

    let found = find_submission_folder("1234", &root).expect("folder for 1234");
    assert_eq!(found.file_name().unwrap(), "1234_bob");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn folder_named_exactly_after_the_identifier_matches() {
    let root = temp_root("folders");
    fs::create_dir_all(root.join("B001")).expect("create folder");

    let found = find_submission_folder("B001", &root).expect("folder");
    assert_eq!(found, root.join("B001"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn absence_is_not_an_error() {
    let root = temp_root("folders");
    fs::create_dir_all(root.join("B001_yamada")).expect("create folder");

    assert_eq!(find_submission_folder("B999", &root), None);
    assert_eq!(find_submission_folder("", &root), None);
    assert_eq!(find_submission_folder("B001", &root.join("missing")), None);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn plain_files_are_never_submission_folders() {
    let root = temp_root("folders");
    fs::write(root.join("123_notes.txt"), "not a folder").expect("write file");

    assert_eq!(find_submission_folder("123", &root), None);

    fs::create_dir_all(root.join("123_alice")).expect("create folder");
    assert_eq!(find_submission_folder("123", &root), Some(root.join("123_alice")));

    let _ = fs::remove_dir_all(root);
}

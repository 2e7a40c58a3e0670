//! Integration tests for normalization-insensitive file resolution

use polar_ec::data::matcher::{nfc, nfd};
use polar_ec::data::{find_file, MatchError, NameMatcher};
use std::fs;
use tempfile::TempDir;

const NAME: &str = "하늘고_환경데이터.csv";

#[test]
fn resolves_composed_file_from_either_form() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let on_disk = dir.path().join(nfc(NAME));
    fs::write(&on_disk, "time\n").unwrap();

    let matcher = NameMatcher::index(dir.path()).unwrap();
    assert_eq!(matcher.resolve(&nfc(NAME)).unwrap(), on_disk.as_path());
    assert_eq!(matcher.resolve(&nfd(NAME)).unwrap(), on_disk.as_path());
}

#[test]
fn resolves_decomposed_file_from_either_form() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let on_disk = dir.path().join(nfd(NAME));
    fs::write(&on_disk, "time\n").unwrap();

    assert_eq!(find_file(dir.path(), &nfc(NAME)).unwrap(), on_disk);
    assert_eq!(find_file(dir.path(), &nfd(NAME)).unwrap(), on_disk);
}

#[test]
fn unrelated_names_are_not_found() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("송도고_환경데이터.csv"), "time\n").unwrap();

    let err = find_file(dir.path(), NAME).unwrap_err();
    match err {
        MatchError::NotFound { name, dir: searched } => {
            assert_eq!(name, NAME);
            assert_eq!(searched, dir.path());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn directories_never_match() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir(dir.path().join(NAME)).unwrap();

    assert!(matches!(
        find_file(dir.path(), NAME),
        Err(MatchError::NotFound { .. })
    ));
}

#[test]
fn first_entry_in_name_order_wins_between_equivalent_names() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let composed = dir.path().join(nfc(NAME));
    let decomposed = dir.path().join(nfd(NAME));
    fs::write(&composed, "a\n").unwrap();
    fs::write(&decomposed, "b\n").unwrap();

    // Both entries exist as distinct files; the one whose raw name sorts first wins.
    let expected = if nfc(NAME).as_bytes() < nfd(NAME).as_bytes() {
        composed
    } else {
        decomposed
    };
    let matcher = NameMatcher::index(dir.path()).unwrap();
    assert_eq!(matcher.resolve(NAME).unwrap(), expected.as_path());
    assert_eq!(matcher.resolve(&nfd(NAME)).unwrap(), expected.as_path());
}

#[test]
fn missing_directory_is_reported() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let missing = dir.path().join("nope");

    assert!(matches!(
        NameMatcher::index(&missing),
        Err(MatchError::Directory { .. })
    ));
}

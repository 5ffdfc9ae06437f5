//! Publish protocol atomicity.
//!
//! GREEN when:
//! - A staged file that does not decode back to the collection fails at
//!   verify, leaves the live file byte-identical, writes no backup and keeps
//!   the staged file for inspection.
//! - A successful publish overwrites the previous backup with the previous
//!   live content.
//! - A live path in a missing directory fails at the stage step and creates
//!   nothing.
//! - The missing-file policy decides whether an absent live file is empty.
//!
//! Backup / commit fault injection lives in gq-testkit
//! (`scenario_publish_faults.rs`).

use std::fs;
use std::path::Path;

use gq_file::{DecodeError, MissingFile, PublishError, PublishStage, Publisher, STAGING_SUFFIX};
use gq_group::GroupCollection;

fn groups(entries: &[(&str, u64)]) -> GroupCollection {
    let mut c = GroupCollection::new();
    for (name, quota) in entries {
        c.add(*name, *quota, 10.0, false).unwrap();
    }
    c
}

fn staged_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(STAGING_SUFFIX))
        .collect()
}

#[test]
fn verify_failure_leaves_live_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("groups");
    let backup = dir.path().join("groups.previous");
    let publisher = Publisher::new(&live, &backup);

    publisher.publish(&groups(&[("group_a", 1)])).unwrap();
    let before = fs::read(&live).unwrap();

    // Encodes fine, but the re-read file has no parent for the group.
    let orphan = groups(&[("group_x.sub", 4)]);
    let err = publisher.publish(&orphan).unwrap_err();

    assert_eq!(err.stage(), PublishStage::Verify);
    assert!(!err.requires_operator_attention());
    let PublishError::Verify { source, .. } = &err else {
        panic!("expected verify failure, got {err:?}");
    };
    assert!(matches!(source.root(), DecodeError::Tree(_)));

    assert_eq!(fs::read(&live).unwrap(), before);
    assert!(!backup.exists());
    assert_eq!(staged_files(dir.path()).len(), 1);
}

#[test]
fn verify_error_names_the_staged_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = Publisher::new(dir.path().join("groups"), dir.path().join("groups.previous"));

    let err = publisher
        .publish(&groups(&[("group_x.sub", 4)]))
        .unwrap_err()
        .to_string();
    let staged = staged_files(dir.path());
    assert_eq!(staged.len(), 1);
    assert_eq!(err.matches(staged[0].as_str()).count(), 1, "{err}");
    assert!(err.contains("missing parent group(s) for: group_x.sub"));
}

#[test]
fn backup_holds_previous_live_content() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("groups");
    let backup = dir.path().join("groups.previous");
    let publisher = Publisher::new(&live, &backup);

    publisher.publish(&groups(&[("group_a", 1)])).unwrap();
    let first = fs::read(&live).unwrap();

    let receipt = publisher.publish(&groups(&[("group_a", 2)])).unwrap();
    assert_eq!(receipt.backup_path.as_deref(), Some(backup.as_path()));
    assert_eq!(fs::read(&backup).unwrap(), first);
    let second = fs::read(&live).unwrap();

    publisher.publish(&groups(&[("group_a", 3)])).unwrap();
    assert_eq!(fs::read(&backup).unwrap(), second);

    let live_now = publisher.load_published(MissingFile::Fail).unwrap();
    assert_eq!(live_now.get("group_a").unwrap().quota(), 3);
}

#[test]
fn missing_directory_fails_at_stage() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("absent").join("groups");
    let backup = dir.path().join("absent").join("groups.previous");

    let err = Publisher::new(&live, &backup)
        .publish(&groups(&[("group_a", 1)]))
        .unwrap_err();
    assert_eq!(err.stage(), PublishStage::Stage);
    assert!(!err.requires_operator_attention());
    assert!(!live.exists());
}

#[test]
fn missing_live_file_policy() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = Publisher::new(dir.path().join("groups"), dir.path().join("groups.previous"));

    assert!(publisher
        .load_published(MissingFile::Empty)
        .unwrap()
        .is_empty());
    assert!(matches!(
        publisher.load_published(MissingFile::Fail),
        Err(DecodeError::Read { .. })
    ));
}

#[test]
fn corrupt_live_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("groups");
    fs::write(
        &live,
        "GROUP_NAMES = group_a\nGROUP_QUOTA_group_a = 1\nGROUP_PRIO_FACTOR_group_a = 1.0\nGROUP_ACCEPT_SURPLUS_group_a = perhaps\n",
    )
    .unwrap();

    let err = Publisher::new(&live, dir.path().join("groups.previous"))
        .load_published(MissingFile::Empty)
        .unwrap_err();
    assert!(err.to_string().contains("groups"));
    assert!(matches!(err.root(), DecodeError::InvalidValue { line: 4, .. }));
}

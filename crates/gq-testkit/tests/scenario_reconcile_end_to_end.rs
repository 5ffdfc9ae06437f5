//! End-to-end reconciliation against an in-memory source and a scratch
//! directory.
//!
//! Invariants:
//! - Intermediate quotas are renormalized and written back to the source
//! - The diff report runs published -> authoritative (Added / Deleted / changed)
//! - An inconsistent source tree aborts before any write
//! - A child quota sum beyond u64 aborts before any write
//! - A failed commit leaves the live file byte-identical and is fatal
//! - A second run against an unchanged source is a no-op
//! - Reconfigure failure exits 1; notification failure does not

use anyhow::Result;
use gq_file::{decode_file, MissingFile, PublishStage, Publisher};
use gq_group::{GroupName, GroupRecord, RenormalizationChange, RenormalizeError};
use gq_reconcile::{Notification, ReconcileError, ReconcileOutcome, Reconciler, StepStatus};
use gq_testkit::{
    collection, record, write_published, FaultyPublishIo, MemorySource, RecordingNotifier,
    RecordingReconfigurer, SourceUpdate, Workspace,
};

fn notification(notifier: &RecordingNotifier) -> Notification {
    Notification {
        notifier: Box::new(notifier.clone()),
        recipient: "ops@example.org".to_string(),
        subject: "Group quotas changed".to_string(),
        host_label: "batch01".to_string(),
    }
}

#[tokio::test]
async fn parent_quota_is_renormalized_and_written_back() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([record("group_a", 100), record("group_a.sub", 40)]);

    let outcome = Reconciler::new(Box::new(source.clone()), ws.publisher())
        .reconcile()
        .await?;

    assert_eq!(
        outcome.renormalized(),
        &[RenormalizationChange::Quota {
            name: GroupName::parse("group_a")?,
            old: 100,
            new: 40,
        }]
    );
    assert_eq!(
        outcome.renormalized()[0].to_string(),
        "Group 'group_a' - quota changed from 100 to 40"
    );
    assert_eq!(
        source.updates(),
        vec![SourceUpdate::Quota {
            name: "group_a".to_string(),
            value: 40,
        }]
    );
    assert_eq!(source.record("group_a").map(|r| r.quota), Some(40));

    let live = decode_file(&ws.live())?;
    assert_eq!(live.get("group_a").map(|g| g.quota()), Some(40));
    assert_eq!(outcome.exit_code(), 0);

    // First publish: nothing to back up.
    let summary = outcome.summary().expect("published");
    assert!(summary.receipt.backup_path.is_none());
    Ok(())
}

#[tokio::test]
async fn diff_reports_added_and_deleted_without_field_changes() -> Result<()> {
    let ws = Workspace::new()?;
    write_published(&ws.live(), &collection(&[("group_a", 10), ("group_b", 5)])?)?;
    let before = ws.live_bytes();

    let source = MemorySource::new([record("group_a", 10), record("group_c", 7)]);
    let outcome = Reconciler::new(Box::new(source), ws.publisher())
        .reconcile()
        .await?;

    let summary = outcome.summary().expect("published");
    assert_eq!(
        summary.diff.lines(),
        vec![
            "Added 'group_c' - quota=7 - prio=10.0 - surplus=FALSE".to_string(),
            "Deleted 'group_b' - quota=5 - prio=10.0 - surplus=FALSE".to_string(),
        ]
    );
    assert!(summary.diff.changed.is_empty());
    assert_eq!(std::fs::read(ws.backup()).ok(), before);
    Ok(())
}

#[tokio::test]
async fn orphan_in_source_is_fatal_before_any_write() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([record("group_a.sub", 40)]);

    let err = Reconciler::new(Box::new(source.clone()), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    match &err {
        ReconcileError::SourceTree(t) => {
            let missing: Vec<&str> = t.missing.iter().map(GroupName::as_str).collect();
            assert_eq!(missing, vec!["group_a.sub"]);
        }
        other => panic!("expected SourceTree, got {other:?}"),
    }
    assert!(!ws.live().exists());
    assert!(source.updates().is_empty());
    Ok(())
}

#[tokio::test]
async fn overflowing_child_sum_is_fatal_before_any_write() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([
        record("group_a", 1),
        record("group_a.x", i64::MAX),
        record("group_a.y", i64::MAX),
        record("group_a.z", i64::MAX),
    ]);

    let err = Reconciler::new(Box::new(source.clone()), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    match &err {
        ReconcileError::Renormalize(RenormalizeError::QuotaOverflow { name }) => {
            assert_eq!(name.as_str(), "group_a")
        }
        other => panic!("expected QuotaOverflow, got {other:?}"),
    }
    assert!(!ws.live().exists());
    assert!(source.updates().is_empty());
    assert_eq!(source.record("group_a").map(|r| r.quota), Some(1));
    Ok(())
}

#[tokio::test]
async fn failed_commit_keeps_previous_live_file() -> Result<()> {
    let ws = Workspace::new()?;
    write_published(&ws.live(), &collection(&[("group_a", 1)])?)?;
    let before = ws.live_bytes();

    let publisher = Publisher::with_io(ws.live(), ws.backup(), FaultyPublishIo::failing_commit());
    let reconfig = RecordingReconfigurer::default();
    let source = MemorySource::new([record("group_a", 2)]);

    let err = Reconciler::new(Box::new(source), publisher)
        .reconfigure_with(Box::new(reconfig.clone()))
        .reconcile()
        .await
        .unwrap_err();

    match &err {
        ReconcileError::Publish(e) => assert_eq!(e.stage(), PublishStage::Commit),
        other => panic!("expected Publish, got {other:?}"),
    }
    assert!(err.requires_operator_attention());
    assert_eq!(ws.live_bytes(), before);
    assert_eq!(reconfig.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn unchanged_source_is_a_no_op() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([
        record("group_a", 40),
        record("group_a.sub", 40),
        GroupRecord::new("group_b", 3, 2.5, true).with_surplus_threshold(2),
    ]);

    Reconciler::new(Box::new(source.clone()), ws.publisher())
        .reconcile()
        .await?;
    let published = ws.live_bytes();

    let reconfig = RecordingReconfigurer::default();
    let notifier = RecordingNotifier::default();
    let outcome = Reconciler::new(Box::new(source), ws.publisher())
        .reconfigure_with(Box::new(reconfig.clone()))
        .notify(notification(&notifier))
        .reconcile()
        .await?;

    assert!(matches!(outcome, ReconcileOutcome::Unchanged { .. }));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(ws.live_bytes(), published);
    assert!(!ws.backup().exists());
    assert_eq!(reconfig.calls(), 0);
    assert!(notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn reconfigure_failure_exits_one_but_keeps_publish() -> Result<()> {
    let ws = Workspace::new()?;
    let reconfig = RecordingReconfigurer::failing("condor_reconfig returned nonzero");
    let notifier = RecordingNotifier::default();
    let source = MemorySource::new([record("group_a", 5)]);

    let outcome = Reconciler::new(Box::new(source), ws.publisher())
        .reconfigure_with(Box::new(reconfig.clone()))
        .notify(notification(&notifier))
        .reconcile()
        .await?;

    assert_eq!(reconfig.calls(), 1);
    assert_eq!(outcome.exit_code(), 1);
    assert!(outcome.is_degraded());
    assert!(decode_file(&ws.live())?.contains("group_a"));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("reconfigure failed"));
    Ok(())
}

#[tokio::test]
async fn notification_failure_does_not_change_exit_code() -> Result<()> {
    let ws = Workspace::new()?;
    let reconfig = RecordingReconfigurer::default();
    let notifier = RecordingNotifier::failing("relay refused");
    let source = MemorySource::new([record("group_a", 5)]);

    let outcome = Reconciler::new(Box::new(source), ws.publisher())
        .reconfigure_with(Box::new(reconfig.clone()))
        .notify(notification(&notifier))
        .reconcile()
        .await?;

    let summary = outcome.summary().expect("published");
    assert_eq!(summary.reconfigure, StepStatus::Succeeded);
    assert!(summary.notification.is_failed());
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.is_degraded());

    let sent = notifier.sent();
    assert_eq!(sent[0].to, "ops@example.org");
    assert!(sent[0].body.contains("Info: batch01 has detected a change"));
    assert!(sent[0]
        .body
        .contains("Added 'group_a' - quota=5 - prio=10.0 - surplus=FALSE"));
    Ok(())
}

#[tokio::test]
async fn threshold_cleared_when_leaf_gains_children() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([
        GroupRecord::new("group_a", 10, 10.0, true).with_surplus_threshold(4),
        record("group_a.new", 6),
    ]);

    Reconciler::new(Box::new(source.clone()), ws.publisher())
        .reconcile()
        .await?;

    assert_eq!(
        source.updates(),
        vec![
            SourceUpdate::Quota {
                name: "group_a".to_string(),
                value: 6,
            },
            SourceUpdate::SurplusThreshold {
                name: "group_a".to_string(),
                value: 0,
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn failed_source_update_aborts_before_publish() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([record("group_a", 100), record("group_a.sub", 40)]);
    source.fail_updates_for("group_a");

    let err = Reconciler::new(Box::new(source), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::SourceUpdate { .. }));
    assert!(!ws.live().exists());
    Ok(())
}

#[tokio::test]
async fn invalid_records_are_reported_together() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([
        record("group_a", -1),
        GroupRecord::new("Group_B", 1, 0.0, false),
    ]);

    let err = Reconciler::new(Box::new(source), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    let ReconcileError::SourceInvalid(report) = err else {
        panic!("expected SourceInvalid");
    };
    assert_eq!(report.len(), 3);
    assert!(!ws.live().exists());
    Ok(())
}

#[tokio::test]
async fn corrupt_published_file_is_fatal() -> Result<()> {
    let ws = Workspace::new()?;
    std::fs::write(
        ws.live(),
        "GROUP_NAMES = group_a\nGROUP_QUOTA_group_a = 1\nGROUP_PRIO_FACTOR_group_a = 1.0\nGROUP_ACCEPT_SURPLUS_group_a = yes\n",
    )?;
    let before = ws.live_bytes();
    let source = MemorySource::new([record("group_a", 1)]);

    let err = Reconciler::new(Box::new(source), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Published(_)));
    assert_eq!(ws.live_bytes(), before);
    Ok(())
}

#[tokio::test]
async fn missing_live_file_can_be_fatal() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::new([record("group_a", 1)]);

    let err = Reconciler::new(Box::new(source), ws.publisher())
        .missing_live_file(MissingFile::Fail)
        .reconcile()
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Published(_)));
    Ok(())
}

#[tokio::test]
async fn source_load_failure_is_fatal() -> Result<()> {
    let ws = Workspace::new()?;
    let source = MemorySource::default();
    source.fail_listing("connection refused");

    let err = Reconciler::new(Box::new(source), ws.publisher())
        .reconcile()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("connection refused"));
    assert!(err.to_string().contains("memory"));
    Ok(())
}

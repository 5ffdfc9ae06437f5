use std::fmt;

use gq_file::PublishReceipt;
use gq_group::{GroupDiff, RenormalizationChange};

/// Result of an optional post-publish step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Skipped,
    Succeeded,
    Failed(String),
}

impl StepStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepStatus::Failed(_))
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Skipped => f.write_str("skipped"),
            StepStatus::Succeeded => f.write_str("succeeded"),
            StepStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublishSummary {
    /// `published.diff(&authoritative)`
    pub diff: GroupDiff,
    /// Derived-value updates written back to the source during this run.
    pub renormalized: Vec<RenormalizationChange>,
    pub receipt: PublishReceipt,
    pub reconfigure: StepStatus,
    pub notification: StepStatus,
}

#[derive(Clone, Debug)]
pub enum ReconcileOutcome {
    /// Source and published file already agree; nothing was written to disk.
    Unchanged {
        renormalized: Vec<RenormalizationChange>,
    },
    Published(PublishSummary),
}

impl ReconcileOutcome {
    /// Process exit code: 1 only when the published change could not be
    /// applied to the scheduler. Fatal errors never reach an outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconcileOutcome::Unchanged { .. } => 0,
            ReconcileOutcome::Published(s) if s.reconfigure.is_failed() => 1,
            ReconcileOutcome::Published(_) => 0,
        }
    }

    /// Published, but a downstream step failed.
    pub fn is_degraded(&self) -> bool {
        match self {
            ReconcileOutcome::Unchanged { .. } => false,
            ReconcileOutcome::Published(s) => {
                s.reconfigure.is_failed() || s.notification.is_failed()
            }
        }
    }

    pub fn summary(&self) -> Option<&PublishSummary> {
        match self {
            ReconcileOutcome::Unchanged { .. } => None,
            ReconcileOutcome::Published(s) => Some(s),
        }
    }

    pub fn renormalized(&self) -> &[RenormalizationChange] {
        match self {
            ReconcileOutcome::Unchanged { renormalized } => renormalized,
            ReconcileOutcome::Published(s) => &s.renormalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn published(reconfigure: StepStatus, notification: StepStatus) -> ReconcileOutcome {
        ReconcileOutcome::Published(PublishSummary {
            diff: GroupDiff::default(),
            renormalized: Vec::new(),
            receipt: PublishReceipt {
                live_path: PathBuf::from("/tmp/groups"),
                backup_path: None,
                bytes_written: 0,
            },
            reconfigure,
            notification,
        })
    }

    #[test]
    fn exit_codes() {
        let unchanged = ReconcileOutcome::Unchanged {
            renormalized: Vec::new(),
        };
        assert_eq!(unchanged.exit_code(), 0);
        assert!(!unchanged.is_degraded());

        let ok = published(StepStatus::Succeeded, StepStatus::Skipped);
        assert_eq!(ok.exit_code(), 0);
        assert!(!ok.is_degraded());

        let reconfig_failed = published(StepStatus::Failed("x".into()), StepStatus::Succeeded);
        assert_eq!(reconfig_failed.exit_code(), 1);
        assert!(reconfig_failed.is_degraded());

        let mail_failed = published(StepStatus::Skipped, StepStatus::Failed("y".into()));
        assert_eq!(mail_failed.exit_code(), 0);
        assert!(mail_failed.is_degraded());
    }
}

use gq_file::{DecodeError, PublishError};
use gq_group::{RenormalizationChange, RenormalizeError, TreeError, ValidationReport};

/// Fatal failure of a reconciliation run. Every variant exits the process with 1.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to load groups from {source_name}: {cause:#}")]
    SourceLoad {
        source_name: &'static str,
        cause: anyhow::Error,
    },

    #[error("source holds invalid records: {0}")]
    SourceInvalid(ValidationReport),

    #[error("source tree is inconsistent: {0}")]
    SourceTree(TreeError),

    #[error("cannot renormalize source quotas: {0}")]
    Renormalize(RenormalizeError),

    #[error("cannot load published file: {0}")]
    Published(DecodeError),

    #[error("failed to write renormalized value back to the source ({change}): {cause:#}")]
    SourceUpdate {
        change: RenormalizationChange,
        cause: anyhow::Error,
    },

    #[error("publish failed at {0}")]
    Publish(PublishError),
}

impl ReconcileError {
    /// The on-disk state may need manual recovery.
    pub fn requires_operator_attention(&self) -> bool {
        matches!(self, ReconcileError::Publish(e) if e.requires_operator_attention())
    }
}

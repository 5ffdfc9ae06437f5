use std::fmt;
use std::io;
use std::path::PathBuf;

use gq_group::{GroupError, TreeError};

/// Failure to turn file text back into a group collection.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: invalid {field} value '{value}'")]
    InvalidValue {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("failed to compile line pattern {pattern}: {source}")]
    Pattern {
        pattern: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    InvalidGroup(#[from] GroupError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Innermost error, with any file wrapper removed.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::InFile { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Step of the publish protocol that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishStage {
    Stage,
    Verify,
    Backup,
    Commit,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PublishStage::Stage => "stage",
            PublishStage::Verify => "verify",
            PublishStage::Backup => "backup",
            PublishStage::Commit => "commit",
        })
    }
}

/// Fatal failure of the publish protocol.
///
/// Stage and verify failures leave the live file untouched. Backup and commit
/// failures may need manual recovery.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("stage: cannot write temporary file in {}: {source}", .dir.display())]
    Stage {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("verify: cannot re-read temporary file {}: {}", .temp_path.display(), .source.root())]
    Verify {
        temp_path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error(
        "verify: temporary file {} does not match the source collection ({} difference(s)); live file left untouched",
        .temp_path.display(),
        .differences.len()
    )]
    RoundTripMismatch {
        temp_path: PathBuf,
        differences: Vec<String>,
    },

    #[error("backup: cannot copy {} to {}: {source}", .live.display(), .backup.display())]
    Backup {
        live: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("commit: cannot rename {} onto {}: {source}", .temp_path.display(), .live.display())]
    Commit {
        temp_path: PathBuf,
        live: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PublishError {
    pub fn stage(&self) -> PublishStage {
        match self {
            PublishError::Stage { .. } => PublishStage::Stage,
            PublishError::Verify { .. } | PublishError::RoundTripMismatch { .. } => {
                PublishStage::Verify
            }
            PublishError::Backup { .. } => PublishStage::Backup,
            PublishError::Commit { .. } => PublishStage::Commit,
        }
    }

    /// Backup/commit failures: the on-disk state may need an operator.
    pub fn requires_operator_attention(&self) -> bool {
        matches!(self.stage(), PublishStage::Backup | PublishStage::Commit)
    }
}

//! Atomic publish protocol.
//!
//! Invariants:
//! - The temporary file lives in the live file's directory (same filesystem),
//!   so the commit is a single rename.
//! - The live file is untouched until the staged file has been re-read and
//!   found equal to the collection being published.
//! - The backup holds the previous live content whenever a live file existed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gq_group::GroupCollection;
use tempfile::{Builder, TempPath};
use tracing::{debug, error, info, warn};

use crate::codec::{decode_file, decode_live, encode, MissingFile};
use crate::{DecodeError, PublishError};

/// Suffix of staged temporary files (`.<live-name>.<random>.grpq`).
pub const STAGING_SUFFIX: &str = ".grpq";

#[cfg(unix)]
const PUBLISHED_MODE: u32 = 0o644;

/// Filesystem operations of the backup and commit steps.
///
/// Production uses [`OsPublishIo`]; tests substitute failing implementations.
pub trait PublishIo {
    /// Copy the current live file to the backup path, replacing any previous backup.
    fn backup(&self, live: &Path, backup: &Path) -> io::Result<()>;
    /// Atomically replace `live` with `staged`.
    fn commit(&self, staged: &Path, live: &Path) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OsPublishIo;

impl PublishIo for OsPublishIo {
    fn backup(&self, live: &Path, backup: &Path) -> io::Result<()> {
        fs::copy(live, backup).map(|_| ())
    }

    fn commit(&self, staged: &Path, live: &Path) -> io::Result<()> {
        fs::rename(staged, live)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    pub live_path: PathBuf,
    /// `None` when no live file existed before this publish.
    pub backup_path: Option<PathBuf>,
    pub bytes_written: usize,
}

#[derive(Debug)]
pub struct Publisher<I = OsPublishIo> {
    live_path: PathBuf,
    backup_path: PathBuf,
    io: I,
}

impl Publisher<OsPublishIo> {
    pub fn new(live_path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self::with_io(live_path, backup_path, OsPublishIo)
    }
}

impl<I: PublishIo> Publisher<I> {
    pub fn with_io(
        live_path: impl Into<PathBuf>,
        backup_path: impl Into<PathBuf>,
        io: I,
    ) -> Self {
        Self {
            live_path: live_path.into(),
            backup_path: backup_path.into(),
            io,
        }
    }

    pub fn live_path(&self) -> &Path {
        &self.live_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Decode the currently published collection.
    pub fn load_published(&self, missing: MissingFile) -> Result<GroupCollection, DecodeError> {
        decode_live(&self.live_path, missing)
    }

    /// Stage, verify, back up and commit `groups` as the new live file.
    pub fn publish(&self, groups: &GroupCollection) -> Result<PublishReceipt, PublishError> {
        let text = encode(groups);
        let staged = self.stage(&text)?;
        if let Err(e) = self.verify(&staged, groups) {
            // Left on disk for inspection.
            let _ = staged.keep();
            return Err(e);
        }

        let backup_path = if self.live_path.exists() {
            self.io
                .backup(&self.live_path, &self.backup_path)
                .map_err(|source| {
                    error!(
                        operator_attention = true,
                        live = %self.live_path.display(),
                        backup = %self.backup_path.display(),
                        "backup of live file failed; live file left untouched"
                    );
                    PublishError::Backup {
                        live: self.live_path.clone(),
                        backup: self.backup_path.clone(),
                        source,
                    }
                })?;
            debug!(backup = %self.backup_path.display(), "previous live file backed up");
            Some(self.backup_path.clone())
        } else {
            info!(live = %self.live_path.display(), "no live file yet; skipping backup");
            None
        };

        if let Err(source) = self.io.commit(&staged, &self.live_path) {
            // Keep the verified file so an operator can move it into place by hand.
            let temp_path = staged.to_path_buf();
            let _ = staged.keep();
            error!(
                operator_attention = true,
                temp = %temp_path.display(),
                live = %self.live_path.display(),
                "commit of staged file failed"
            );
            return Err(PublishError::Commit {
                temp_path,
                live: self.live_path.clone(),
                source,
            });
        }
        // Renamed onto the live path; nothing left to clean up.
        let _ = staged.keep();

        info!(
            live = %self.live_path.display(),
            groups = groups.len(),
            bytes = text.len(),
            "published group definitions"
        );
        Ok(PublishReceipt {
            live_path: self.live_path.clone(),
            backup_path,
            bytes_written: text.len(),
        })
    }

    fn staging_dir(&self) -> PathBuf {
        match self.live_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn stage(&self, text: &str) -> Result<TempPath, PublishError> {
        let dir = self.staging_dir();
        let stage_err = |source: io::Error| PublishError::Stage {
            dir: dir.clone(),
            source,
        };

        let file_name = self
            .live_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "groups".to_string());
        let prefix = format!(".{file_name}.");

        let mut temp = Builder::new()
            .prefix(&prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&dir)
            .map_err(stage_err)?;

        temp.write_all(text.as_bytes()).map_err(stage_err)?;
        temp.as_file().sync_all().map_err(stage_err)?;
        set_published_permissions(temp.path(), &self.live_path).map_err(stage_err)?;

        debug!(temp = %temp.path().display(), bytes = text.len(), "staged group definitions");
        Ok(temp.into_temp_path())
    }

    fn verify(&self, staged: &TempPath, expected: &GroupCollection) -> Result<(), PublishError> {
        let reread = match decode_file(staged) {
            Ok(c) => c,
            Err(source) => {
                return Err(PublishError::Verify {
                    temp_path: staged.to_path_buf(),
                    source,
                })
            }
        };

        if reread.equals(expected) {
            return Ok(());
        }

        let differences = reread.diff(expected).lines();
        let temp_path = staged.to_path_buf();
        warn!(
            temp = %temp_path.display(),
            differences = differences.len(),
            "staged file does not round-trip; aborting publish"
        );
        Err(PublishError::RoundTripMismatch {
            temp_path,
            differences,
        })
    }
}

/// Mirror the live file's mode, or use a world-readable default.
fn set_published_permissions(temp: &Path, live: &Path) -> io::Result<()> {
    match fs::metadata(live) {
        Ok(meta) => fs::set_permissions(temp, meta.permissions()),
        Err(_) => default_permissions(temp),
    }
}

#[cfg(unix)]
fn default_permissions(temp: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(temp, fs::Permissions::from_mode(PUBLISHED_MODE))
}

#[cfg(not(unix))]
fn default_permissions(_temp: &Path) -> io::Result<()> {
    Ok(())
}

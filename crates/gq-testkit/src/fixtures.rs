use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gq_file::{encode, Publisher};
use gq_group::{GroupCollection, GroupRecord};
use tempfile::TempDir;

/// Collection of groups with default priority (10.0) and no surplus.
pub fn collection(entries: &[(&str, u64)]) -> Result<GroupCollection> {
    let mut c = GroupCollection::new();
    for (name, quota) in entries {
        c.add(*name, *quota, 10.0, false)
            .with_context(|| format!("fixture group {name}"))?;
    }
    Ok(c)
}

/// Source record with default priority (10.0) and no surplus.
pub fn record(name: &str, quota: i64) -> GroupRecord {
    GroupRecord::new(name, quota, 10.0, false)
}

/// Write `groups` to `path` directly, bypassing the publish protocol.
pub fn write_published(path: &Path, groups: &GroupCollection) -> io::Result<()> {
    fs::write(path, encode(groups))
}

/// Scratch directory holding a live file and its backup.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn live(&self) -> PathBuf {
        self.dir.path().join("atlas-group-definitions")
    }

    pub fn backup(&self) -> PathBuf {
        self.dir.path().join("atlas-group-definitions.previous")
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.live(), self.backup())
    }

    pub fn live_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.live()).ok()
    }
}

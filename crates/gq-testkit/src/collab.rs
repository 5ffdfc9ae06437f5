use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Result};
use gq_file::{OsPublishIo, PublishIo};
use gq_group::{GroupName, GroupRecord};
use gq_reconcile::{GroupSource, Notifier, Reconfigurer};

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceUpdate {
    Quota { name: String, value: u64 },
    SurplusThreshold { name: String, value: u64 },
}

#[derive(Default)]
struct SourceState {
    records: BTreeMap<String, GroupRecord>,
    updates: Vec<SourceUpdate>,
    fail_listing: Option<String>,
    fail_updates_for: Option<String>,
}

/// In-memory authoritative source. Clones share state, so a test can hand
/// one clone to the reconciler and inspect another.
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = GroupRecord>) -> Self {
        let source = Self::default();
        for r in records {
            source.upsert(r);
        }
        source
    }

    pub fn upsert(&self, record: GroupRecord) {
        locked(&self.state)
            .records
            .insert(record.name.clone(), record);
    }

    pub fn remove(&self, name: &str) {
        locked(&self.state).records.remove(name);
    }

    pub fn record(&self, name: &str) -> Option<GroupRecord> {
        locked(&self.state).records.get(name).cloned()
    }

    pub fn updates(&self) -> Vec<SourceUpdate> {
        locked(&self.state).updates.clone()
    }

    pub fn fail_listing(&self, message: impl Into<String>) {
        locked(&self.state).fail_listing = Some(message.into());
    }

    /// Every update of `name` fails (simulates a row lock or a vanished row).
    pub fn fail_updates_for(&self, name: impl Into<String>) {
        locked(&self.state).fail_updates_for = Some(name.into());
    }

    fn apply(&self, update: SourceUpdate) -> Result<()> {
        let mut st = locked(&self.state);
        let (name, value) = match &update {
            SourceUpdate::Quota { name, value } => (name.clone(), *value),
            SourceUpdate::SurplusThreshold { name, value } => (name.clone(), *value),
        };
        if st.fail_updates_for.as_deref() == Some(name.as_str()) {
            bail!("update for '{name}' rejected by memory source");
        }
        let value = i64::try_from(value)?;
        let record = st
            .records
            .get_mut(&name)
            .ok_or_else(|| anyhow!("update affected 0 row(s) for '{name}'"))?;
        match &update {
            SourceUpdate::Quota { .. } => record.quota = value,
            SourceUpdate::SurplusThreshold { .. } => record.surplus_threshold = value,
        }
        st.updates.push(update);
        Ok(())
    }
}

#[async_trait::async_trait]
impl GroupSource for MemorySource {
    fn source_name(&self) -> &'static str {
        "memory"
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        let st = locked(&self.state);
        if let Some(msg) = &st.fail_listing {
            bail!("{msg}");
        }
        Ok(st.records.values().cloned().collect())
    }

    async fn update_quota(&self, name: &GroupName, quota: u64) -> Result<()> {
        self.apply(SourceUpdate::Quota {
            name: name.to_string(),
            value: quota,
        })
    }

    async fn update_surplus_threshold(&self, name: &GroupName, threshold: u64) -> Result<()> {
        self.apply(SourceUpdate::SurplusThreshold {
            name: name.to_string(),
            value: threshold,
        })
    }
}

// ---------------------------------------------------------------------------
// Reconfigure / notify
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingReconfigurer {
    calls: Arc<Mutex<u32>>,
    failure: Option<String>,
}

impl RecordingReconfigurer {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Arc::default(),
            failure: Some(message.into()),
        }
    }

    pub fn calls(&self) -> u32 {
        *locked(&self.calls)
    }
}

#[async_trait::async_trait]
impl Reconfigurer for RecordingReconfigurer {
    async fn reconfigure(&self) -> Result<()> {
        *locked(&self.calls) += 1;
        match &self.failure {
            Some(msg) => bail!("{msg}"),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failure: Option<String>,
}

impl RecordingNotifier {
    /// Records the attempt, then fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(message.into()),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        locked(&self.sent).clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        locked(&self.sent).push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        match &self.failure {
            Some(msg) => bail!("{msg}"),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Publish IO
// ---------------------------------------------------------------------------

/// Real filesystem IO, except the chosen steps fail with `PermissionDenied`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaultyPublishIo {
    pub fail_backup: bool,
    pub fail_commit: bool,
}

impl FaultyPublishIo {
    pub fn failing_backup() -> Self {
        Self {
            fail_backup: true,
            fail_commit: false,
        }
    }

    pub fn failing_commit() -> Self {
        Self {
            fail_backup: false,
            fail_commit: true,
        }
    }
}

impl PublishIo for FaultyPublishIo {
    fn backup(&self, live: &Path, backup: &Path) -> io::Result<()> {
        if self.fail_backup {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "simulated backup failure",
            ));
        }
        OsPublishIo.backup(live, backup)
    }

    fn commit(&self, staged: &Path, live: &Path) -> io::Result<()> {
        if self.fail_commit {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "simulated commit failure",
            ));
        }
        OsPublishIo.commit(staged, live)
    }
}

use anyhow::Result;
use gq_group::{GroupName, GroupRecord};

/// Authoritative store of group records.
#[async_trait::async_trait]
pub trait GroupSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// All records, ordered by name.
    async fn list_groups(&self) -> Result<Vec<GroupRecord>>;

    async fn update_quota(&self, name: &GroupName, quota: u64) -> Result<()>;

    async fn update_surplus_threshold(&self, name: &GroupName, threshold: u64) -> Result<()>;
}

/// Tells the downstream scheduler to re-read its configuration.
#[async_trait::async_trait]
pub trait Reconfigurer: Send + Sync {
    async fn reconfigure(&self) -> Result<()>;
}

/// Delivers a plain-text change report.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

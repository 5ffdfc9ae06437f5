use gq_file::{MissingFile, OsPublishIo, PublishIo, Publisher};
use gq_group::{GroupCollection, GroupDiff, RenormalizationChange, RenormalizeError};
use tracing::{debug, error, info};

use crate::{
    compose_body, GroupSource, Notifier, PublishSummary, ReconcileError, ReconcileOutcome,
    Reconfigurer, StepStatus,
};

/// Where and how to send the change report.
pub struct Notification {
    pub notifier: Box<dyn Notifier>,
    pub recipient: String,
    pub subject: String,
    /// Host named in the report body.
    pub host_label: String,
}

/// One source ↔ file reconciliation.
///
/// Run order:
/// 1. load + validate the source collection, load the published file
/// 2. renormalize the source collection, writing updates back to the source
/// 3. equal → `Unchanged`
/// 4. publish, report `published.diff(&authoritative)`
/// 5. optional reconfigure, then optional notification
pub struct Reconciler<I: PublishIo = OsPublishIo> {
    source: Box<dyn GroupSource>,
    publisher: Publisher<I>,
    missing_live_file: MissingFile,
    reconfigurer: Option<Box<dyn Reconfigurer>>,
    notification: Option<Notification>,
}

impl<I: PublishIo> Reconciler<I> {
    pub fn new(source: Box<dyn GroupSource>, publisher: Publisher<I>) -> Self {
        Self {
            source,
            publisher,
            missing_live_file: MissingFile::default(),
            reconfigurer: None,
            notification: None,
        }
    }

    pub fn missing_live_file(mut self, policy: MissingFile) -> Self {
        self.missing_live_file = policy;
        self
    }

    pub fn reconfigure_with(mut self, reconfigurer: Box<dyn Reconfigurer>) -> Self {
        self.reconfigurer = Some(reconfigurer);
        self
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }

    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let mut authoritative = self.load_source().await?;

        let published = self
            .publisher
            .load_published(self.missing_live_file)
            .map_err(|e| {
                error!(path = %self.publisher.live_path().display(), error = %e, "published file unusable");
                ReconcileError::Published(e)
            })?;

        let renormalized = self.renormalize(&mut authoritative).await?;

        if authoritative.equals(&published) {
            debug!("No database change...");
            return Ok(ReconcileOutcome::Unchanged { renormalized });
        }

        let receipt = self.publisher.publish(&authoritative).map_err(|e| {
            if e.requires_operator_attention() {
                error!(operator_attention = true, stage = %e.stage(), error = %e, "publish failed");
            } else {
                error!(stage = %e.stage(), error = %e, "publish failed; live file untouched");
            }
            ReconcileError::Publish(e)
        })?;
        info!("Quota file updated with new values");

        let diff = published.diff(&authoritative);
        info!("Changes made are:");
        for line in diff.lines() {
            info!("{line}");
        }

        let reconfigure = self.run_reconfigure().await;
        let notification = self.send_notification(&diff, &reconfigure).await;

        Ok(ReconcileOutcome::Published(PublishSummary {
            diff,
            renormalized,
            receipt,
            reconfigure,
            notification,
        }))
    }

    async fn load_source(&self) -> Result<GroupCollection, ReconcileError> {
        let source_name = self.source.source_name();
        let records = self.source.list_groups().await.map_err(|cause| {
            error!(source = source_name, error = %format!("{cause:#}"), "failed to load groups");
            ReconcileError::SourceLoad { source_name, cause }
        })?;

        let groups = GroupCollection::from_records(records).map_err(|report| {
            for e in &report.errors {
                error!(source = source_name, "{e}");
            }
            ReconcileError::SourceInvalid(report)
        })?;

        groups.validate_tree().map_err(|e| {
            error!(source = source_name, "Missing dependencies for: {}", names_of(&e));
            ReconcileError::SourceTree(e)
        })?;

        debug!(source = source_name, groups = groups.len(), "loaded source groups");
        Ok(groups)
    }

    async fn renormalize(
        &self,
        groups: &mut GroupCollection,
    ) -> Result<Vec<RenormalizationChange>, ReconcileError> {
        let changes = groups.renormalize().map_err(|e| match e {
            RenormalizeError::Tree(t) => ReconcileError::SourceTree(t),
            other => {
                error!(error = %other, "renormalization refused");
                ReconcileError::Renormalize(other)
            }
        })?;

        for change in &changes {
            info!("{change}");
            let written = match change {
                RenormalizationChange::Quota { name, new, .. } => {
                    self.source.update_quota(name, *new).await
                }
                RenormalizationChange::SurplusThresholdCleared { name, .. } => {
                    self.source.update_surplus_threshold(name, 0).await
                }
            };
            if let Err(cause) = written {
                error!(change = %change, error = %format!("{cause:#}"), "source update failed");
                return Err(ReconcileError::SourceUpdate {
                    change: change.clone(),
                    cause,
                });
            }
        }
        Ok(changes)
    }

    async fn run_reconfigure(&self) -> StepStatus {
        let Some(reconfigurer) = &self.reconfigurer else {
            info!("No reconfig done...");
            return StepStatus::Skipped;
        };
        match reconfigurer.reconfigure().await {
            Ok(()) => {
                info!("Reconfig successful...");
                StepStatus::Succeeded
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!(error = %reason, "Problem with reconfigure");
                StepStatus::Failed(reason)
            }
        }
    }

    async fn send_notification(&self, diff: &GroupDiff, reconfigure: &StepStatus) -> StepStatus {
        let Some(n) = &self.notification else {
            info!("Not sending mail...");
            return StepStatus::Skipped;
        };
        info!(to = %n.recipient, "Sending mail...");
        let body = compose_body(&n.host_label, diff, reconfigure);
        match n.notifier.send(&n.recipient, &n.subject, &body).await {
            Ok(()) => StepStatus::Succeeded,
            Err(e) => {
                let reason = format!("{e:#}");
                error!(error = %reason, "Problem sending mail, no message sent");
                StepStatus::Failed(reason)
            }
        }
    }
}

fn names_of(e: &gq_group::TreeError) -> String {
    e.missing
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

//! gq-reconcile
//!
//! One reconciliation run between the authoritative group source and the
//! published scheduler file.
//!
//! Architectural decisions:
//! - Source, reconfigure and notification are collaborator traits; the run
//!   never reaches a database, process or mail transport directly
//! - Renormalization updates are written back to the source before publish
//! - Any failure up to and including commit aborts the run (`ReconcileError`)
//! - Reconfigure and notification run only after a committed publish; their
//!   failures are recorded in the outcome, never rolled back

mod collab;
mod command;
mod engine;
mod error;
mod mail;
mod outcome;

pub use collab::{GroupSource, Notifier, Reconfigurer};
pub use command::CommandReconfigurer;
pub use engine::{Notification, Reconciler};
pub use error::ReconcileError;
pub use mail::{compose_body, compose_message, SendmailNotifier};
pub use outcome::{PublishSummary, ReconcileOutcome, StepStatus};

//! gq-testkit
//!
//! Test-only collaborators and fixtures for reconciliation scenarios.
//!
//! Responsibilities:
//! - In-memory group source with recorded updates and injectable failures
//! - Recording reconfigure / notification collaborators
//! - Publish IO that fails at a chosen step
//! - proptest strategies for group collections
//!
//! MUST NOT be a dependency of any production crate.

mod collab;
mod fixtures;
mod strategies;

pub use collab::{
    FaultyPublishIo, MemorySource, RecordingNotifier, RecordingReconfigurer, SentMessage,
    SourceUpdate,
};
pub use fixtures::{collection, record, write_published, Workspace};
pub use strategies::{arb_group_collection, arb_group_name, arb_name_set};

//! gq-group
//!
//! Group-quota tree data model.
//!
//! Responsibilities:
//! - Validated group records (name pattern, quota, priority, surplus policy)
//! - Name-keyed, lexicographically ordered collections with tree-consistency checks
//! - Deterministic diff reports between two snapshots
//! - Renormalization of intermediate quotas (deepest first)
//!
//! Deterministic, pure logic. No IO. No database or file access.

mod collection;
mod diff;
mod error;
mod name;
mod priority;
mod renormalize;
mod types;

pub use collection::GroupCollection;
pub use diff::{FieldChange, GroupDiff};
pub use error::{FieldError, GroupError, RenormalizeError, TreeError, ValidationReport};
pub use name::{GroupName, NAME_PREFIX};
pub use priority::{ParsePriorityError, Priority, PRIORITY_SCALE};
pub use renormalize::RenormalizationChange;
pub use types::{Group, GroupField, GroupRecord};

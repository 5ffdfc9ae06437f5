use std::collections::BTreeSet;
use std::fmt;

use crate::GroupName;

/// Construction-time failure for a single group.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("invalid group name '{name}': expected group_<segment>(.<segment>)* with segments of [a-z0-9_]")]
    InvalidName { name: String },

    #[error("group '{name}': priority {value} must be a finite number greater than zero")]
    InvalidPriority { name: String, value: String },

    #[error("cannot have groups with duplicated name: {name}")]
    DuplicateName { name: String },
}

/// One offending field of one input record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub group: String,
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group '{}': {}='{}' (expected {})",
            self.group, self.field, self.value, self.expected
        )
    }
}

/// Accumulated per-record validation failures for a batch of input records.
///
/// Batch validation never stops at the first bad record; every offending
/// field of every record is listed here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Names of groups with at least one error (sorted, unique).
    pub fn groups(&self) -> BTreeSet<&str> {
        self.errors.iter().map(|e| e.group.as_str()).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid group field(s)", self.errors.len())?;
        for e in &self.errors {
            write!(f, "; {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// A collection references parents that are not present.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("missing parent group(s) for: {}", join_names(.missing))]
pub struct TreeError {
    /// Names whose parent is absent (sorted).
    pub missing: BTreeSet<GroupName>,
}

fn join_names(names: &BTreeSet<GroupName>) -> String {
    names
        .iter()
        .map(GroupName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renormalization could not produce exact child sums.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenormalizeError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("group '{name}': sum of child quotas exceeds {}", u64::MAX)]
    QuotaOverflow { name: GroupName },
}

use std::collections::BTreeSet;
use std::fmt;

use crate::{Group, GroupField, GroupName};

/// One published field that differs between two snapshots of the same group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub group: GroupName,
    pub field: GroupField,
    pub old: String,
    pub new: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Group '{}' - {} changed from {} to {}",
            self.group, self.field, self.old, self.new
        )
    }
}

/// Difference between an old and a new snapshot.
///
/// Each section is in ascending name order, so the rendered report is stable
/// for identical inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupDiff {
    pub added: Vec<Group>,
    pub removed: Vec<Group>,
    pub changed: Vec<FieldChange>,
}

impl GroupDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn added_names(&self) -> BTreeSet<GroupName> {
        self.added.iter().map(|g| g.name().clone()).collect()
    }

    pub fn removed_names(&self) -> BTreeSet<GroupName> {
        self.removed.iter().map(|g| g.name().clone()).collect()
    }

    /// One line per event: adds, then deletes, then field changes.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.added.len() + self.removed.len() + self.changed.len());
        out.extend(self.added.iter().map(|g| format!("Added {g}")));
        out.extend(self.removed.iter().map(|g| format!("Deleted {g}")));
        out.extend(self.changed.iter().map(FieldChange::to_string));
        out
    }
}

impl fmt::Display for GroupDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    FieldChange, FieldError, Group, GroupDiff, GroupError, GroupName, GroupRecord, TreeError,
    ValidationReport,
};

/// Ordered, name-keyed set of groups forming one snapshot of the quota tree.
///
/// Iteration is always ascending lexicographic by name. Tree consistency is
/// not enforced on insert (a snapshot is built up incrementally); call
/// [`GroupCollection::validate_tree`] once construction is complete.
#[derive(Clone, Debug, Default)]
pub struct GroupCollection {
    groups: BTreeMap<GroupName, Group>,
}

impl GroupCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a batch of raw records.
    ///
    /// Every record is checked; all field errors and duplicate names are
    /// returned together instead of stopping at the first.
    pub fn from_records<I>(records: I) -> Result<Self, ValidationReport>
    where
        I: IntoIterator<Item = GroupRecord>,
    {
        let mut out = Self::new();
        let mut report = ValidationReport::default();

        for record in records {
            match Group::from_record(&record) {
                Ok(group) => {
                    if let Err(GroupError::DuplicateName { name }) = out.insert(group) {
                        report.errors.push(FieldError {
                            group: name.clone(),
                            field: "group_name",
                            value: name,
                            expected: "a name not already present",
                        });
                    }
                }
                Err(errors) => report.errors.extend(errors),
            }
        }

        if report.is_empty() {
            Ok(out)
        } else {
            Err(report)
        }
    }

    /// Add a new group; fails if the name is already present.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        quota: u64,
        priority: f64,
        accept_surplus: bool,
    ) -> Result<&Group, GroupError> {
        let group = Group::try_new(name, quota, priority, accept_surplus)?;
        let key = group.name().clone();
        self.insert(group)?;
        Ok(&self.groups[&key])
    }

    pub fn insert(&mut self, group: Group) -> Result<(), GroupError> {
        match self.groups.entry(group.name().clone()) {
            Entry::Occupied(e) => Err(GroupError::DuplicateName {
                name: e.key().to_string(),
            }),
            Entry::Vacant(e) => {
                e.insert(group);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in ascending name order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Group> + ExactSizeIterator {
        self.groups.values()
    }

    /// Names in ascending order.
    pub fn names(&self) -> impl DoubleEndedIterator<Item = &GroupName> + ExactSizeIterator {
        self.groups.keys()
    }

    /// Names whose parent is missing. Empty means the tree is consistent.
    pub fn check_tree(&self) -> BTreeSet<GroupName> {
        self.groups
            .keys()
            .filter(|name| matches!(name.parent_str(), Some(p) if !self.groups.contains_key(p)))
            .cloned()
            .collect()
    }

    pub fn validate_tree(&self) -> Result<(), TreeError> {
        let missing = self.check_tree();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TreeError { missing })
        }
    }

    /// A group is a leaf when no other group sits below it.
    pub fn is_leaf(&self, name: &str) -> bool {
        !self.groups.keys().any(|k| k.is_descendant_of(name))
    }

    /// Direct children of `name` (one segment deeper), ascending.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups
            .values()
            .filter(move |g| g.name().parent_str() == Some(name))
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Group> {
        self.groups
            .values()
            .filter(move |g| self.is_leaf(g.name().as_str()))
    }

    /// Sum of leaf quotas; renormalization never changes it. `None` on overflow.
    pub fn total_leaf_quota(&self) -> Option<u64> {
        self.leaves().try_fold(0u64, |acc, g| acc.checked_add(g.quota()))
    }

    /// Same names, and every published field of every group matches exactly.
    pub fn equals(&self, other: &GroupCollection) -> bool {
        self.groups.len() == other.groups.len()
            && self.groups.iter().all(|(name, mine)| {
                other
                    .groups
                    .get(name)
                    .is_some_and(|theirs| mine.published_eq(theirs))
            })
    }

    /// Changes that turn `self` (old snapshot) into `new`.
    ///
    /// - added: in `new` but not in `self`
    /// - removed: in `self` but not in `new`
    /// - changed: published fields that differ, old value → new value
    pub fn diff(&self, new: &GroupCollection) -> GroupDiff {
        let mut diff = GroupDiff::default();

        for (name, group) in &new.groups {
            if !self.groups.contains_key(name) {
                diff.added.push(group.clone());
            }
        }

        for (name, old) in &self.groups {
            match new.groups.get(name) {
                None => diff.removed.push(old.clone()),
                Some(current) => {
                    for field in old.differing_fields(current) {
                        diff.changed.push(FieldChange {
                            group: name.clone(),
                            field,
                            old: old.field_value(field),
                            new: current.field_value(field),
                        });
                    }
                }
            }
        }

        diff
    }
}

impl<'a> IntoIterator for &'a GroupCollection {
    type Item = &'a Group;
    type IntoIter = std::collections::btree_map::Values<'a, GroupName, Group>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.values()
    }
}

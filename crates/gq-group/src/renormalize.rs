//! Intermediate-quota renormalization.
//!
//! # Invariants
//!
//! - Every intermediate group's quota equals the sum of its direct children.
//! - Visiting order is deepest first, so children are final before their
//!   parent is summed.
//! - Intermediate groups never carry a surplus threshold.
//! - Leaf quotas, names, priorities and surplus flags are never touched.

use std::fmt;

use crate::{GroupCollection, GroupName, RenormalizeError};

/// A derived-value update applied during renormalization.
///
/// The caller forwards each change to the authoritative source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenormalizationChange {
    Quota {
        name: GroupName,
        old: u64,
        new: u64,
    },
    /// A former leaf gained children; its threshold was forced to zero.
    SurplusThresholdCleared { name: GroupName, old: u64 },
}

impl RenormalizationChange {
    pub fn name(&self) -> &GroupName {
        match self {
            RenormalizationChange::Quota { name, .. } => name,
            RenormalizationChange::SurplusThresholdCleared { name, .. } => name,
        }
    }
}

impl fmt::Display for RenormalizationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenormalizationChange::Quota { name, old, new } => {
                write!(f, "Group '{name}' - quota changed from {old} to {new}")
            }
            RenormalizationChange::SurplusThresholdCleared { name, old } => {
                write!(
                    f,
                    "Group '{name}' - surplus_threshold changed from {old} to 0"
                )
            }
        }
    }
}

impl GroupCollection {
    /// Recompute intermediate quotas bottom-up.
    ///
    /// Requires a tree-consistent collection. Returns the applied changes in
    /// visiting order; an already-normalized collection yields none. A child
    /// sum that does not fit in `u64` is an error; nothing is clamped.
    pub fn renormalize(&mut self) -> Result<Vec<RenormalizationChange>, RenormalizeError> {
        self.validate_tree()?;

        let mut intermediates: Vec<GroupName> = self
            .names()
            .filter(|name| !self.is_leaf(name.as_str()))
            .cloned()
            .collect();
        intermediates.sort_by(|a, b| b.depth().cmp(&a.depth()).then_with(|| a.cmp(b)));

        let mut changes = Vec::new();
        for name in intermediates {
            let sum = self
                .children(name.as_str())
                .try_fold(0u64, |acc, g| acc.checked_add(g.quota()))
                .ok_or_else(|| RenormalizeError::QuotaOverflow { name: name.clone() })?;

            let Some(group) = self.get_mut(name.as_str()) else {
                continue;
            };

            if group.quota() != sum {
                changes.push(RenormalizationChange::Quota {
                    name: name.clone(),
                    old: group.quota(),
                    new: sum,
                });
                group.set_quota(sum);
            }

            if group.surplus_threshold() > 0 {
                changes.push(RenormalizationChange::SurplusThresholdCleared {
                    name: name.clone(),
                    old: group.surplus_threshold(),
                });
                group.set_surplus_threshold(0);
            }
        }

        Ok(changes)
    }
}

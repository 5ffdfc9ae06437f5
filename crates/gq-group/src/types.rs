use std::fmt;

use crate::{FieldError, GroupError, GroupName, Priority};

/// Raw group row as supplied by the authoritative source, before validation.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupRecord {
    pub name: String,
    pub quota: i64,
    pub priority: f64,
    pub accept_surplus: bool,
    pub surplus_threshold: i64,
}

impl GroupRecord {
    pub fn new(name: impl Into<String>, quota: i64, priority: f64, accept_surplus: bool) -> Self {
        Self {
            name: name.into(),
            quota,
            priority,
            accept_surplus,
            surplus_threshold: 0,
        }
    }

    pub fn with_surplus_threshold(mut self, surplus_threshold: i64) -> Self {
        self.surplus_threshold = surplus_threshold;
        self
    }
}

/// Fields that are published to the scheduler file and therefore compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupField {
    Quota,
    Priority,
    AcceptSurplus,
}

impl GroupField {
    pub const ALL: [GroupField; 3] = [
        GroupField::Quota,
        GroupField::Priority,
        GroupField::AcceptSurplus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupField::Quota => "quota",
            GroupField::Priority => "priority",
            GroupField::AcceptSurplus => "accept_surplus",
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated quota node.
///
/// `surplus_threshold` is source-side state only: it is never written to the
/// scheduler file and does not take part in published comparisons.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    name: GroupName,
    quota: u64,
    priority: Priority,
    accept_surplus: bool,
    surplus_threshold: u64,
}

impl Group {
    pub fn new(name: GroupName, quota: u64, priority: Priority, accept_surplus: bool) -> Self {
        Self {
            name,
            quota,
            priority,
            accept_surplus,
            surplus_threshold: 0,
        }
    }

    /// Build from loosely-typed parts (name string, float priority).
    pub fn try_new(
        name: impl Into<String>,
        quota: u64,
        priority: f64,
        accept_surplus: bool,
    ) -> Result<Self, GroupError> {
        let name = GroupName::parse(name)?;
        let priority = Priority::from_f64(priority).ok_or_else(|| GroupError::InvalidPriority {
            name: name.to_string(),
            value: priority.to_string(),
        })?;
        Ok(Self::new(name, quota, priority, accept_surplus))
    }

    /// Validate every field of a raw record, reporting all failures at once.
    pub fn from_record(record: &GroupRecord) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut field_error = |field: &'static str, value: String, expected: &'static str| {
            errors.push(FieldError {
                group: record.name.clone(),
                field,
                value,
                expected,
            })
        };

        let name = GroupName::parse(record.name.as_str()).ok();
        if name.is_none() {
            field_error(
                "group_name",
                record.name.clone(),
                "string matching group_[a-z0-9_](.[a-z0-9_])*",
            );
        }

        let quota = u64::try_from(record.quota).ok();
        if quota.is_none() {
            field_error("quota", record.quota.to_string(), "integer >= 0");
        }

        let priority = Priority::from_f64(record.priority);
        if priority.is_none() {
            field_error(
                "priority",
                record.priority.to_string(),
                "floating point value greater than zero",
            );
        }

        let threshold = u64::try_from(record.surplus_threshold).ok();
        if threshold.is_none() {
            field_error(
                "surplus_threshold",
                record.surplus_threshold.to_string(),
                "integer >= 0",
            );
        }

        match (name, quota, priority, threshold) {
            (Some(name), Some(quota), Some(priority), Some(threshold)) => {
                Ok(Self::new(name, quota, priority, record.accept_surplus)
                    .with_surplus_threshold(threshold))
            }
            _ => Err(errors),
        }
    }

    pub fn with_surplus_threshold(mut self, surplus_threshold: u64) -> Self {
        self.surplus_threshold = surplus_threshold;
        self
    }

    pub fn name(&self) -> &GroupName {
        &self.name
    }

    pub fn quota(&self) -> u64 {
        self.quota
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn accept_surplus(&self) -> bool {
        self.accept_surplus
    }

    pub fn surplus_threshold(&self) -> u64 {
        self.surplus_threshold
    }

    pub(crate) fn set_quota(&mut self, quota: u64) {
        self.quota = quota;
    }

    pub(crate) fn set_surplus_threshold(&mut self, surplus_threshold: u64) {
        self.surplus_threshold = surplus_threshold;
    }

    /// Rendered value of a published field, as it appears in the file.
    pub fn field_value(&self, field: GroupField) -> String {
        match field {
            GroupField::Quota => self.quota.to_string(),
            GroupField::Priority => self.priority.to_string(),
            GroupField::AcceptSurplus => bool_literal(self.accept_surplus).to_string(),
        }
    }

    /// Published fields whose values differ from `other` (fixed field order).
    pub fn differing_fields(&self, other: &Group) -> Vec<GroupField> {
        GroupField::ALL
            .into_iter()
            .filter(|f| match f {
                GroupField::Quota => self.quota != other.quota,
                GroupField::Priority => self.priority != other.priority,
                GroupField::AcceptSurplus => self.accept_surplus != other.accept_surplus,
            })
            .collect()
    }

    /// `true` when every published field matches `other` exactly.
    pub fn published_eq(&self, other: &Group) -> bool {
        self.name == other.name && self.differing_fields(other).is_empty()
    }
}

/// `TRUE` / `FALSE`, the boolean spelling used by the scheduler file.
pub(crate) fn bool_literal(v: bool) -> &'static str {
    if v {
        "TRUE"
    } else {
        "FALSE"
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' - quota={} - prio={} - surplus={}",
            self.name,
            self.quota,
            self.priority,
            bool_literal(self.accept_surplus)
        )
    }
}

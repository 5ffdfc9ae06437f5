use std::borrow::Borrow;
use std::fmt;

use crate::GroupError;

/// Every group name starts with this prefix (first segment only).
pub const NAME_PREFIX: &str = "group_";

/// Dot-delimited hierarchical group identifier, e.g. `group_physics.atlas.prod`.
///
/// Shape: `group_<segment>(.<segment>)*` where every segment is non-empty and
/// made of `[a-z0-9_]`. Ordering is plain lexicographic on the full string;
/// that ordering drives file layout and report stability.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupName(String);

impl GroupName {
    pub fn parse(raw: impl Into<String>) -> Result<Self, GroupError> {
        let raw = raw.into();
        if is_valid_name(&raw) {
            Ok(Self(raw))
        } else {
            Err(GroupError::InvalidName { name: raw })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent name (all but the last segment). `None` for root groups.
    pub fn parent_str(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(parent, _)| parent)
    }

    pub fn parent(&self) -> Option<GroupName> {
        // A valid name's prefix up to a segment boundary is itself valid.
        self.parent_str().map(|p| GroupName(p.to_string()))
    }

    /// Number of dot-delimited segments (roots have depth 1).
    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    /// `true` if `ancestor` is a strict dotted prefix of this name.
    pub fn is_descendant_of(&self, ancestor: &str) -> bool {
        self.0.len() > ancestor.len()
            && self.0.starts_with(ancestor)
            && self.0.as_bytes()[ancestor.len()] == b'.'
    }

    pub fn is_root(&self) -> bool {
        self.parent_str().is_none()
    }
}

fn is_valid_name(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix(NAME_PREFIX) else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    // Segment rules apply to the whole name; the first segment already
    // carries a non-empty tail after the prefix.
    raw.split('.').all(|seg| {
        !seg.is_empty()
            && seg
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    }) && !rest.starts_with('.')
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GroupName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for GroupName {
    type Error = GroupError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        GroupName::parse(value)
    }
}

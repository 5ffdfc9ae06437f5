//! Canonical text encoding of a group collection.
//!
//! Layout:
//!
//! ```text
//! # /-----------------------------------------------------\
//! # | This file is automatically generated -- DO NOT EDIT |
//! # | Last updated:     Mon Oct 19 12:00:00 2026          |
//! # \-----------------------------------------------------/
//!
//! GROUP_NAMES = group_a, group_a.x, group_b
//!
//! GROUP_QUOTA_group_b = 10
//! GROUP_PRIO_FACTOR_group_b = 10.0
//! GROUP_ACCEPT_SURPLUS_group_b = FALSE
//! ...
//! ```
//!
//! `GROUP_NAMES` is ascending; per-group blocks follow in descending order.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use gq_group::{Group, GroupCollection, GroupName, Priority};
use regex::Regex;
use tracing::{debug, warn};

use crate::DecodeError;

/// What to do when the live file does not exist yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingFile {
    /// Treat as an empty published collection (first publish bootstraps it).
    #[default]
    Empty,
    Fail,
}

/// `ctime(3)`-style timestamp, e.g. `Mon Oct  5 09:03:11 2026`.
pub fn ctime_stamp(at: NaiveDateTime) -> String {
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Encode with the current local time in the banner.
pub fn encode(groups: &GroupCollection) -> String {
    encode_at(groups, Local::now().naive_local())
}

pub fn encode_at(groups: &GroupCollection, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str("# /-----------------------------------------------------\\\n");
    out.push_str("# | This file is automatically generated -- DO NOT EDIT |\n");
    let _ = writeln!(
        out,
        "# | Last updated:     {}          |",
        ctime_stamp(generated_at)
    );
    out.push_str("# \\-----------------------------------------------------/\n");
    out.push('\n');

    let names: Vec<&str> = groups.names().map(GroupName::as_str).collect();
    let _ = writeln!(out, "GROUP_NAMES = {}", names.join(", "));

    for g in groups.iter().rev() {
        out.push('\n');
        let _ = writeln!(out, "GROUP_QUOTA_{} = {}", g.name(), g.quota());
        let _ = writeln!(out, "GROUP_PRIO_FACTOR_{} = {}", g.name(), g.priority());
        let _ = writeln!(
            out,
            "GROUP_ACCEPT_SURPLUS_{} = {}",
            g.name(),
            if g.accept_surplus() { "TRUE" } else { "FALSE" }
        );
    }
    out.push('\n');
    out
}

struct LinePatterns {
    names: Regex,
    quota: Regex,
    prio: Regex,
    surplus: Regex,
}

type PatternFailure = (&'static str, regex::Error);

impl LinePatterns {
    /// Compiled on first use and shared for the rest of the process.
    fn get() -> Result<&'static Self, DecodeError> {
        static PATTERNS: OnceLock<Result<LinePatterns, PatternFailure>> = OnceLock::new();
        match PATTERNS.get_or_init(Self::compile) {
            Ok(pats) => Ok(pats),
            Err((pattern, source)) => Err(DecodeError::Pattern {
                pattern: *pattern,
                source: source.clone(),
            }),
        }
    }

    fn compile() -> Result<Self, PatternFailure> {
        Ok(Self {
            names: compile(r"^GROUP_NAMES\s*=\s*(.*)$")?,
            quota: compile(r"^GROUP_QUOTA_([\w.]+)\s*=\s*(\S+)$")?,
            prio: compile(r"^GROUP_PRIO_FACTOR_([\w.]+)\s*=\s*(\S+)$")?,
            surplus: compile(r"^GROUP_ACCEPT_SURPLUS_([\w.]+)\s*=\s*(\w+)$")?,
        })
    }
}

fn compile(pattern: &'static str) -> Result<Regex, PatternFailure> {
    Regex::new(pattern).map_err(|source| (pattern, source))
}

#[derive(Default)]
struct PartialGroup {
    quota: Option<u64>,
    prio: Option<Priority>,
    surplus: Option<bool>,
}

/// Decode file text into a tree-consistent collection.
///
/// Blank and `#` comment lines are skipped; unrecognised lines are ignored.
/// Groups listed in `GROUP_NAMES` but missing any of their three fields are
/// skipped with a warning. Malformed values, invalid names, duplicate
/// listings and missing parents are errors.
pub fn decode_str(text: &str) -> Result<GroupCollection, DecodeError> {
    let pats = LinePatterns::get()?;
    let mut listed: Vec<String> = Vec::new();
    let mut fields: BTreeMap<String, PartialGroup> = BTreeMap::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(c) = pats.names.captures(line) {
            listed = c[1]
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
        } else if let Some(c) = pats.quota.captures(line) {
            let quota = c[2].parse::<u64>().map_err(|_| DecodeError::InvalidValue {
                line: line_no,
                field: "quota",
                value: c[2].to_string(),
            })?;
            fields.entry(c[1].to_string()).or_default().quota = Some(quota);
        } else if let Some(c) = pats.prio.captures(line) {
            let prio = c[2].parse::<Priority>().map_err(|_| DecodeError::InvalidValue {
                line: line_no,
                field: "priority",
                value: c[2].to_string(),
            })?;
            fields.entry(c[1].to_string()).or_default().prio = Some(prio);
        } else if let Some(c) = pats.surplus.captures(line) {
            let surplus = match c[2].to_ascii_uppercase().as_str() {
                "TRUE" => true,
                "FALSE" => false,
                _ => {
                    return Err(DecodeError::InvalidValue {
                        line: line_no,
                        field: "accept_surplus",
                        value: c[2].to_string(),
                    })
                }
            };
            fields.entry(c[1].to_string()).or_default().surplus = Some(surplus);
        } else {
            debug!(line = line_no, "ignoring unrecognised line");
        }
    }

    let mut groups = GroupCollection::new();
    for name in listed {
        let complete = fields
            .get(&name)
            .and_then(|p| Some((p.quota?, p.prio?, p.surplus?)));
        let Some((quota, prio, surplus)) = complete else {
            warn!(group = %name, "invalid incomplete group found; skipping");
            continue;
        };
        let name = GroupName::parse(name)?;
        groups.insert(Group::new(name, quota, prio, surplus))?;
    }

    groups.validate_tree()?;
    Ok(groups)
}

/// Read and decode a file; errors carry the path.
pub fn decode_file(path: &Path) -> Result<GroupCollection, DecodeError> {
    let text = fs::read_to_string(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_str(&text).map_err(|e| DecodeError::InFile {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Decode the live file, applying the missing-file policy.
pub(crate) fn decode_live(path: &Path, missing: MissingFile) -> Result<GroupCollection, DecodeError> {
    match fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound && missing == MissingFile::Empty => {
            warn!(path = %path.display(), "published file does not exist; treating as empty");
            Ok(GroupCollection::new())
        }
        _ => decode_file(path),
    }
}

use gq_group::{Group, GroupCollection, GroupName, Priority};
use proptest::prelude::*;

const ROOTS: &[&str] = &["group_atlas", "group_cms", "group_grid", "group_x1"];
const SEGMENTS: &[&str] = &["prod", "analysis", "short", "long", "a_1", "z"];

fn arb_path() -> impl Strategy<Value = Vec<&'static str>> {
    (
        prop::sample::select(ROOTS),
        prop::collection::vec(prop::sample::select(SEGMENTS), 0..4),
    )
        .prop_map(|(root, mut rest)| {
            rest.insert(0, root);
            rest
        })
}

/// A valid group name of depth 1..=4.
pub fn arb_group_name() -> impl Strategy<Value = GroupName> {
    arb_path().prop_filter_map("valid name", |segs| GroupName::parse(segs.join(".")).ok())
}

/// Arbitrary names, parents not guaranteed to be present.
pub fn arb_name_set() -> impl Strategy<Value = Vec<GroupName>> {
    prop::collection::vec(arb_group_name(), 0..16)
}

/// Tree-consistent collections: every listed path brings its ancestors.
pub fn arb_group_collection() -> impl Strategy<Value = GroupCollection> {
    prop::collection::vec((arb_path(), 0u64..5_000, 1u64..1_000, any::<bool>()), 0..12).prop_map(
        |entries| {
            let mut c = GroupCollection::new();
            for (segs, quota, tenths, accept) in entries {
                for depth in 1..=segs.len() {
                    let name = segs[..depth].join(".");
                    if c.contains(&name) {
                        continue;
                    }
                    let (Ok(name), Some(prio)) =
                        (GroupName::parse(name), Priority::from_tenths(tenths))
                    else {
                        continue;
                    };
                    // Ancestors get a distinct quota so renormalization has work to do.
                    let q = quota.saturating_add(depth as u64);
                    let _ = c.insert(Group::new(name, q, prio, accept));
                }
            }
            c
        },
    )
}

//! Keep/delete decisions inside a duplicate group.
//!
//! Every automatic strategy is a total order over the members: sort by the
//! strategy key, the first member is kept. The last key component is always
//! the path, so ties cannot survive and enumeration order never matters.

pub mod region;

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

pub use region::{detect_regions, region_rank, Region};

use crate::grouping::{DuplicateGroup, GroupMember};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// No automatic choice; the user picks a keeper.
    #[default]
    Manual,
    RegionPreference,
    Largest,
    Smallest,
    Oldest,
    Newest,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Manual,
        Strategy::RegionPreference,
        Strategy::Largest,
        Strategy::Smallest,
        Strategy::Oldest,
        Strategy::Newest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Manual => "manual",
            Strategy::RegionPreference => "region",
            Strategy::Largest => "largest",
            Strategy::Smallest => "smallest",
            Strategy::Oldest => "oldest",
            Strategy::Newest => "newest",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = match s.trim().to_lowercase().as_str() {
            "pattern" => "region".to_string(),
            other => other.to_string(),
        };
        Strategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name() == wanted)
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Most preferred first. Regions not listed rank after all listed ones.
    pub region_order: Vec<Region>,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            region_order: Region::default_order(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Kept(usize),
    RequiresInput,
}

/// Member indices from most to least preferred. `None` for `Manual`.
pub fn rank_members(
    members: &[GroupMember],
    strategy: Strategy,
    params: &SelectionParams,
) -> Option<Vec<usize>> {
    if strategy == Strategy::Manual {
        return None;
    }

    let key_order = |a: &GroupMember, b: &GroupMember| -> Ordering {
        match strategy {
            Strategy::Manual => Ordering::Equal,
            Strategy::RegionPreference => region_key(a, params).cmp(&region_key(b, params)),
            Strategy::Largest => b.record.size.cmp(&a.record.size),
            Strategy::Smallest => a.record.size.cmp(&b.record.size),
            Strategy::Oldest => a.record.modified.cmp(&b.record.modified),
            Strategy::Newest => b.record.modified.cmp(&a.record.modified),
        }
    };

    let mut order: Vec<usize> = (0..members.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&members[i], &members[j]);
        key_order(a, b).then_with(|| a.record.path.cmp(&b.record.path))
    });
    Some(order)
}

/// (region rank, longer file name first)
fn region_key(member: &GroupMember, params: &SelectionParams) -> (usize, Reverse<usize>) {
    let path = &member.record.path;
    let name_len = path
        .file_name()
        .map(|n| n.to_string_lossy().chars().count())
        .unwrap_or(0);
    (region_rank(path, &params.region_order), Reverse(name_len))
}

/// Flags exactly one keeper under `strategy`. `Manual` clears all flags and
/// leaves the group waiting for user input.
pub fn apply_policy(
    group: &mut DuplicateGroup,
    strategy: Strategy,
    params: &SelectionParams,
) -> PolicyOutcome {
    match rank_members(&group.members, strategy, params)
        .and_then(|order| order.first().copied())
    {
        Some(winner) => {
            group.set_keep(winner);
            PolicyOutcome::Kept(winner)
        }
        None => {
            group.clear_keep();
            PolicyOutcome::RequiresInput
        }
    }
}

//! Deployment regions

use super::common::string_column;
use serde::{Deserialize, Serialize};

/// Width of the region tag at the start of every region-prefixed token.
pub const REGION_TAG_WIDTH: usize = 2;

/// A deployment region. Each region owns exactly one regional store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Jp,
    Us,
    Eu,
}

impl Region {
    /// Every region the platform knows about.
    pub const ALL: [Region; 3] = [Region::Jp, Region::Us, Region::Eu];

    /// Fixed-width tag used in tokens and persisted rows.
    pub fn tag(&self) -> &'static str {
        match self {
            Region::Jp => "jp",
            Region::Us => "us",
            Region::Eu => "eu",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Region> {
        Region::ALL.into_iter().find(|r| r.tag() == tag)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::from_tag(&s.to_ascii_lowercase()).ok_or_else(|| format!("Unknown region: {}", s))
    }
}

string_column!(Region);

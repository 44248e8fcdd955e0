//! The leaderboard shown next to the lesson generator.
//!
//! There is no scoring backend; the list is fixed.

use serde::{Deserialize, Serialize};

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: u32,
    /// Display name.
    pub name: String,
    /// Score.
    pub points: u32,
}

impl RankingEntry {
    fn new(rank: u32, name: &str, points: u32) -> Self {
        Self {
            rank,
            name: name.to_string(),
            points,
        }
    }
}

/// The fixed leaderboard, best first.
#[must_use]
pub fn default_rankings() -> Vec<RankingEntry> {
    vec![
        RankingEntry::new(1, "User_Alpha", 1500),
        RankingEntry::new(2, "User_Beta", 1250),
        RankingEntry::new(3, "User_Gamma", 900),
    ]
}

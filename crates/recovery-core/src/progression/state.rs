use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::xp::xp_threshold_for_level;
use crate::milestones::MilestoneId;

/// Durable progression record.
///
/// Serialized as-is into the key-value store. Only [`ProgressionEngine`]
/// mutates it; everyone else gets a snapshot.
///
/// [`ProgressionEngine`]: super::ProgressionEngine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionState {
    /// Anchor for elapsed-day computation.
    pub start_date: DateTime<Utc>,
    /// Set once on first use and never touched again.
    pub first_use_date: DateTime<Utc>,
    pub xp: u32,
    pub level: u32,
    pub xp_to_next_level: u32,
    /// XP earned per UTC calendar day.
    #[serde(default)]
    pub daily_xp: BTreeMap<NaiveDate, u32>,
    /// Days on which a relapse was recorded.
    #[serde(default)]
    pub sobriety_breaks: BTreeSet<NaiveDate>,
    /// Milestones already paid out for the current anchor.
    #[serde(default)]
    pub awarded_milestones: BTreeSet<MilestoneId>,
    #[serde(default)]
    pub level_up_pending: bool,
}

impl ProgressionState {
    /// State for a brand-new user.
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut daily_xp = BTreeMap::new();
        daily_xp.insert(now.date_naive(), 0);
        Self {
            start_date: now,
            first_use_date: now,
            xp: 0,
            level: 1,
            xp_to_next_level: xp_threshold_for_level(1),
            daily_xp,
            sobriety_breaks: BTreeSet::new(),
            awarded_milestones: BTreeSet::new(),
            level_up_pending: false,
        }
    }

    /// XP earned on `day`.
    pub fn xp_on(&self, day: NaiveDate) -> u32 {
        self.daily_xp.get(&day).copied().unwrap_or(0)
    }

    /// Fraction of the way to the next level (0.0 .. 1.0).
    pub fn level_progress(&self) -> f64 {
        if self.xp_to_next_level == 0 {
            return 0.0;
        }
        f64::from(self.xp) / f64::from(self.xp_to_next_level)
    }
}

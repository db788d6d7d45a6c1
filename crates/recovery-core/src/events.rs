use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::milestones::MilestoneId;

/// Every progression state change produces an Event.
/// UI collaborators subscribe through [`ProgressionEngine::subscribe`](crate::ProgressionEngine::subscribe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressionEvent {
    XpAwarded {
        amount: u32,
        xp: u32,
        level: u32,
        at: DateTime<Utc>,
    },
    LevelUp {
        from_level: u32,
        to_level: u32,
        at: DateTime<Utc>,
    },
    LevelUpAcknowledged {
        level: u32,
        at: DateTime<Utc>,
    },
    MilestoneReached {
        milestone: MilestoneId,
        label: String,
        xp_reward: u32,
        at: DateTime<Utc>,
    },
    /// Anchor replaced and progression reset.
    ReAnchored {
        start_date: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    RelapseRecorded {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
}

use serde::{Deserialize, Serialize};

/// XP needed to go from `level` to `level + 1`.
pub fn xp_threshold_for_level(level: u32) -> u32 {
    100u32.saturating_add(level.saturating_sub(1).saturating_mul(50))
}

/// Everyday actions that earn a fixed amount of XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpAction {
    DailyCheckIn,
    JournalEntry,
    MoodLog,
    /// User logged a craving instead of acting on it
    CravingLogged,
    ChatSession,
    BreathingExercise,
}

impl XpAction {
    pub fn xp(self) -> u32 {
        match self {
            XpAction::DailyCheckIn => 10,
            XpAction::JournalEntry => 15,
            XpAction::MoodLog => 5,
            XpAction::CravingLogged => 10,
            XpAction::ChatSession => 10,
            XpAction::BreathingExercise => 5,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            XpAction::DailyCheckIn => "Daily check-in",
            XpAction::JournalEntry => "Journal entry",
            XpAction::MoodLog => "Mood logged",
            XpAction::CravingLogged => "Craving logged",
            XpAction::ChatSession => "Support chat",
            XpAction::BreathingExercise => "Breathing exercise",
        }
    }
}

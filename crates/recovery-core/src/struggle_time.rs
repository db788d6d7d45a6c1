//! Struggle-time slots.
//!
//! Users pick the parts of the day when cravings tend to hit; each pick
//! becomes a daily check-in reminder at the start of that window. The set of
//! slots is closed: a label that does not map onto one of the five windows
//! is rejected rather than guessed at.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::messages::{tpl, MessageTemplate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unrecognized struggle-time label: '{0}'")]
    UnknownLabel(String),
}

/// One of the five daily windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StruggleTimeSlot {
    pub start_hour: u32,
    /// Exclusive; 24 means midnight.
    pub end_hour: u32,
    /// Canonical label as shown in the picker.
    pub label: &'static str,
    pub display_name: &'static str,
    range_text: &'static str,
    pub message_templates: &'static [MessageTemplate],
}

// Late Night precedes Night so substring matching never confuses the two.
static SLOTS: [StruggleTimeSlot; 5] = [
    StruggleTimeSlot {
        start_hour: 6,
        end_hour: 12,
        label: "🌅 Morning (6 AM-12 PM)",
        display_name: "Morning",
        range_text: "6 AM-12 PM",
        message_templates: &[
            tpl!(
                "🌅 Good morning",
                "A new day, a fresh start. How are you feeling?",
                "Good morning {name}. A new day, a fresh start. How are you feeling?",
            ),
            tpl!(
                "☕ Morning check-in",
                "Mornings can be tough. Take a breath and set one small goal for today.",
                "Mornings can be tough, {name}. Take a breath and set one small goal for today.",
            ),
            tpl!(
                "🌱 Start strong",
                "You chose sobriety yesterday. You can choose it again today.",
                "{name}, you chose sobriety yesterday. You can choose it again today.",
            ),
        ],
    },
    StruggleTimeSlot {
        start_hour: 12,
        end_hour: 17,
        label: "☀️ Afternoon (12 PM-5 PM)",
        display_name: "Afternoon",
        range_text: "12 PM-5 PM",
        message_templates: &[
            tpl!(
                "☀️ Afternoon check-in",
                "Halfway through the day. How are the cravings?",
                "Halfway through the day, {name}. How are the cravings?",
            ),
            tpl!(
                "🚶 Take a break",
                "Afternoon slump? A short walk or a glass of water can reset things.",
                "Afternoon slump, {name}? A short walk or a glass of water can reset things.",
            ),
            tpl!(
                "💬 We're here",
                "If the afternoon is getting heavy, open the app and talk it through.",
                "{name}, if the afternoon is getting heavy, open the app and talk it through.",
            ),
        ],
    },
    StruggleTimeSlot {
        start_hour: 17,
        end_hour: 21,
        label: "🌆 Evening (5 PM-9 PM)",
        display_name: "Evening",
        range_text: "5 PM-9 PM",
        message_templates: &[
            tpl!(
                "🌆 Evening check-in",
                "The evening is often the hardest stretch. You've got this.",
                "The evening is often the hardest stretch, {name}. You've got this.",
            ),
            tpl!(
                "🍽️ Plan your evening",
                "Having a plan for tonight makes it easier to stay on track.",
                "{name}, having a plan for tonight makes it easier to stay on track.",
            ),
            tpl!(
                "🧘 Wind down",
                "Try a few minutes of breathing before the evening picks up.",
                "Try a few minutes of breathing before the evening picks up, {name}.",
            ),
        ],
    },
    StruggleTimeSlot {
        start_hour: 0,
        end_hour: 6,
        label: "🌃 Late Night (12 AM-6 AM)",
        display_name: "Late Night",
        range_text: "12 AM-6 AM",
        message_templates: &[
            tpl!(
                "🌃 Still up?",
                "Late nights can feel lonely. Reach out if you need to.",
                "Still up, {name}? Late nights can feel lonely. Reach out if you need to.",
            ),
            tpl!(
                "😴 Rest matters",
                "Sleep is part of recovery. Be gentle with yourself tonight.",
                "Sleep is part of recovery, {name}. Be gentle with yourself tonight.",
            ),
        ],
    },
    StruggleTimeSlot {
        start_hour: 21,
        end_hour: 24,
        label: "🌙 Night (9 PM-12 AM)",
        display_name: "Night",
        range_text: "9 PM-12 AM",
        message_templates: &[
            tpl!(
                "🌙 Night check-in",
                "You made it through another day. That matters.",
                "You made it through another day, {name}. That matters.",
            ),
            tpl!(
                "✨ Reflect",
                "Before bed, write down one thing that went well today.",
                "{name}, before bed write down one thing that went well today.",
            ),
            tpl!(
                "🛏️ Almost there",
                "Cravings at night pass. Hold on until morning.",
                "Cravings at night pass, {name}. Hold on until morning.",
            ),
        ],
    },
];

impl StruggleTimeSlot {
    /// All five slots.
    pub fn all() -> &'static [StruggleTimeSlot] {
        &SLOTS
    }

    /// Map a picker label onto its slot.
    ///
    /// Exact label match first; failing that, the input must carry both the
    /// display name and the slot's own hour range (so an emoji change still
    /// parses but "Morning" on its own does not).
    pub fn parse(label: &str) -> Result<Self, ParseError> {
        let trimmed = label.trim();

        if let Some(slot) = SLOTS.iter().find(|s| s.label == trimmed) {
            return Ok(*slot);
        }

        SLOTS
            .iter()
            .find(|s| trimmed.contains(s.display_name) && trimmed.contains(s.range_text))
            .copied()
            .ok_or_else(|| ParseError::UnknownLabel(label.to_string()))
    }

    /// Whether `hour` (0..24) falls inside this window.
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }

    /// Lowercase, dash-separated form of the display name.
    pub fn slug(&self) -> String {
        self.display_name.to_lowercase().replace(' ', "-")
    }
}

impl FromStr for StruggleTimeSlot {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StruggleTimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

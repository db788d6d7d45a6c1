//! Sobriety milestones.
//!
//! A fixed, ascending table of elapsed-time thresholds. Each milestone pays a
//! one-off XP reward when it is crossed and gets a celebratory notification
//! scheduled for the moment it falls due.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::{tpl, MessageTemplate};

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Stable identity of a milestone: its threshold in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneId(pub u32);

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single milestone definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Milestone {
    pub id: MilestoneId,
    /// Short human label, e.g. "1 week".
    pub label: &'static str,
    pub xp_reward: u32,
    pub message_templates: &'static [MessageTemplate],
}

impl Milestone {
    const fn new(
        minutes: u32,
        label: &'static str,
        xp_reward: u32,
        message_templates: &'static [MessageTemplate],
    ) -> Self {
        Self {
            id: MilestoneId(minutes),
            label,
            xp_reward,
            message_templates,
        }
    }

    /// Threshold in fractional days (1/24 for the first hour).
    pub fn elapsed_days(&self) -> f64 {
        f64::from(self.id.0) / f64::from(MINUTES_PER_DAY)
    }

    /// Whole days represented by this milestone (0 for sub-day milestones).
    pub fn whole_days(&self) -> u32 {
        self.id.0 / MINUTES_PER_DAY
    }

    /// When this milestone falls due for a given anchor date.
    pub fn due_at(&self, start_date: DateTime<Utc>) -> DateTime<Utc> {
        start_date + Duration::minutes(i64::from(self.id.0))
    }
}

static MILESTONES: [Milestone; 10] = [
    Milestone::new(
        60,
        "1 hour",
        10,
        &[tpl!(
            "⏱️ First hour down",
            "One hour sober. Every journey starts exactly like this.",
            "{name}, one hour sober. Every journey starts exactly like this.",
        )],
    ),
    Milestone::new(
        MINUTES_PER_DAY,
        "1 day",
        25,
        &[tpl!(
            "🌱 24 hours strong",
            "A full day sober. You did something hard today.",
            "{name}, a full day sober. You did something hard today.",
        )],
    ),
    Milestone::new(
        3 * MINUTES_PER_DAY,
        "3 days",
        50,
        &[tpl!(
            "💪 {days} days in",
            "The first days are the toughest and you are through them.",
            "{name}, the first days are the toughest and you are through them.",
        )],
    ),
    Milestone::new(
        7 * MINUTES_PER_DAY,
        "1 week",
        100,
        &[tpl!(
            "🎉 One week sober",
            "Seven days. Take a moment to notice how far you have come.",
            "Seven days, {name}. Take a moment to notice how far you have come.",
        )],
    ),
    Milestone::new(
        14 * MINUTES_PER_DAY,
        "2 weeks",
        150,
        &[tpl!(
            "🔥 Two weeks strong",
            "{days} days of choosing yourself. Keep going.",
            "{days} days of choosing yourself, {name}. Keep going.",
        )],
    ),
    Milestone::new(
        30 * MINUTES_PER_DAY,
        "30 days",
        250,
        &[tpl!(
            "🏅 30 days sober",
            "A whole month. New habits are taking root.",
            "A whole month, {name}. New habits are taking root.",
        )],
    ),
    Milestone::new(
        60 * MINUTES_PER_DAY,
        "60 days",
        300,
        &[tpl!(
            "🌟 60 days sober",
            "Two months of showing up for yourself.",
            "{name}, two months of showing up for yourself.",
        )],
    ),
    Milestone::new(
        90 * MINUTES_PER_DAY,
        "90 days",
        400,
        &[tpl!(
            "🏆 90 days sober",
            "Ninety days is a real turning point. Be proud.",
            "Ninety days is a real turning point, {name}. Be proud.",
        )],
    ),
    Milestone::new(
        180 * MINUTES_PER_DAY,
        "6 months",
        500,
        &[tpl!(
            "💎 Six months sober",
            "Half a year of recovery. That is {days} days of strength.",
            "{name}, half a year of recovery. That is {days} days of strength.",
        )],
    ),
    Milestone::new(
        365 * MINUTES_PER_DAY,
        "1 year",
        1000,
        &[tpl!(
            "👑 One year sober",
            "A full year. You rebuilt your life one day at a time.",
            "A full year, {name}. You rebuilt your life one day at a time.",
        )],
    ),
];

/// Lookup helpers over the static milestone table.
pub struct MilestoneTable;

impl MilestoneTable {
    /// All milestones, ascending by threshold.
    pub fn all() -> &'static [Milestone] {
        &MILESTONES
    }

    pub fn get(id: MilestoneId) -> Option<&'static Milestone> {
        MILESTONES.iter().find(|m| m.id == id)
    }

    /// Milestones with a threshold strictly greater than `elapsed_days`, ascending.
    pub fn upcoming(elapsed_days: f64) -> Vec<&'static Milestone> {
        MILESTONES
            .iter()
            .filter(|m| m.elapsed_days() > elapsed_days)
            .collect()
    }

    /// The highest milestone whose threshold is `<= elapsed_days`.
    pub fn reached(elapsed_days: f64) -> Option<&'static Milestone> {
        MILESTONES
            .iter()
            .rev()
            .find(|m| m.elapsed_days() <= elapsed_days)
    }

    /// The first milestone still ahead.
    pub fn next(elapsed_days: f64) -> Option<&'static Milestone> {
        MILESTONES.iter().find(|m| m.elapsed_days() > elapsed_days)
    }
}

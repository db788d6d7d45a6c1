//! Sobriety progression: XP, levels and milestone rewards.
//!
//! [`ProgressionEngine`] is the only writer of [`ProgressionState`]. Every
//! mutation goes through its methods, which hold a single lock for the whole
//! read-modify-write so concurrent awards are never lost.
//!
//! ## Level curve
//!
//! ```text
//! level 1 -> 2: 100 XP
//! level 2 -> 3: 150 XP
//! level n -> n+1: 100 + (n - 1) * 50 XP
//! ```

mod engine;
mod state;
mod xp;

pub use engine::{AnchorChange, LevelUpResult, MilestoneAward, ProgressionEngine};
pub use state::ProgressionState;
pub use xp::{xp_threshold_for_level, XpAction};

//! # Recovery Core Library
//!
//! This library provides the progression and reminder logic behind the
//! Recovery sobriety tracker. Screens, journaling and chat live in the host
//! application; they read state from this crate and call into it when the
//! user does something worth rewarding.
//!
//! ## Architecture
//!
//! - **Progression Engine**: XP, levels and milestone detection computed from
//!   the sobriety anchor date and an injectable [`Clock`]
//! - **Milestones**: Static ordered table of elapsed-time thresholds
//! - **Struggle Times**: The five daily windows a user can ask to be checked on
//! - **Notifications**: Cancel-then-resubmit scheduling of struggle-time and
//!   milestone reminders against a platform [`NotificationFacility`]
//! - **Storage**: JSON state blob behind a key-value store, TOML configuration
//!
//! ## Key Components
//!
//! - [`ProgressionEngine`]: Single-writer owner of [`ProgressionState`]
//! - [`MilestoneTable`]: Milestone lookups
//! - [`MessageComposer`]: Notification copy
//! - [`NotificationScheduler`]: Reminder scheduling
//! - [`Config`]: User preferences

pub mod clock;
pub mod error;
pub mod events;
pub mod messages;
pub mod milestones;
pub mod notifications;
pub mod progression;
pub mod storage;
pub mod struggle_time;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{
    ConfigError, CoreError, FacilityError, SchedulerError, StorageError, ValidationError,
};
pub use events::ProgressionEvent;
pub use messages::{MessageComposer, NotificationContent, Personalization};
pub use milestones::{Milestone, MilestoneId, MilestoneTable};
pub use notifications::{
    NotificationFacility, NotificationKind, NotificationRequest, NotificationScheduler,
    NotificationTrigger, ScheduleOutcome, ScheduleReport, ScheduledNotification,
};
pub use progression::{
    xp_threshold_for_level, AnchorChange, LevelUpResult, MilestoneAward, ProgressionEngine,
    ProgressionState, XpAction,
};
pub use storage::{Config, FileStore, KeyValueStore, MemoryStore, PROGRESSION_STORAGE_KEY};
pub use struggle_time::{ParseError, StruggleTimeSlot};

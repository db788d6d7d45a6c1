//! Local notification scheduling.
//!
//! Two families of reminders are owned by this crate:
//!
//! - **Struggle time**: daily-recurring check-ins at the start of each
//!   window the user picked
//! - **Milestone**: one-shot celebrations at `anchor + threshold`
//!
//! Both follow the same protocol: cancel everything the family owns, compute
//! the entries, compose their copy, submit. Identifiers are derived from the
//! entry itself, so re-running the protocol with the same inputs converges on
//! the same set of scheduled notifications.

mod facility;
mod scheduler;

pub use facility::{
    milestone_identifier, struggle_time_identifier, NotificationFacility, NotificationKind,
    NotificationRequest, NotificationTrigger, ScheduledNotification,
};
pub use scheduler::{
    EntryFailure, FamilyOutcome, NotificationScheduler, PreferencesOutcome, ScheduleOutcome,
    ScheduleReport,
};

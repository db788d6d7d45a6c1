use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FacilityError;
use crate::messages::NotificationContent;
use crate::milestones::Milestone;
use crate::struggle_time::StruggleTimeSlot;

/// Reminder family. Each family owns a disjoint identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StruggleTime,
    Milestone,
}

impl NotificationKind {
    pub fn prefix(self) -> &'static str {
        match self {
            NotificationKind::StruggleTime => "struggle-time-",
            NotificationKind::Milestone => "milestone-",
        }
    }

    /// Whether `entry` belongs to this family, by metadata or by prefix.
    pub fn owns(self, entry: &ScheduledNotification) -> bool {
        entry.kind == Some(self) || entry.identifier.starts_with(self.prefix())
    }
}

/// When a notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationTrigger {
    /// Every day at local `hour:minute`.
    Daily { hour: u32, minute: u32 },
    /// Once, at an absolute instant.
    At { at: DateTime<Utc> },
}

/// A request handed to the facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub kind: NotificationKind,
    pub content: NotificationContent,
    pub trigger: NotificationTrigger,
}

/// An entry the facility reports as pending.
///
/// Entries from other features of the host app show up here too; they carry
/// no `kind` and a foreign identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub identifier: String,
    #[serde(default)]
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub trigger: Option<NotificationTrigger>,
}

pub fn struggle_time_identifier(slot: &StruggleTimeSlot) -> String {
    format!(
        "{}{:02}-{}",
        NotificationKind::StruggleTime.prefix(),
        slot.start_hour,
        slot.slug()
    )
}

pub fn milestone_identifier(milestone: &Milestone) -> String {
    format!("{}{}", NotificationKind::Milestone.prefix(), milestone.id)
}

/// The platform's local notification service.
///
/// Implementations must treat `schedule` with an existing identifier as a
/// replacement.
#[async_trait]
pub trait NotificationFacility: Send + Sync {
    /// Ask for (or confirm) permission to post notifications.
    async fn request_permission(&self) -> bool;

    /// Schedule a notification; returns the facility's identifier for it.
    async fn schedule(&self, request: NotificationRequest) -> Result<String, FacilityError>;

    async fn cancel(&self, identifier: &str) -> Result<(), FacilityError>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, FacilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milestones::{MilestoneId, MilestoneTable};

    #[test]
    fn identifiers_are_deterministic() {
        let slot = StruggleTimeSlot::parse("🌃 Late Night (12 AM-6 AM)").unwrap();
        assert_eq!(struggle_time_identifier(&slot), "struggle-time-00-late-night");

        let slot = StruggleTimeSlot::parse("🌆 Evening (5 PM-9 PM)").unwrap();
        assert_eq!(struggle_time_identifier(&slot), "struggle-time-17-evening");

        let hour = MilestoneTable::get(MilestoneId(60)).unwrap();
        assert_eq!(milestone_identifier(hour), "milestone-60");
    }

    #[test]
    fn identifier_namespaces_are_disjoint() {
        let ids: Vec<String> = StruggleTimeSlot::all()
            .iter()
            .map(struggle_time_identifier)
            .chain(MilestoneTable::all().iter().map(milestone_identifier))
            .collect();

        for id in &ids {
            let entry = ScheduledNotification {
                identifier: id.clone(),
                kind: None,
                trigger: None,
            };
            let owners = [NotificationKind::StruggleTime, NotificationKind::Milestone]
                .iter()
                .filter(|k| k.owns(&entry))
                .count();
            assert_eq!(owners, 1, "{id}");
        }

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn ownership_by_metadata() {
        let entry = ScheduledNotification {
            identifier: "legacy-42".into(),
            kind: Some(NotificationKind::Milestone),
            trigger: None,
        };
        assert!(NotificationKind::Milestone.owns(&entry));
        assert!(!NotificationKind::StruggleTime.owns(&entry));

        let foreign = ScheduledNotification {
            identifier: "journal-reminder".into(),
            kind: None,
            trigger: None,
        };
        assert!(!NotificationKind::Milestone.owns(&foreign));
    }

    #[test]
    fn trigger_serialization_is_tagged() {
        let json = serde_json::to_value(NotificationTrigger::Daily { hour: 6, minute: 0 }).unwrap();
        assert_eq!(json["type"], "daily");
        assert_eq!(json["hour"], 6);
    }
}

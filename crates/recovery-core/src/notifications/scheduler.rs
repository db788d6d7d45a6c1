//! Cancel-then-resubmit scheduling for both reminder families.
//!
//! ## Protocol (per family)
//!
//! ```text
//! permission? ──no──> PermissionDenied
//!     │
//!    yes
//!     ▼
//! cancel owned entries ─> compute entries ─> compose copy ─> submit each
//! ```
//!
//! Each family has its own async lock, so one family's sequence never
//! interleaves with another run of the same family. Milestone reschedules
//! are ordered by [`AnchorChange::sequence`]: a token older than one already
//! seen is dropped, and a run overtaken by a newer anchor stops and reports
//! `Superseded`. Arrival order does not matter.

use std::collections::HashSet;
use std::sync::{Arc, MutexGuard, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::facility::{
    milestone_identifier, struggle_time_identifier, NotificationFacility, NotificationKind,
    NotificationRequest, NotificationTrigger,
};
use crate::clock::{elapsed_days, Clock};
use crate::error::{FacilityError, SchedulerError};
use crate::messages::{MessageComposer, Personalization};
use crate::milestones::MilestoneTable;
use crate::progression::AnchorChange;
use crate::storage::NotificationsConfig;
use crate::struggle_time::{ParseError, StruggleTimeSlot};

/// A single entry the facility refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub identifier: String,
    pub error: FacilityError,
}

/// Granular result of one family run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Labels (struggle time) or milestones (milestone family) considered.
    pub requested: usize,
    /// Identifiers accepted by the facility, in submission order.
    pub scheduled: Vec<String>,
    /// Previously scheduled entries removed during the cancel phase.
    pub cancelled: usize,
    pub parse_errors: Vec<ParseError>,
    pub failures: Vec<EntryFailure>,
    pub cancel_failures: Vec<EntryFailure>,
}

impl ScheduleReport {
    pub fn succeeded(&self) -> usize {
        self.scheduled.len()
    }

    /// No parse errors and no facility failures.
    pub fn is_complete(&self) -> bool {
        self.parse_errors.is_empty() && self.failures.is_empty() && self.cancel_failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Completed(ScheduleReport),
    /// The user has not granted notification permission. Nothing was
    /// cancelled or scheduled.
    PermissionDenied,
    /// A newer milestone reschedule took over; the report covers whatever
    /// this run did before stopping.
    Superseded(ScheduleReport),
}

impl ScheduleOutcome {
    pub fn report(&self) -> Option<&ScheduleReport> {
        match self {
            ScheduleOutcome::Completed(report) | ScheduleOutcome::Superseded(report) => {
                Some(report)
            }
            ScheduleOutcome::PermissionDenied => None,
        }
    }

    pub fn scheduled_count(&self) -> usize {
        self.report().map_or(0, ScheduleReport::succeeded)
    }
}

/// What happened to one family when applying preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyOutcome {
    Scheduled(ScheduleOutcome),
    /// Family switched off; existing entries were cancelled.
    Disabled { cancelled: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferencesOutcome {
    pub struggle_times: FamilyOutcome,
    pub milestones: FamilyOutcome,
}

/// Coalescing state for the milestone family.
#[derive(Debug, Default)]
struct MilestoneTicket {
    /// Highest anchor sequence admitted so far.
    latest_anchor: u64,
    /// Bumped by every admitted reschedule and every cancel.
    generation: u64,
}

/// Owns the struggle-time and milestone reminder families.
pub struct NotificationScheduler {
    facility: Arc<dyn NotificationFacility>,
    clock: Arc<dyn Clock>,
    composer: MessageComposer,
    user_name: RwLock<Option<String>>,
    struggle_lock: Mutex<()>,
    milestone_lock: Mutex<()>,
    milestone_ticket: std::sync::Mutex<MilestoneTicket>,
}

impl NotificationScheduler {
    pub fn new(facility: Arc<dyn NotificationFacility>, clock: Arc<dyn Clock>) -> Self {
        Self {
            facility,
            clock,
            composer: MessageComposer::new(),
            user_name: RwLock::new(None),
            struggle_lock: Mutex::new(()),
            milestone_lock: Mutex::new(()),
            milestone_ticket: std::sync::Mutex::new(MilestoneTicket::default()),
        }
    }

    pub fn with_composer(mut self, composer: MessageComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_user_name(self, name: Option<String>) -> Self {
        self.set_user_name(name);
        self
    }

    /// Takes effect on the next schedule run.
    pub fn set_user_name(&self, name: Option<String>) {
        *self.user_name.write().unwrap_or_else(|e| e.into_inner()) = name;
    }

    fn personalization(&self, elapsed_days: u32) -> Personalization {
        let name = self
            .user_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Personalization::new(name, elapsed_days)
    }

    // ── Struggle time ────────────────────────────────────────────────

    /// Replace all struggle-time reminders with one daily reminder per
    /// recognized label. Unrecognized labels are skipped and reported.
    ///
    /// # Errors
    ///
    /// Returns an error only if the facility cannot list its entries.
    pub async fn schedule_struggle_times(
        &self,
        labels: &[String],
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let _guard = self.struggle_lock.lock().await;

        if !self.facility.request_permission().await {
            warn!("notification permission denied, struggle-time reminders not scheduled");
            return Ok(ScheduleOutcome::PermissionDenied);
        }

        let mut report = ScheduleReport {
            requested: labels.len(),
            ..ScheduleReport::default()
        };
        self.cancel_family(NotificationKind::StruggleTime, &mut report)
            .await?;

        let mut slots = Vec::new();
        let mut seen = HashSet::new();
        for label in labels {
            match StruggleTimeSlot::parse(label) {
                Ok(slot) => {
                    if seen.insert(slot.start_hour) {
                        slots.push(slot);
                    } else {
                        debug!(label = %label, "duplicate struggle-time label ignored");
                    }
                }
                Err(e) => {
                    warn!(label = %label, "skipping unrecognized struggle-time label");
                    report.parse_errors.push(e);
                }
            }
        }

        let personalization = self.personalization(0);
        for slot in slots {
            let request = NotificationRequest {
                identifier: struggle_time_identifier(&slot),
                kind: NotificationKind::StruggleTime,
                content: self.composer.compose_struggle_time(&slot, &personalization),
                trigger: NotificationTrigger::Daily {
                    hour: slot.start_hour,
                    minute: 0,
                },
            };
            self.submit(request, &mut report).await;
        }

        info!(
            requested = report.requested,
            scheduled = report.succeeded(),
            cancelled = report.cancelled,
            parse_errors = report.parse_errors.len(),
            failures = report.failures.len(),
            "struggle-time reminders scheduled"
        );
        Ok(ScheduleOutcome::Completed(report))
    }

    /// Remove every struggle-time reminder. Returns how many were cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the facility cannot list its entries.
    pub async fn cancel_struggle_times(&self) -> Result<usize, SchedulerError> {
        let _guard = self.struggle_lock.lock().await;
        let mut report = ScheduleReport::default();
        self.cancel_family(NotificationKind::StruggleTime, &mut report)
            .await?;
        info!(cancelled = report.cancelled, "struggle-time reminders cancelled");
        Ok(report.cancelled)
    }

    // ── Milestones ───────────────────────────────────────────────────

    /// Replace all milestone reminders with ones computed from the new
    /// anchor. Must be given every [`AnchorChange`] the engine produces.
    ///
    /// A token older than one this scheduler has already seen is dropped
    /// without touching the facility and reported as `Superseded`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the facility cannot list its entries.
    pub async fn reschedule_milestones(
        &self,
        change: AnchorChange,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let start_date = change.start_date();
        let Some(generation) = self.admit(change.sequence()) else {
            info!(
                start_date = %start_date,
                sequence = change.sequence(),
                "ignoring milestone reschedule for an outdated anchor"
            );
            return Ok(ScheduleOutcome::Superseded(ScheduleReport::default()));
        };
        let _guard = self.milestone_lock.lock().await;

        if self.is_stale(generation) {
            debug!(start_date = %start_date, "milestone reschedule superseded before start");
            return Ok(ScheduleOutcome::Superseded(ScheduleReport::default()));
        }

        if !self.facility.request_permission().await {
            warn!("notification permission denied, milestone reminders not scheduled");
            return Ok(ScheduleOutcome::PermissionDenied);
        }

        let mut report = ScheduleReport::default();
        self.cancel_family(NotificationKind::Milestone, &mut report)
            .await?;

        let elapsed = elapsed_days(start_date, self.clock.now());
        let upcoming = MilestoneTable::upcoming(elapsed);
        report.requested = upcoming.len();

        let personalization = self.personalization(elapsed.max(0.0).floor() as u32);
        for milestone in upcoming {
            if self.is_stale(generation) {
                info!(
                    start_date = %start_date,
                    scheduled = report.succeeded(),
                    "milestone reschedule superseded by newer anchor"
                );
                return Ok(ScheduleOutcome::Superseded(report));
            }
            let request = NotificationRequest {
                identifier: milestone_identifier(milestone),
                kind: NotificationKind::Milestone,
                content: self.composer.compose_milestone(milestone, &personalization),
                trigger: NotificationTrigger::At {
                    at: milestone.due_at(start_date),
                },
            };
            self.submit(request, &mut report).await;
        }

        if self.is_stale(generation) {
            info!(
                start_date = %start_date,
                scheduled = report.succeeded(),
                "milestone reschedule superseded after last submit"
            );
            return Ok(ScheduleOutcome::Superseded(report));
        }

        info!(
            start_date = %start_date,
            requested = report.requested,
            scheduled = report.succeeded(),
            cancelled = report.cancelled,
            failures = report.failures.len(),
            "milestone reminders rescheduled"
        );
        Ok(ScheduleOutcome::Completed(report))
    }

    /// Remove every milestone reminder. Any in-flight reschedule is
    /// superseded.
    ///
    /// # Errors
    ///
    /// Returns an error if the facility cannot list its entries.
    pub async fn cancel_milestones(&self) -> Result<usize, SchedulerError> {
        self.supersede_in_flight();
        let _guard = self.milestone_lock.lock().await;
        let mut report = ScheduleReport::default();
        self.cancel_family(NotificationKind::Milestone, &mut report)
            .await?;
        info!(cancelled = report.cancelled, "milestone reminders cancelled");
        Ok(report.cancelled)
    }

    // ── Preferences ──────────────────────────────────────────────────

    /// Bring both families in line with the user's notification settings.
    /// The two families run concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first listing failure from either family.
    pub async fn apply_preferences(
        &self,
        config: &NotificationsConfig,
        anchor: AnchorChange,
    ) -> Result<PreferencesOutcome, SchedulerError> {
        let struggle = async {
            if config.struggle_times_enabled() {
                self.schedule_struggle_times(&config.struggle_time_labels)
                    .await
                    .map(FamilyOutcome::Scheduled)
            } else {
                self.cancel_struggle_times()
                    .await
                    .map(|cancelled| FamilyOutcome::Disabled { cancelled })
            }
        };
        let milestones = async {
            if config.milestones_enabled() {
                self.reschedule_milestones(anchor)
                    .await
                    .map(FamilyOutcome::Scheduled)
            } else {
                self.cancel_milestones()
                    .await
                    .map(|cancelled| FamilyOutcome::Disabled { cancelled })
            }
        };

        let (struggle_times, milestones) = tokio::join!(struggle, milestones);
        Ok(PreferencesOutcome {
            struggle_times: struggle_times?,
            milestones: milestones?,
        })
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ticket(&self) -> MutexGuard<'_, MilestoneTicket> {
        self.milestone_ticket.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the run's generation, or `None` if a newer anchor was
    /// already admitted.
    fn admit(&self, sequence: u64) -> Option<u64> {
        let mut ticket = self.ticket();
        if sequence < ticket.latest_anchor {
            return None;
        }
        ticket.latest_anchor = sequence;
        ticket.generation += 1;
        Some(ticket.generation)
    }

    fn supersede_in_flight(&self) {
        self.ticket().generation += 1;
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.ticket().generation != generation
    }

    async fn cancel_family(
        &self,
        kind: NotificationKind,
        report: &mut ScheduleReport,
    ) -> Result<(), SchedulerError> {
        let entries = self
            .facility
            .list_scheduled()
            .await
            .map_err(SchedulerError::ListFailed)?;

        for entry in entries.into_iter().filter(|e| kind.owns(e)) {
            match self.facility.cancel(&entry.identifier).await {
                // Already gone counts as cancelled.
                Ok(()) | Err(FacilityError::NotFound(_)) => report.cancelled += 1,
                Err(error) => {
                    warn!(identifier = %entry.identifier, %error, "failed to cancel notification");
                    report.cancel_failures.push(EntryFailure {
                        identifier: entry.identifier,
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    async fn submit(&self, request: NotificationRequest, report: &mut ScheduleReport) {
        let identifier = request.identifier.clone();
        match self.facility.schedule(request).await {
            Ok(id) => {
                debug!(identifier = %id, "notification scheduled");
                report.scheduled.push(id);
            }
            Err(error) => {
                warn!(identifier = %identifier, %error, "failed to schedule notification");
                report.failures.push(EntryFailure { identifier, error });
            }
        }
    }
}

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use recovery_core::notifications::FamilyOutcome;
use recovery_core::{
    Clock, FacilityError, FixedClock, MessageComposer, MilestoneTable, NotificationKind,
    NotificationScheduler, NotificationTrigger, ParseError, ProgressionEngine, ScheduleOutcome,
    ScheduleReport, SchedulerError,
};
use support::{BrokenFacility, Call, RecordingFacility};

const MORNING: &str = "🌅 Morning (6 AM-12 PM)";
const EVENING: &str = "🌆 Evening (5 PM-9 PM)";

struct Harness {
    clock: Arc<FixedClock>,
    facility: Arc<RecordingFacility>,
    engine: ProgressionEngine,
    scheduler: NotificationScheduler,
}

fn harness_with(facility: RecordingFacility) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap(),
    ));
    let facility = Arc::new(facility);
    let engine = ProgressionEngine::new(clock.clone());
    let scheduler = NotificationScheduler::new(facility.clone(), clock.clone())
        .with_composer(MessageComposer::with_seed(7));
    Harness {
        clock,
        facility,
        engine,
        scheduler,
    }
}

fn harness() -> Harness {
    harness_with(RecordingFacility::new())
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn completed(outcome: ScheduleOutcome) -> ScheduleReport {
    match outcome {
        ScheduleOutcome::Completed(report) => report,
        other => panic!("expected completed run, got {other:?}"),
    }
}

// ── Struggle time ────────────────────────────────────────────────────

#[tokio::test]
async fn schedules_recognized_labels_and_reports_unknown_ones() {
    let h = harness();

    let outcome = h
        .scheduler
        .schedule_struggle_times(&labels(&[MORNING, "bogus"]))
        .await
        .unwrap();
    let report = completed(outcome);

    assert_eq!(report.requested, 2);
    assert_eq!(report.scheduled, vec!["struggle-time-06-morning".to_string()]);
    assert_eq!(
        report.parse_errors,
        vec![ParseError::UnknownLabel("bogus".into())]
    );
    assert!(report.failures.is_empty());

    let pending = h.facility.pending();
    let entry = &pending["struggle-time-06-morning"];
    assert_eq!(entry.kind, NotificationKind::StruggleTime);
    assert_eq!(entry.trigger, NotificationTrigger::Daily { hour: 6, minute: 0 });
    assert!(!entry.content.title.is_empty());
}

#[tokio::test]
async fn empty_label_list_clears_the_family() {
    let h = harness();
    h.scheduler
        .schedule_struggle_times(&labels(&[MORNING, EVENING]))
        .await
        .unwrap();
    assert_eq!(h.facility.pending_ids().len(), 2);

    let report = completed(h.scheduler.schedule_struggle_times(&[]).await.unwrap());
    assert_eq!(report.cancelled, 2);
    assert!(report.scheduled.is_empty());
    assert!(h.facility.pending_ids().is_empty());
}

#[tokio::test]
async fn repeated_runs_leave_the_same_set() {
    let h = harness();
    let picks = labels(&[EVENING, MORNING]);

    h.scheduler.schedule_struggle_times(&picks).await.unwrap();
    let first = h.facility.pending_ids();

    let report = completed(h.scheduler.schedule_struggle_times(&picks).await.unwrap());
    assert_eq!(report.cancelled, 2);
    assert_eq!(h.facility.pending_ids(), first);
    assert_eq!(
        first,
        vec![
            "struggle-time-06-morning".to_string(),
            "struggle-time-17-evening".to_string()
        ]
    );
}

#[tokio::test]
async fn duplicate_and_drifted_labels_collapse_to_one_entry() {
    let h = harness();
    let picks = labels(&[EVENING, "  🌆 Evening (5 PM-9 PM) ", "Evening (5 PM-9 PM)"]);
    let report = completed(h.scheduler.schedule_struggle_times(&picks).await.unwrap());
    assert_eq!(report.scheduled, vec!["struggle-time-17-evening".to_string()]);
    assert!(report.parse_errors.is_empty());
}

#[tokio::test]
async fn struggle_run_leaves_milestones_and_foreign_entries_alone() {
    let h = harness();
    h.facility.add_foreign("journal-reminder");
    h.scheduler
        .reschedule_milestones(h.engine.current_anchor())
        .await
        .unwrap();
    let milestone_ids: Vec<String> = h
        .facility
        .pending_ids()
        .into_iter()
        .filter(|id| id.starts_with("milestone-"))
        .collect();
    assert_eq!(milestone_ids.len(), MilestoneTable::all().len());

    h.scheduler
        .schedule_struggle_times(&labels(&[MORNING]))
        .await
        .unwrap();
    h.scheduler.cancel_struggle_times().await.unwrap();

    assert_eq!(h.facility.foreign_ids(), vec!["journal-reminder".to_string()]);
    assert_eq!(h.facility.pending_ids(), milestone_ids);
}

// ── Milestones ───────────────────────────────────────────────────────

#[tokio::test]
async fn reschedule_cancels_everything_before_submitting() {
    let h = harness();
    h.scheduler
        .reschedule_milestones(h.engine.current_anchor())
        .await
        .unwrap();
    assert_eq!(h.facility.pending_ids().len(), 10);
    h.facility.clear_calls();

    let anchor = h.clock.now() - Duration::days(10);
    let change = h.engine.re_anchor(anchor).unwrap();
    let report = completed(h.scheduler.reschedule_milestones(change).await.unwrap());

    let calls = h.facility.calls();
    let last_cancel = calls
        .iter()
        .rposition(|c| matches!(c, Call::Cancel(_)))
        .unwrap();
    let first_schedule = calls
        .iter()
        .position(|c| matches!(c, Call::Schedule(_)))
        .unwrap();
    assert!(last_cancel < first_schedule, "{calls:?}");
    assert_eq!(calls[0], Call::RequestPermission);
    assert_eq!(report.cancelled, 10);

    // 1 hour, 1 day, 3 days and 1 week are behind us.
    let expected: Vec<String> = [20160, 43200, 86400, 129600, 259200, 525600]
        .iter()
        .map(|m| format!("milestone-{m}"))
        .collect();
    assert_eq!(report.scheduled, expected);
    assert_eq!(report.requested, 6);

    let pending = h.facility.pending();
    assert_eq!(pending.len(), 6);
    assert_eq!(
        pending["milestone-20160"].trigger,
        NotificationTrigger::At {
            at: anchor + Duration::days(14)
        }
    );
}

#[tokio::test]
async fn milestone_copy_uses_the_user_name() {
    let h = harness();
    let scheduler = NotificationScheduler::new(h.facility.clone(), h.clock.clone())
        .with_user_name(Some("Sam".into()));

    scheduler
        .reschedule_milestones(h.engine.current_anchor())
        .await
        .unwrap();
    let pending = h.facility.pending();
    assert!(pending["milestone-60"].content.body.starts_with("Sam,"));

    scheduler.set_user_name(Some("   ".into()));
    scheduler
        .reschedule_milestones(h.engine.current_anchor())
        .await
        .unwrap();
    let pending = h.facility.pending();
    assert!(!pending["milestone-60"].content.body.contains("{name}"));
    assert!(pending["milestone-60"].content.body.starts_with("One hour"));
}

#[tokio::test]
async fn permission_denied_touches_nothing() {
    let h = harness_with(RecordingFacility::denied());
    h.facility.add_foreign("milestone-60");

    let outcome = h
        .scheduler
        .reschedule_milestones(h.engine.current_anchor())
        .await
        .unwrap();
    assert_eq!(outcome, ScheduleOutcome::PermissionDenied);

    let outcome = h
        .scheduler
        .schedule_struggle_times(&labels(&[MORNING]))
        .await
        .unwrap();
    assert_eq!(outcome, ScheduleOutcome::PermissionDenied);

    assert!(h
        .facility
        .calls()
        .iter()
        .all(|c| *c == Call::RequestPermission));
    assert_eq!(h.facility.foreign_ids(), vec!["milestone-60".to_string()]);
}

#[tokio::test]
async fn one_rejected_entry_does_not_stop_the_rest() {
    let h = harness_with(RecordingFacility::rejecting(&["milestone-1440"]));

    let report = completed(
        h.scheduler
            .reschedule_milestones(h.engine.current_anchor())
            .await
            .unwrap(),
    );

    assert_eq!(report.requested, 10);
    assert_eq!(report.succeeded(), 9);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].identifier, "milestone-1440");
    assert!(matches!(report.failures[0].error, FacilityError::Rejected(_)));
    assert!(!report.is_complete());
    assert!(!h.facility.pending_ids().contains(&"milestone-1440".to_string()));
}

#[tokio::test]
async fn missing_entries_count_as_cancelled() {
    let h = harness_with(
        RecordingFacility::new().with_cancel_error(FacilityError::NotFound("gone".into())),
    );
    h.facility.add_foreign("milestone-60");
    h.facility.add_foreign("milestone-1440");

    let report = completed(
        h.scheduler
            .reschedule_milestones(h.engine.current_anchor())
            .await
            .unwrap(),
    );
    assert_eq!(report.cancelled, 2);
    assert!(report.cancel_failures.is_empty());
}

#[tokio::test]
async fn cancel_errors_are_reported_not_fatal() {
    let h = harness_with(
        RecordingFacility::new().with_cancel_error(FacilityError::Unavailable("busy".into())),
    );
    h.facility.add_foreign("struggle-time-06-morning");

    let report = completed(
        h.scheduler
            .schedule_struggle_times(&labels(&[EVENING]))
            .await
            .unwrap(),
    );
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.cancel_failures.len(), 1);
    assert_eq!(report.scheduled, vec!["struggle-time-17-evening".to_string()]);
}

#[tokio::test]
async fn listing_failure_is_an_error() {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let engine = ProgressionEngine::new(clock.clone());
    let scheduler = NotificationScheduler::new(Arc::new(BrokenFacility), clock);

    let err = scheduler
        .reschedule_milestones(engine.current_anchor())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::ListFailed(FacilityError::Unavailable(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn newer_anchor_supersedes_in_flight_reschedule() {
    let h = harness_with(
        RecordingFacility::new().with_schedule_delay(StdDuration::from_millis(25)),
    );
    let scheduler = Arc::new(h.scheduler);

    let old_anchor = h.engine.re_anchor(h.clock.now() - Duration::days(10)).unwrap();
    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.reschedule_milestones(old_anchor).await })
    };
    tokio::time::sleep(StdDuration::from_millis(40)).await;

    let new_anchor = h.engine.record_relapse();
    let new_start = new_anchor.start_date();
    let second = scheduler.reschedule_milestones(new_anchor).await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert!(matches!(first, ScheduleOutcome::Superseded(_)), "{first:?}");
    let report = completed(second);
    assert_eq!(report.succeeded(), 10);

    let pending = h.facility.pending();
    assert_eq!(pending.len(), 10);
    assert_eq!(
        pending["milestone-60"].trigger,
        NotificationTrigger::At {
            at: new_start + Duration::minutes(60)
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn outdated_anchor_cannot_displace_a_newer_one() {
    let h = harness_with(
        RecordingFacility::new().with_schedule_delay(StdDuration::from_millis(20)),
    );
    let scheduler = Arc::new(h.scheduler);

    let old_anchor = h.engine.re_anchor(h.clock.now() - Duration::days(10)).unwrap();
    let new_anchor = h.engine.record_relapse();
    let new_start = new_anchor.start_date();
    assert!(new_anchor.sequence() > old_anchor.sequence());

    let newer = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.reschedule_milestones(new_anchor).await })
    };
    tokio::time::sleep(StdDuration::from_millis(30)).await;

    let stale = scheduler.reschedule_milestones(old_anchor).await.unwrap();
    let newer = newer.await.unwrap().unwrap();

    assert!(matches!(stale, ScheduleOutcome::Superseded(_)), "{stale:?}");
    assert_eq!(completed(newer).succeeded(), 10);

    let pending = h.facility.pending();
    assert_eq!(pending.len(), 10);
    assert_eq!(
        pending["milestone-20160"].trigger,
        NotificationTrigger::At {
            at: new_start + Duration::days(14)
        }
    );
}

#[tokio::test]
async fn outdated_anchor_after_newer_run_touches_nothing() {
    let h = harness();
    let old_anchor = h.engine.current_anchor();
    let new_anchor = h.engine.re_anchor(h.clock.now() - Duration::days(10)).unwrap();

    completed(h.scheduler.reschedule_milestones(new_anchor).await.unwrap());
    let before = h.facility.pending();
    h.facility.clear_calls();

    let outcome = h.scheduler.reschedule_milestones(old_anchor).await.unwrap();
    assert_eq!(outcome, ScheduleOutcome::Superseded(ScheduleReport::default()));
    assert!(h.facility.calls().is_empty());
    assert_eq!(h.facility.pending(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_last_submit_supersedes_the_run() {
    let h = harness_with(
        RecordingFacility::new().with_schedule_delay(StdDuration::from_millis(60)),
    );
    let scheduler = Arc::new(h.scheduler);

    // Only the one-year milestone is still ahead.
    let anchor = h.engine.re_anchor(h.clock.now() - Duration::days(300)).unwrap();
    let run = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.reschedule_milestones(anchor).await })
    };
    tokio::time::sleep(StdDuration::from_millis(25)).await;

    let cancelled = scheduler.cancel_milestones().await.unwrap();
    let outcome = run.await.unwrap().unwrap();

    let ScheduleOutcome::Superseded(report) = outcome else {
        panic!("expected superseded run, got {outcome:?}");
    };
    assert_eq!(report.scheduled, vec!["milestone-525600".to_string()]);
    assert_eq!(cancelled, 1);
    assert!(h.facility.pending_ids().is_empty());
}

// ── Preferences ──────────────────────────────────────────────────────

#[tokio::test]
async fn apply_preferences_honours_family_switches() {
    let h = harness();
    let mut config = recovery_core::Config::default();
    config.notifications.struggle_time_labels = labels(&[MORNING, EVENING]);

    let outcome = h
        .scheduler
        .apply_preferences(&config.notifications, h.engine.current_anchor())
        .await
        .unwrap();
    assert!(matches!(
        outcome.struggle_times,
        FamilyOutcome::Scheduled(ScheduleOutcome::Completed(_))
    ));
    assert!(matches!(
        outcome.milestones,
        FamilyOutcome::Scheduled(ScheduleOutcome::Completed(_))
    ));
    assert_eq!(h.facility.pending_ids().len(), 12);

    config.notifications.milestones = false;
    let outcome = h
        .scheduler
        .apply_preferences(&config.notifications, h.engine.current_anchor())
        .await
        .unwrap();
    assert_eq!(outcome.milestones, FamilyOutcome::Disabled { cancelled: 10 });
    assert_eq!(h.facility.pending_ids().len(), 2);

    config.notifications.enabled = false;
    let outcome = h
        .scheduler
        .apply_preferences(&config.notifications, h.engine.current_anchor())
        .await
        .unwrap();
    assert_eq!(outcome.struggle_times, FamilyOutcome::Disabled { cancelled: 2 });
    assert_eq!(outcome.milestones, FamilyOutcome::Disabled { cancelled: 0 });
    assert!(h.facility.pending_ids().is_empty());
}

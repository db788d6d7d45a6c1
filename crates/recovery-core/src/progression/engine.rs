//! Progression engine implementation.
//!
//! All operations are synchronous, in-memory state transformations. The
//! engine never writes to storage on its own; callers decide when to
//! [`persist`](ProgressionEngine::persist).
//!
//! ## Anchor changes
//!
//! ```text
//! re_anchor(date) ──┐
//!                   ├──> AnchorChange ──> NotificationScheduler::reschedule_milestones
//! record_relapse() ─┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::state::ProgressionState;
use super::xp::{xp_threshold_for_level, XpAction};
use crate::clock::{elapsed_days, Clock};
use crate::error::{StorageError, ValidationError};
use crate::events::ProgressionEvent;
use crate::milestones::{Milestone, MilestoneTable};
use crate::storage::{KeyValueStore, PROGRESSION_STORAGE_KEY};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of an XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpResult {
    pub levels_gained: u32,
    pub level: u32,
    pub xp: u32,
}

impl LevelUpResult {
    pub fn leveled_up(&self) -> bool {
        self.levels_gained > 0
    }
}

/// A milestone that was just paid out.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneAward {
    pub milestone: &'static Milestone,
    pub level_up: LevelUpResult,
}

/// Proof that the anchor date changed.
///
/// Only the engine can create one and only the notification scheduler can
/// consume one, so milestone reminders cannot silently keep pointing at the
/// old anchor. Tokens are numbered in the order the engine issued them; a
/// higher sequence always describes a newer anchor.
#[must_use = "pass this to NotificationScheduler::reschedule_milestones"]
#[derive(Debug)]
pub struct AnchorChange {
    start_date: DateTime<Utc>,
    sequence: u64,
}

impl AnchorChange {
    pub(crate) fn new(start_date: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            start_date,
            sequence,
        }
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Issue order within the engine that produced this token.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Single-writer owner of [`ProgressionState`].
pub struct ProgressionEngine {
    state: Mutex<ProgressionState>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<ProgressionEvent>,
    /// Only bumped while `state` is locked.
    anchor_sequence: AtomicU64,
}

impl ProgressionEngine {
    /// Fresh progression anchored at the clock's current time.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let state = ProgressionState::new(clock.now());
        Self::from_state(state, clock)
    }

    /// Wrap previously persisted state, repairing it if it is inconsistent.
    pub fn from_state(mut state: ProgressionState, clock: Arc<dyn Clock>) -> Self {
        if repair(&mut state) {
            warn!(
                level = state.level,
                xp = state.xp,
                "repaired inconsistent progression state"
            );
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(state),
            clock,
            events,
            anchor_sequence: AtomicU64::new(0),
        }
    }

    /// Load from `store`, or start fresh if nothing has been saved yet.
    ///
    /// Blobs written before milestone payouts were tracked have no
    /// `awarded_milestones`; every milestone already reached at load time
    /// is then treated as paid.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the blob is corrupt.
    pub fn load(store: &dyn KeyValueStore, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let corrupt = |source| StorageError::Corrupt {
            key: PROGRESSION_STORAGE_KEY.to_string(),
            source,
        };
        match store.get(PROGRESSION_STORAGE_KEY)? {
            Some(blob) => {
                let value: serde_json::Value = serde_json::from_str(&blob).map_err(corrupt)?;
                let untracked = value.get("awarded_milestones").is_none();
                let mut state: ProgressionState =
                    serde_json::from_value(value).map_err(corrupt)?;
                if untracked {
                    let marked = mark_reached_as_awarded(&mut state, clock.now());
                    info!(marked, "backfilled paid milestones for untracked state");
                }
                debug!(level = state.level, xp = state.xp, "loaded progression state");
                Ok(Self::from_state(state, clock))
            }
            None => {
                info!("no stored progression, starting fresh");
                Ok(Self::new(clock))
            }
        }
    }

    /// Write the current state to `store`. Failures are returned, not retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or the store write fails.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let blob = {
            let state = self.lock();
            serde_json::to_string(&*state).map_err(|source| StorageError::Encode {
                key: PROGRESSION_STORAGE_KEY.to_string(),
                source,
            })?
        };
        store.set(PROGRESSION_STORAGE_KEY, &blob)
    }

    /// Receive every subsequent [`ProgressionEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressionEvent> {
        self.events.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ProgressionState {
        self.lock().clone()
    }

    pub fn level(&self) -> u32 {
        self.lock().level
    }

    pub fn xp(&self) -> u32 {
        self.lock().xp
    }

    pub fn xp_to_next_level(&self) -> u32 {
        self.lock().xp_to_next_level
    }

    /// 0.0 .. 1.0 progress toward the next level.
    pub fn level_progress(&self) -> f64 {
        self.lock().level_progress()
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.lock().start_date
    }

    pub fn first_use_date(&self) -> DateTime<Utc> {
        self.lock().first_use_date
    }

    pub fn sobriety_breaks(&self) -> BTreeSet<NaiveDate> {
        self.lock().sobriety_breaks.clone()
    }

    pub fn level_up_pending(&self) -> bool {
        self.lock().level_up_pending
    }

    pub fn xp_today(&self) -> u32 {
        self.lock().xp_on(self.clock.today())
    }

    /// Fractional days since the anchor date. Negative if the anchor is ahead
    /// of the clock.
    pub fn elapsed_days(&self) -> f64 {
        elapsed_days(self.lock().start_date, self.clock.now())
    }

    /// Completed days since the anchor date.
    pub fn whole_days(&self) -> u32 {
        let days = self.elapsed_days();
        if days <= 0.0 {
            0
        } else {
            days.floor() as u32
        }
    }

    /// The next milestone still ahead and when it falls due.
    pub fn next_milestone(&self) -> Option<(&'static Milestone, DateTime<Utc>)> {
        let start = self.start_date();
        let milestone = MilestoneTable::next(elapsed_days(start, self.clock.now()))?;
        Some((milestone, milestone.due_at(start)))
    }

    /// A token for the current anchor, used to schedule milestone reminders
    /// at start-up when the anchor has not changed.
    pub fn current_anchor(&self) -> AnchorChange {
        let state = self.lock();
        self.issue_anchor(&state)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Add XP, resolving as many level-ups as the amount covers.
    pub fn award_xp(&self, amount: u32) -> LevelUpResult {
        let now = self.clock.now();
        let mut state = self.lock();
        self.award_locked(&mut state, amount, now)
    }

    /// Award the fixed XP for an everyday action.
    pub fn award_action(&self, action: XpAction) -> LevelUpResult {
        debug!(action = action.description(), xp = action.xp(), "awarding action xp");
        self.award_xp(action.xp())
    }

    /// Clear the pending level-up flag. Idempotent.
    pub fn acknowledge_level_up(&self) {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.level_up_pending {
            state.level_up_pending = false;
            self.emit(ProgressionEvent::LevelUpAcknowledged {
                level: state.level,
                at: now,
            });
        }
    }

    /// Read and clear the pending level-up flag in one step.
    /// Returns `true` exactly once per batch of level-ups.
    pub fn take_level_up(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.level_up_pending);
        if pending {
            self.emit(ProgressionEvent::LevelUpAcknowledged {
                level: state.level,
                at: now,
            });
        }
        pending
    }

    /// Pay out the highest milestone crossed so far, unless it was already
    /// paid for the current anchor. Safe to call as often as you like.
    pub fn check_and_award_milestones(&self) -> Option<MilestoneAward> {
        let now = self.clock.now();
        let mut state = self.lock();

        let elapsed = elapsed_days(state.start_date, now);
        let milestone = MilestoneTable::reached(elapsed)?;
        if !state.awarded_milestones.insert(milestone.id) {
            return None;
        }

        info!(
            milestone = milestone.label,
            xp_reward = milestone.xp_reward,
            elapsed_days = elapsed,
            "milestone reached"
        );
        self.emit(ProgressionEvent::MilestoneReached {
            milestone: milestone.id,
            label: milestone.label.to_string(),
            xp_reward: milestone.xp_reward,
            at: now,
        });
        let level_up = self.award_locked(&mut state, milestone.xp_reward, now);
        Some(MilestoneAward {
            milestone,
            level_up,
        })
    }

    /// Replace the anchor date and start a fresh progression run.
    ///
    /// Only past (or present) anchors are accepted, so the reset to level 1
    /// with zero XP holds for every call that returns `Ok`. A rejected call
    /// leaves the state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AnchorInFuture`] if `new_start_date` is
    /// later than now.
    pub fn re_anchor(&self, new_start_date: DateTime<Utc>) -> Result<AnchorChange, ValidationError> {
        let now = self.clock.now();
        if new_start_date > now {
            return Err(ValidationError::AnchorInFuture {
                anchor: new_start_date,
                now,
            });
        }

        let mut state = self.lock();
        reset(&mut state, new_start_date, now.date_naive());
        state.sobriety_breaks.clear();
        let change = self.issue_anchor(&state);

        info!(
            start_date = %new_start_date,
            sequence = change.sequence(),
            "progression re-anchored"
        );
        self.emit(ProgressionEvent::ReAnchored {
            start_date: new_start_date,
            at: now,
        });
        Ok(change)
    }

    /// Record a relapse today and restart progression from now.
    ///
    /// Unlike [`re_anchor`](Self::re_anchor), break history is kept.
    pub fn record_relapse(&self) -> AnchorChange {
        let now = self.clock.now();
        let today = now.date_naive();

        let mut state = self.lock();
        state.sobriety_breaks.insert(today);
        reset(&mut state, now, today);
        let change = self.issue_anchor(&state);

        info!(date = %today, breaks = state.sobriety_breaks.len(), "relapse recorded");
        self.emit(ProgressionEvent::RelapseRecorded { date: today, at: now });
        self.emit(ProgressionEvent::ReAnchored {
            start_date: now,
            at: now,
        });
        change
    }

    // ── Internals ────────────────────────────────────────────────────

    fn award_locked(
        &self,
        state: &mut ProgressionState,
        amount: u32,
        now: DateTime<Utc>,
    ) -> LevelUpResult {
        let from_level = state.level;
        let levels_gained = apply_award(state, amount, now.date_naive());
        enforce_invariants(state);

        if amount > 0 {
            debug!(amount, xp = state.xp, level = state.level, "xp awarded");
            self.emit(ProgressionEvent::XpAwarded {
                amount,
                xp: state.xp,
                level: state.level,
                at: now,
            });
        }
        if levels_gained > 0 {
            info!(from_level, to_level = state.level, "level up");
            self.emit(ProgressionEvent::LevelUp {
                from_level,
                to_level: state.level,
                at: now,
            });
        }

        LevelUpResult {
            levels_gained,
            level: state.level,
            xp: state.xp,
        }
    }

    /// Takes the state guard so sequence order matches anchor write order.
    fn issue_anchor(&self, state: &MutexGuard<'_, ProgressionState>) -> AnchorChange {
        let sequence = self.anchor_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        AnchorChange::new(state.start_date, sequence)
    }

    fn emit(&self, event: ProgressionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ProgressionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Add `amount` to the running total and today's bucket, then resolve
/// level-ups. Returns the number of levels gained.
fn apply_award(state: &mut ProgressionState, amount: u32, today: NaiveDate) -> u32 {
    if amount == 0 {
        return 0;
    }

    let bucket = state.daily_xp.entry(today).or_insert(0);
    *bucket = bucket.saturating_add(amount);
    state.xp = state.xp.saturating_add(amount);

    let mut gained = 0;
    while state.xp >= state.xp_to_next_level {
        state.xp -= state.xp_to_next_level;
        state.level = state.level.saturating_add(1);
        state.xp_to_next_level = xp_threshold_for_level(state.level);
        gained += 1;
    }
    if gained > 0 {
        state.level_up_pending = true;
    }
    gained
}

fn reset(state: &mut ProgressionState, start_date: DateTime<Utc>, today: NaiveDate) {
    state.start_date = start_date;
    state.xp = 0;
    state.level = 1;
    state.xp_to_next_level = xp_threshold_for_level(1);
    state.daily_xp = BTreeMap::from([(today, 0)]);
    state.awarded_milestones.clear();
    state.level_up_pending = false;
}

/// `0 <= xp < xp_to_next_level` must hold after every mutation.
fn enforce_invariants(state: &mut ProgressionState) {
    let violated = state.xp >= state.xp_to_next_level;
    debug_assert!(
        !violated,
        "xp {} >= xp_to_next_level {}",
        state.xp,
        state.xp_to_next_level
    );
    if violated {
        error!(
            xp = state.xp,
            xp_to_next_level = state.xp_to_next_level,
            "progression invariant violated, clamping"
        );
        state.xp = state.xp_to_next_level.saturating_sub(1);
    }
}

/// Record every milestone reached by `now` as paid. Returns how many were
/// added.
fn mark_reached_as_awarded(state: &mut ProgressionState, now: DateTime<Utc>) -> usize {
    let elapsed = elapsed_days(state.start_date, now);
    let before = state.awarded_milestones.len();
    state.awarded_milestones.extend(
        MilestoneTable::all()
            .iter()
            .filter(|m| m.elapsed_days() <= elapsed)
            .map(|m| m.id),
    );
    state.awarded_milestones.len() - before
}

/// Bring externally loaded state back within invariants. Returns whether
/// anything changed.
fn repair(state: &mut ProgressionState) -> bool {
    let before = (state.level, state.xp, state.xp_to_next_level);

    state.level = state.level.max(1);
    state.xp_to_next_level = xp_threshold_for_level(state.level);
    while state.xp >= state.xp_to_next_level {
        state.xp -= state.xp_to_next_level;
        state.level = state.level.saturating_add(1);
        state.xp_to_next_level = xp_threshold_for_level(state.level);
    }

    before != (state.level, state.xp, state.xp_to_next_level)
}

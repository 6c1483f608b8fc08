//! Completions for the selected day.
//!
//! Toggles are optimistic. A failed remote call is never patched back
//! locally: the whole day is reloaded so the set converges on what the remote
//! holds. Loads are tagged with the date and a stamp, and responses that no
//! longer match the active request are dropped. A response that does apply is
//! overlaid with every toggle still in flight or made after the load was issued.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dates::normalize;
use crate::errors::StoreError;
use crate::models::Completion;
use crate::remote::RemoteStore;

/// Platform feedback requested after a toggle has been applied locally.
pub trait Haptics: Send + Sync {
    fn pulse(&self);
}

pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionSnapshot {
    /// Day the set belongs to. `None` until the first load.
    pub date: Option<NaiveDate>,
    pub completions: Vec<Completion>,
    /// Habit ids with a toggle in flight.
    pub pending: BTreeSet<String>,
    pub loading: bool,
    pub last_error: Option<String>,
    /// Bumped by every load and every applied toggle.
    stamp: u64,
    latest_load: u64,
    /// Target state and stamp of toggles a pending load may not have seen.
    toggled: BTreeMap<String, (u64, bool)>,
}

impl CompletionSnapshot {
    pub fn is_done(&self, habit_id: &str) -> bool {
        self.completions
            .iter()
            .any(|completion| completion.habit_id == habit_id)
    }

    fn set_done(&mut self, owner_id: &str, habit_id: &str, done: bool) {
        let Some(date) = self.date else {
            return;
        };
        if done == self.is_done(habit_id) {
            return;
        }
        if done {
            self.completions.push(Completion {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.to_string(),
                habit_id: habit_id.to_string(),
                date,
            });
        } else {
            self.completions
                .retain(|completion| completion.habit_id != habit_id);
        }
    }
}

pub struct CompletionStore {
    remote: Arc<dyn RemoteStore>,
    owner_id: String,
    haptics: Arc<dyn Haptics>,
    state: watch::Sender<CompletionSnapshot>,
}

impl CompletionStore {
    pub fn new(remote: Arc<dyn RemoteStore>, owner_id: impl Into<String>) -> Self {
        Self::with_haptics(remote, owner_id, Arc::new(NoHaptics))
    }

    pub fn with_haptics(
        remote: Arc<dyn RemoteStore>,
        owner_id: impl Into<String>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        let (state, _) = watch::channel(CompletionSnapshot::default());
        Self {
            remote,
            owner_id: owner_id.into(),
            haptics,
            state,
        }
    }

    pub fn snapshot(&self) -> CompletionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CompletionSnapshot> {
        self.state.subscribe()
    }

    pub fn active_date(&self) -> Option<NaiveDate> {
        self.state.borrow().date
    }

    pub fn is_done(&self, habit_id: &str) -> bool {
        self.state.borrow().is_done(habit_id)
    }

    pub fn is_pending(&self, habit_id: &str) -> bool {
        self.state.borrow().pending.contains(habit_id)
    }

    /// Makes `date` the active day and replaces the set with its completions.
    /// A response that arrives after a newer load was issued is discarded.
    pub async fn load_for_date(&self, date: NaiveDate) -> Result<(), StoreError> {
        let mut stamp = 0;
        self.state.send_modify(|state| {
            if state.date != Some(date) {
                state.completions.clear();
                state.pending.clear();
                state.toggled.clear();
                state.date = Some(date);
            }
            state.stamp += 1;
            state.latest_load = state.stamp;
            stamp = state.stamp;
            state.loading = true;
        });

        let result = self.remote.list_completions(&self.owner_id, date).await;

        let mut applied = false;
        self.state.send_if_modified(|state| {
            if state.date != Some(date) || state.latest_load != stamp {
                return false;
            }
            applied = true;
            state.loading = false;
            match &result {
                Ok(completions) => {
                    state.completions = completions.clone();
                    let toggled = std::mem::take(&mut state.toggled);
                    for (habit_id, (toggled_at, done)) in toggled {
                        let in_flight = state.pending.contains(&habit_id);
                        if in_flight || toggled_at > stamp {
                            state.set_done(&self.owner_id, &habit_id, done);
                        }
                        if in_flight {
                            state.toggled.insert(habit_id, (toggled_at, done));
                        }
                    }
                    state.last_error = None;
                }
                Err(err) => state.last_error = Some(err.to_string()),
            }
            true
        });

        if !applied {
            debug!(date = %normalize(date), "discarding stale completions response");
            return Ok(());
        }
        result.map(|_| ())
    }

    /// Read-only fetch for statistics. Leaves the toggle set alone.
    pub async fn load_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        if start > end {
            return Err(StoreError::validation(format!(
                "range start {} is after end {}",
                normalize(start),
                normalize(end)
            )));
        }
        self.remote
            .list_completions_in_range(&self.owner_id, start, end)
            .await
    }

    /// Flips the membership of `habit_id` on `date` and returns the new state.
    pub async fn toggle(&self, habit_id: &str, date: NaiveDate) -> Result<bool, StoreError> {
        let mut outcome = Ok(false);
        self.state.send_if_modified(|state| {
            if state.date != Some(date) {
                outcome = Err(StoreError::validation(format!(
                    "completions for {} are not loaded",
                    normalize(date)
                )));
                return false;
            }
            if !state.pending.insert(habit_id.to_string()) {
                outcome = Err(StoreError::Busy(habit_id.to_string()));
                return false;
            }
            let done = !state.is_done(habit_id);
            state.set_done(&self.owner_id, habit_id, done);
            state.stamp += 1;
            state.toggled.insert(habit_id.to_string(), (state.stamp, done));
            outcome = Ok(done);
            true
        });
        let marked = outcome?;
        self.haptics.pulse();

        let result = if marked {
            self.remote
                .insert_completion(&self.owner_id, habit_id, date)
                .await
        } else {
            self.remote
                .delete_completion(&self.owner_id, habit_id, date)
                .await
        };

        self.state.send_modify(|state| {
            if state.date == Some(date) {
                state.pending.remove(habit_id);
            }
        });

        match result {
            Ok(()) => {
                info!(habit = habit_id, date = %normalize(date), marked, "completion toggled");
                Ok(marked)
            }
            Err(err) => {
                warn!(habit = habit_id, date = %normalize(date), "toggle failed, reloading day: {err}");
                self.state.send_modify(|state| {
                    if state.date == Some(date) {
                        state.toggled.remove(habit_id);
                    }
                    state.last_error = Some(err.to_string());
                });
                if self.active_date() == Some(date) {
                    if let Err(reload_err) = self.load_for_date(date).await {
                        warn!("reload after failed toggle also failed: {reload_err}");
                    }
                }
                Err(err)
            }
        }
    }

    /// Drops every completion of `habit_id` from the loaded day. Used when the
    /// habit itself is removed.
    pub fn forget_habit(&self, habit_id: &str) {
        self.state.send_if_modified(|state| {
            let before = state.completions.len();
            state
                .completions
                .retain(|completion| completion.habit_id != habit_id);
            let forgot_toggle = state.toggled.remove(habit_id).is_some();
            forgot_toggle || before != state.completions.len()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::scripted::{settle_until, Call, ScriptedRemote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[derive(Default)]
    struct CountingHaptics(AtomicUsize);

    impl Haptics for CountingHaptics {
        fn pulse(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn store_on(date: NaiveDate) -> (Arc<ScriptedRemote>, CompletionStore) {
        let remote = Arc::new(ScriptedRemote::new("alice"));
        remote.seed_habit("a", "Read", 0).await;
        remote.seed_habit("b", "Run", 1).await;
        let store = CompletionStore::new(remote.clone(), "alice");
        store.load_for_date(date).await.unwrap();
        (remote, store)
    }

    async fn remote_count(remote: &ScriptedRemote, habit_id: &str, date: NaiveDate) -> usize {
        remote
            .data()
            .lock()
            .await
            .list_completions("alice", date)
            .iter()
            .filter(|completion| completion.habit_id == habit_id)
            .count()
    }

    #[tokio::test]
    async fn toggle_marks_immediately_before_remote_resolves() {
        let (remote, store) = store_on(day(1)).await;
        let gate = remote.hold_next(Call::InsertCompletion("a".into()));

        let (marked, ()) = tokio::join!(store.toggle("a", day(1)), async {
            settle_until(|| store.is_pending("a")).await;
            assert!(store.is_done("a"));
            assert_eq!(remote_count(&remote, "a", day(1)).await, 0);
            gate.notify_one();
        });

        assert!(marked.unwrap());
        assert!(store.is_done("a"));
        assert!(!store.is_pending("a"));
        assert_eq!(remote_count(&remote, "a", day(1)).await, 1);
    }

    #[tokio::test]
    async fn toggle_twice_restores_membership() {
        let (remote, store) = store_on(day(1)).await;

        assert!(store.toggle("a", day(1)).await.unwrap());
        assert!(!store.toggle("a", day(1)).await.unwrap());
        assert!(!store.is_done("a"));
        assert_eq!(remote_count(&remote, "a", day(1)).await, 0);
    }

    #[tokio::test]
    async fn double_invoke_while_pending_inserts_once() {
        let (remote, store) = store_on(day(1)).await;
        let gate = remote.hold_next(Call::InsertCompletion("a".into()));

        let (first, second) = tokio::join!(store.toggle("a", day(1)), async {
            settle_until(|| store.is_pending("a")).await;
            let second = store.toggle("a", day(1)).await;
            gate.notify_one();
            second
        });

        assert!(first.unwrap());
        assert_eq!(second.unwrap_err(), StoreError::Busy("a".into()));
        assert_eq!(remote_count(&remote, "a", day(1)).await, 1);
    }

    #[tokio::test]
    async fn failed_toggle_reloads_the_day_from_the_remote() {
        let (remote, store) = store_on(day(1)).await;
        remote.seed_completion("b", day(1)).await;
        remote.fail_next(
            Call::InsertCompletion("a".into()),
            StoreError::Fetch("offline".into()),
        );

        let err = store.toggle("a", day(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Fetch(_)));
        assert!(!store.is_done("a"));
        assert!(store.is_done("b"));
        assert_eq!(remote.count(&Call::ListCompletions(day(1))), 2);
    }

    #[tokio::test]
    async fn haptics_fire_on_applied_toggles_only() {
        let remote = Arc::new(ScriptedRemote::new("alice"));
        remote.seed_habit("a", "Read", 0).await;
        let haptics = Arc::new(CountingHaptics::default());
        let store = CompletionStore::with_haptics(remote.clone(), "alice", haptics.clone());

        assert!(store.toggle("a", day(1)).await.is_err());
        assert_eq!(haptics.0.load(Ordering::SeqCst), 0);

        store.load_for_date(day(1)).await.unwrap();
        store.toggle("a", day(1)).await.unwrap();
        assert_eq!(haptics.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn late_response_for_previous_date_is_discarded() {
        let (remote, store) = store_on(day(3)).await;
        remote.seed_completion("a", day(1)).await;
        remote.seed_completion("b", day(2)).await;
        let gate = remote.hold_next(Call::ListCompletions(day(1)));

        let (first, second) = tokio::join!(store.load_for_date(day(1)), async {
            settle_until(|| store.active_date() == Some(day(1))).await;
            let second = store.load_for_date(day(2)).await;
            gate.notify_one();
            second
        });

        first.unwrap();
        second.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.date, Some(day(2)));
        assert!(snapshot.is_done("b"));
        assert!(!snapshot.is_done("a"));
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn refresh_read_before_a_confirmed_toggle_keeps_the_toggle() {
        let (remote, store) = store_on(day(1)).await;
        let gate = remote.hold_response(Call::ListCompletions(day(1)));

        let (refreshed, marked) = tokio::join!(store.load_for_date(day(1)), async {
            settle_until(|| remote.is_parked(&Call::ListCompletions(day(1)))).await;
            let marked = store.toggle("a", day(1)).await;
            gate.notify_one();
            marked
        });

        refreshed.unwrap();
        assert!(marked.unwrap());
        assert_eq!(remote_count(&remote, "a", day(1)).await, 1);
        assert!(store.is_done("a"));
        assert!(!store.snapshot().loading);
    }

    #[tokio::test]
    async fn load_keeps_the_target_of_a_toggle_in_flight() {
        let (remote, store) = store_on(day(1)).await;
        let gate = remote.hold_next(Call::InsertCompletion("a".into()));

        let (marked, ()) = tokio::join!(store.toggle("a", day(1)), async {
            settle_until(|| store.is_pending("a")).await;
            store.load_for_date(day(1)).await.unwrap();
            assert!(store.is_done("a"));
            gate.notify_one();
        });

        assert!(marked.unwrap());
        store.load_for_date(day(1)).await.unwrap();
        assert!(store.is_done("a"));
        assert_eq!(remote_count(&remote, "a", day(1)).await, 1);
    }

    #[tokio::test]
    async fn range_load_does_not_touch_the_day() {
        let (remote, store) = store_on(day(1)).await;
        remote.seed_completion("a", day(2)).await;
        remote.seed_completion("b", day(5)).await;

        let completions = store.load_for_range(day(1), day(7)).await.unwrap();
        assert_eq!(completions.len(), 2);
        assert!(!store.is_done("a"));
        assert!(matches!(
            store.load_for_range(day(7), day(1)).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn forget_habit_drops_its_completions() {
        let (remote, store) = store_on(day(1)).await;
        remote.seed_completion("a", day(1)).await;
        remote.seed_completion("b", day(1)).await;
        store.load_for_date(day(1)).await.unwrap();

        store.forget_habit("a");
        assert!(!store.is_done("a"));
        assert!(store.is_done("b"));
    }
}

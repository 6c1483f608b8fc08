//! One owner's tracker session: the habit list, the selected day and its
//! completions, wired together the way the screens use them.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::completions::{CompletionStore, Haptics, NoHaptics};
use crate::dates::{normalize, today, DateCursor};
use crate::errors::StoreError;
use crate::habits::{HabitListStore, PendingOp};
use crate::models::{Habit, StatsResponse};
use crate::remote::RemoteStore;
use crate::reorder;
use crate::stats::{build_stats_at, can_navigate_next, range_for, shift, StatsView};

/// Callbacks delivered by the gesture layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Next day.
    SwipeLeft,
    /// Previous day.
    SwipeRight,
    PullToRefresh,
}

pub struct Tracker {
    habits: HabitListStore,
    completions: CompletionStore,
    cursor: watch::Sender<DateCursor>,
}

impl Tracker {
    pub fn new(remote: Arc<dyn RemoteStore>, owner_id: impl Into<String>) -> Self {
        Self::with_haptics(remote, owner_id, Arc::new(NoHaptics))
    }

    pub fn with_haptics(
        remote: Arc<dyn RemoteStore>,
        owner_id: impl Into<String>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        Self::starting_at(remote, owner_id, haptics, today())
    }

    pub fn starting_at(
        remote: Arc<dyn RemoteStore>,
        owner_id: impl Into<String>,
        haptics: Arc<dyn Haptics>,
        selected: NaiveDate,
    ) -> Self {
        let owner_id = owner_id.into();
        let (cursor, _) = watch::channel(DateCursor::starting_at(selected));
        Self {
            habits: HabitListStore::new(Arc::clone(&remote), owner_id.clone()),
            completions: CompletionStore::with_haptics(remote, owner_id, haptics),
            cursor,
        }
    }

    pub fn habit_store(&self) -> &HabitListStore {
        &self.habits
    }

    pub fn completion_store(&self) -> &CompletionStore {
        &self.completions
    }

    pub fn subscribe_date(&self) -> watch::Receiver<DateCursor> {
        self.cursor.subscribe()
    }

    /// Loads the habit list and the selected day.
    pub async fn open(&self) -> Result<(), StoreError> {
        self.habits.load().await?;
        self.completions.load_for_date(self.selected_date()).await
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.habits.habits()
    }

    pub fn is_habit_done(&self, habit_id: &str) -> bool {
        self.completions.is_done(habit_id)
    }

    /// True while any mutation touching `id` is in flight.
    pub fn is_pending(&self, id: &str) -> bool {
        self.habits.pending(id).is_some() || self.completions.is_pending(id)
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.cursor.borrow().selected()
    }

    pub async fn add_habit(&self, name: &str) -> Result<Habit, StoreError> {
        self.habits.add(name).await
    }

    pub async fn rename_habit(&self, id: &str, name: &str) -> Result<Habit, StoreError> {
        self.habits.rename(id, name).await
    }

    /// Removes the habit and, optimistically, its completions on the loaded day.
    pub async fn remove_habit(&self, id: &str) -> Result<(), StoreError> {
        if self.habits.snapshot().get(id).is_none() {
            return Err(StoreError::not_found(format!("habit {id}")));
        }
        if self.habits.pending(id).is_some() || self.completions.is_pending(id) {
            return Err(StoreError::Busy(id.to_string()));
        }
        self.completions.forget_habit(id);

        let result = self.habits.remove(id).await;
        if result.is_err() {
            if let Some(date) = self.completions.active_date() {
                if let Err(err) = self.completions.load_for_date(date).await {
                    warn!(id, "could not restore completions after failed removal: {err}");
                }
            }
        }
        result
    }

    pub async fn reorder_habits(&self, new_order: &[String]) -> Result<(), StoreError> {
        self.habits.reorder(new_order).await
    }

    /// Drag-and-drop move of the habit at `from` to `to`.
    pub async fn move_habit(&self, from: usize, to: usize) -> Result<(), StoreError> {
        let order = reorder::move_item(&self.habits.snapshot().ids(), from, to)?;
        self.habits.reorder(&order).await
    }

    /// Drops `dragged` onto the row currently held by `target`.
    pub async fn drop_habit_onto(&self, dragged: &str, target: &str) -> Result<(), StoreError> {
        let order = reorder::move_onto(&self.habits.snapshot().ids(), dragged, target)?;
        self.habits.reorder(&order).await
    }

    /// Toggles `habit_id` on the selected day and returns the new state.
    pub async fn toggle_habit(&self, habit_id: &str) -> Result<bool, StoreError> {
        if self.habits.pending(habit_id) == Some(PendingOp::Adding) {
            return Err(StoreError::Busy(habit_id.to_string()));
        }
        if self.habits.snapshot().get(habit_id).is_none() {
            return Err(StoreError::not_found(format!("habit {habit_id}")));
        }
        self.completions
            .toggle(habit_id, self.selected_date())
            .await
    }

    pub async fn go_to_date(&self, date: NaiveDate) -> Result<bool, StoreError> {
        self.go_to_date_at(date, today()).await
    }

    pub async fn go_to_date_at(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        if date > today {
            return Err(StoreError::validation(format!(
                "{} is in the future",
                normalize(date)
            )));
        }
        let moved = self.cursor.send_if_modified(|cursor| cursor.go_to_at(date, today));
        self.after_move(moved).await
    }

    pub async fn step_date(&self, delta_days: i64) -> Result<bool, StoreError> {
        self.step_date_at(delta_days, today()).await
    }

    /// Returns false without loading when the step would pass `today`.
    pub async fn step_date_at(
        &self,
        delta_days: i64,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        let moved = self
            .cursor
            .send_if_modified(|cursor| cursor.step_at(delta_days, today));
        self.after_move(moved).await
    }

    async fn after_move(&self, moved: bool) -> Result<bool, StoreError> {
        if !moved {
            return Ok(false);
        }
        let date = self.selected_date();
        debug!(date = %normalize(date), "selected date changed");
        self.completions.load_for_date(date).await?;
        Ok(true)
    }

    /// Pull-to-refresh: reloads the habit list and the selected day.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.open().await
    }

    pub async fn handle_gesture(&self, gesture: Gesture) -> Result<(), StoreError> {
        self.handle_gesture_at(gesture, today()).await
    }

    pub async fn handle_gesture_at(
        &self,
        gesture: Gesture,
        today: NaiveDate,
    ) -> Result<(), StoreError> {
        match gesture {
            Gesture::SwipeLeft => self.step_date_at(1, today).await.map(|_| ()),
            Gesture::SwipeRight => self.step_date_at(-1, today).await.map(|_| ()),
            Gesture::PullToRefresh => self.refresh().await,
        }
    }

    pub async fn load_stats(
        &self,
        view: StatsView,
        anchor: NaiveDate,
    ) -> Result<StatsResponse, StoreError> {
        self.load_stats_at(view, anchor, today()).await
    }

    pub async fn step_stats(
        &self,
        view: StatsView,
        anchor: NaiveDate,
        steps: i32,
    ) -> Result<StatsResponse, StoreError> {
        self.step_stats_at(view, anchor, steps, today()).await
    }

    /// Previous (negative `steps`) or next stats page relative to `anchor`.
    /// Moving forward is refused once the current range reaches `today`.
    pub async fn step_stats_at(
        &self,
        view: StatsView,
        anchor: NaiveDate,
        steps: i32,
        today: NaiveDate,
    ) -> Result<StatsResponse, StoreError> {
        if steps > 0 && !can_navigate_next(view, anchor, today) {
            return Err(StoreError::validation(format!(
                "no stats after {}",
                normalize(range_for(view, anchor).end)
            )));
        }
        self.load_stats_at(view, shift(view, anchor, steps), today)
            .await
    }

    /// Completion counts per confirmed habit over the week or month around `anchor`.
    pub async fn load_stats_at(
        &self,
        view: StatsView,
        anchor: NaiveDate,
        today: NaiveDate,
    ) -> Result<StatsResponse, StoreError> {
        let range = range_for(view, anchor);
        let completions = self.completions.load_for_range(range.start, range.end).await?;
        let snapshot = self.habits.snapshot();
        let habits: Vec<Habit> = snapshot
            .habits
            .into_iter()
            .filter(|habit| snapshot.pending.get(&habit.id) != Some(&PendingOp::Adding))
            .collect();
        Ok(build_stats_at(today, view, anchor, &habits, &completions))
    }
}

//! Optimistic habit list.
//!
//! Every mutation is applied to the local list first, then sent to the
//! remote. A confirmed result replaces the optimistic one; a failed call undoes
//! only its own change, leaving concurrent edits to other habits in place. At
//! most one mutation may be in flight per habit id.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::Habit;
use crate::remote::RemoteStore;

/// Id prefix of habits that exist only locally, waiting for the remote insert.
pub const PROVISIONAL_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Adding,
    Renaming,
    Deleting,
    Reordering,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitListSnapshot {
    /// Display order, ascending by sort order.
    pub habits: Vec<Habit>,
    pub pending: BTreeMap<String, PendingOp>,
    /// Text of the "new habit" input as the caller should show it.
    pub draft: String,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl HabitListSnapshot {
    pub fn get(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.habits.iter().map(|habit| habit.id.clone()).collect()
    }
}

fn sort_habits(habits: &mut [Habit]) {
    habits.sort_by_key(|habit| (habit.sort_order, habit.created_at));
}

pub struct HabitListStore {
    remote: Arc<dyn RemoteStore>,
    owner_id: String,
    state: watch::Sender<HabitListSnapshot>,
}

impl HabitListStore {
    pub fn new(remote: Arc<dyn RemoteStore>, owner_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(HabitListSnapshot::default());
        Self {
            remote,
            owner_id: owner_id.into(),
            state,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn snapshot(&self) -> HabitListSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HabitListSnapshot> {
        self.state.subscribe()
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.state.borrow().habits.clone()
    }

    pub fn pending(&self, id: &str) -> Option<PendingOp> {
        self.state.borrow().pending.get(id).copied()
    }

    pub fn draft(&self) -> String {
        self.state.borrow().draft.clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|state| state.draft = text);
    }

    /// Replaces the list with the owner's habits from the remote. On failure
    /// the current list is kept.
    pub async fn load(&self) -> Result<(), StoreError> {
        self.state.send_modify(|state| state.loading = true);
        match self.remote.list_habits(&self.owner_id).await {
            Ok(mut habits) => {
                sort_habits(&mut habits);
                self.state.send_modify(|state| {
                    state.habits = habits;
                    state.loading = false;
                    state.last_error = None;
                });
                Ok(())
            }
            Err(err) => {
                warn!(owner = %self.owner_id, "failed to load habits: {err}");
                self.fail(&err, |state| state.loading = false);
                Err(err)
            }
        }
    }

    pub async fn add(&self, name: &str) -> Result<Habit, StoreError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation("habit name cannot be empty"));
        }

        let provisional_id = format!("{PROVISIONAL_PREFIX}{}", Uuid::new_v4());
        self.state.send_modify(|state| {
            let sort_order = state
                .habits
                .iter()
                .map(|habit| habit.sort_order)
                .max()
                .map_or(0, |max| max + 1);
            state.habits.push(Habit {
                id: provisional_id.clone(),
                owner_id: self.owner_id.clone(),
                name: name.clone(),
                sort_order,
                created_at: Utc::now(),
            });
            sort_habits(&mut state.habits);
            state.pending.insert(provisional_id.clone(), PendingOp::Adding);
            state.draft.clear();
        });

        match self.insert_remote(&name).await {
            Ok(habit) => {
                info!(owner = %self.owner_id, id = %habit.id, "habit added");
                self.state.send_modify(|state| {
                    state.pending.remove(&provisional_id);
                    // A reload while the insert was in flight may have dropped the
                    // provisional entry or already brought in the confirmed one.
                    if let Some(slot) = state.habits.iter_mut().find(|h| h.id == provisional_id) {
                        *slot = habit.clone();
                    } else if state.get(&habit.id).is_none() {
                        state.habits.push(habit.clone());
                    }
                    sort_habits(&mut state.habits);
                    state.last_error = None;
                });
                Ok(habit)
            }
            Err(err) => {
                warn!(owner = %self.owner_id, "rolling back habit add: {err}");
                self.fail(&err, |state| {
                    state.pending.remove(&provisional_id);
                    state.habits.retain(|habit| habit.id != provisional_id);
                    state.draft = name.clone();
                });
                Err(err)
            }
        }
    }

    async fn insert_remote(&self, name: &str) -> Result<Habit, StoreError> {
        let sort_order = self
            .remote
            .max_sort_order(&self.owner_id)
            .await?
            .map_or(0, |max| max + 1);
        self.remote
            .insert_habit(&self.owner_id, name, sort_order)
            .await
    }

    pub async fn rename(&self, id: &str, new_name: &str) -> Result<Habit, StoreError> {
        let new_name = new_name.trim().to_string();
        if new_name.is_empty() {
            return Err(StoreError::validation("habit name cannot be empty"));
        }

        let mut previous = None;
        self.claim(&[id.to_string()], PendingOp::Renaming, |state| {
            if let Some(habit) = state.habits.iter_mut().find(|habit| habit.id == id) {
                previous = Some(std::mem::replace(&mut habit.name, new_name.clone()));
            }
        })?;
        let Some(previous) = previous else {
            self.release(&[id.to_string()]);
            return Err(StoreError::not_found(format!("habit {id}")));
        };

        match self
            .remote
            .update_habit_name(id, &self.owner_id, &new_name)
            .await
        {
            Ok(confirmed) => {
                info!(owner = %self.owner_id, id, "habit renamed");
                self.state.send_modify(|state| {
                    state.pending.remove(id);
                    if let Some(habit) = state.habits.iter_mut().find(|habit| habit.id == id) {
                        *habit = confirmed.clone();
                    }
                    sort_habits(&mut state.habits);
                    state.last_error = None;
                });
                Ok(confirmed)
            }
            Err(err) => {
                warn!(owner = %self.owner_id, id, "rolling back habit rename: {err}");
                self.fail(&err, |state| {
                    state.pending.remove(id);
                    if let Some(habit) = state.habits.iter_mut().find(|habit| habit.id == id) {
                        habit.name = previous.clone();
                    }
                });
                self.reload_if_vanished(&err).await;
                Err(err)
            }
        }
    }

    pub async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut removed = None;
        self.claim(&[id.to_string()], PendingOp::Deleting, |state| {
            if let Some(index) = state.habits.iter().position(|habit| habit.id == id) {
                removed = Some((index, state.habits.remove(index)));
            }
        })?;
        let Some((index, habit)) = removed else {
            self.release(&[id.to_string()]);
            return Err(StoreError::not_found(format!("habit {id}")));
        };

        match self.remote.delete_habit(id, &self.owner_id).await {
            Ok(()) => {
                info!(owner = %self.owner_id, id, "habit removed");
                self.state.send_modify(|state| {
                    state.pending.remove(id);
                    state.last_error = None;
                });
                Ok(())
            }
            Err(err) => {
                warn!(owner = %self.owner_id, id, "rolling back habit removal: {err}");
                // Other habits may have changed meanwhile; only the removed
                // entry goes back.
                self.fail(&err, |state| {
                    state.pending.remove(id);
                    if state.get(id).is_none() {
                        let index = index.min(state.habits.len());
                        state.habits.insert(index, habit);
                        sort_habits(&mut state.habits);
                    }
                });
                self.reload_if_vanished(&err).await;
                Err(err)
            }
        }
    }

    /// Rewrites sort orders to match `new_order`, which must be a permutation
    /// of the current ids. All-or-nothing from the caller's side: the first
    /// failing remote update restores the previous order.
    pub async fn reorder(&self, new_order: &[String]) -> Result<(), StoreError> {
        let current: HashSet<String> = self.state.borrow().ids().into_iter().collect();
        let requested: HashSet<String> = new_order.iter().cloned().collect();
        if requested.len() != new_order.len() || requested != current {
            return Err(StoreError::validation(
                "reorder must list every current habit exactly once",
            ));
        }

        let mut previous: HashMap<String, i64> = HashMap::new();
        self.claim(new_order, PendingOp::Reordering, |state| {
            for habit in &mut state.habits {
                if let Some(index) = new_order.iter().position(|id| *id == habit.id) {
                    previous.insert(habit.id.clone(), habit.sort_order);
                    habit.sort_order = index as i64;
                }
            }
            sort_habits(&mut state.habits);
        })?;

        for (id, sort_order) in new_order.iter().zip(0_i64..) {
            if let Err(source) = self
                .remote
                .update_habit_sort_order(id, &self.owner_id, sort_order)
                .await
            {
                let err = StoreError::Reorder {
                    id: id.clone(),
                    source: Box::new(source),
                };
                warn!(owner = %self.owner_id, "rolling back reorder: {err}");
                // Habits added meanwhile keep their place.
                self.fail(&err, |state| {
                    for habit in &mut state.habits {
                        if let Some(sort_order) = previous.get(&habit.id) {
                            habit.sort_order = *sort_order;
                        }
                    }
                    sort_habits(&mut state.habits);
                });
                self.release(new_order);
                self.reload_if_vanished(&err).await;
                return Err(err);
            }
        }

        info!(owner = %self.owner_id, count = new_order.len(), "habits reordered");
        self.state.send_modify(|state| state.last_error = None);
        self.release(new_order);
        Ok(())
    }

    /// Marks `ids` pending and applies `apply` in one step, or fails with
    /// `Busy` if any of them already has a mutation in flight.
    fn claim(
        &self,
        ids: &[String],
        op: PendingOp,
        apply: impl FnOnce(&mut HabitListSnapshot),
    ) -> Result<(), StoreError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if let Some(busy) = ids.iter().find(|id| state.pending.contains_key(*id)) {
                outcome = Err(StoreError::Busy(busy.clone()));
                return false;
            }
            for id in ids {
                state.pending.insert(id.clone(), op);
            }
            apply(state);
            true
        });
        outcome
    }

    fn release(&self, ids: &[String]) {
        self.state.send_modify(|state| {
            for id in ids {
                state.pending.remove(id);
            }
        });
    }

    fn fail(&self, err: &StoreError, rollback: impl FnOnce(&mut HabitListSnapshot)) {
        self.state.send_modify(|state| {
            rollback(state);
            state.last_error = Some(err.to_string());
        });
    }

    async fn reload_if_vanished(&self, err: &StoreError) {
        if !err.is_not_found() {
            return;
        }
        warn!(owner = %self.owner_id, "habit vanished remotely, reloading list");
        if let Err(reload_err) = self.load().await {
            warn!(owner = %self.owner_id, "forced reload failed: {reload_err}");
        }
    }
}

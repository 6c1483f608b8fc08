use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::stats::StatsView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Marks `habit_id` as done on `date`. At most one per (owner, habit, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: String,
    pub owner_id: String,
    pub habit_id: String,
    pub date: NaiveDate,
}

impl Completion {
    pub fn matches(&self, owner_id: &str, habit_id: &str, date: NaiveDate) -> bool {
        self.owner_id == owner_id && self.habit_id == habit_id && self.date == date
    }
}

/// Everything the remote store persists, for every owner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    pub habits: BTreeMap<String, Habit>,
    pub completions: Vec<Completion>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewHabitRequest {
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameHabitRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SortOrderRequest {
    pub sort_order: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaxSortOrderResponse {
    pub sort_order: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub habit_id: String,
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub view: StatsView,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitStat {
    pub id: String,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub view: StatsView,
    pub label: String,
    pub start_date: String,
    pub end_date: String,
    pub can_navigate_next: bool,
    pub habits: Vec<HabitStat>,
}

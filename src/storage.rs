use crate::errors::{AppError, StoreError};
use crate::models::{AppData, Completion, Habit};
use chrono::{NaiveDate, Utc};
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::error;
use uuid::Uuid;

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/state.json"))
}

pub async fn load_data(path: &Path) -> AppData {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                AppData::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => AppData::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            AppData::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &AppData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    fs::write(path, payload).await.map_err(AppError::internal)?;
    Ok(())
}

fn clean_name(name: &str) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::validation("habit name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Owner-scoped record rules. Every call is already on behalf of `owner_id`;
/// touching a habit that belongs to someone else is an authorization failure.
impl AppData {
    pub fn list_habits(&self, owner_id: &str) -> Vec<Habit> {
        let mut habits: Vec<Habit> = self
            .habits
            .values()
            .filter(|habit| habit.owner_id == owner_id)
            .cloned()
            .collect();
        habits.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        habits
    }

    pub fn max_sort_order(&self, owner_id: &str) -> Option<i64> {
        self.habits
            .values()
            .filter(|habit| habit.owner_id == owner_id)
            .map(|habit| habit.sort_order)
            .max()
    }

    pub fn insert_habit(
        &mut self,
        owner_id: &str,
        name: &str,
        sort_order: i64,
    ) -> Result<Habit, StoreError> {
        let habit = Habit {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: clean_name(name)?,
            sort_order,
            created_at: Utc::now(),
        };
        self.habits.insert(habit.id.clone(), habit.clone());
        Ok(habit)
    }

    pub fn update_habit_name(
        &mut self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Habit, StoreError> {
        let name = clean_name(name)?;
        let habit = self.owned_habit_mut(id, owner_id)?;
        habit.name = name;
        Ok(habit.clone())
    }

    pub fn update_habit_sort_order(
        &mut self,
        id: &str,
        owner_id: &str,
        sort_order: i64,
    ) -> Result<(), StoreError> {
        self.owned_habit_mut(id, owner_id)?.sort_order = sort_order;
        Ok(())
    }

    /// Removes the habit and every completion recorded against it.
    pub fn delete_habit(&mut self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        self.owned_habit_mut(id, owner_id)?;
        self.habits.remove(id);
        self.completions
            .retain(|completion| !(completion.owner_id == owner_id && completion.habit_id == id));
        Ok(())
    }

    pub fn list_completions(&self, owner_id: &str, date: NaiveDate) -> Vec<Completion> {
        self.completions
            .iter()
            .filter(|completion| completion.owner_id == owner_id && completion.date == date)
            .cloned()
            .collect()
    }

    pub fn list_completions_in_range(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        if start > end {
            return Err(StoreError::validation(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(self
            .completions
            .iter()
            .filter(|completion| {
                completion.owner_id == owner_id && completion.date >= start && completion.date <= end
            })
            .cloned()
            .collect())
    }

    /// Idempotent: an existing (owner, habit, date) completion is left alone.
    pub fn insert_completion(
        &mut self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.owned_habit_mut(habit_id, owner_id)?;
        if self
            .completions
            .iter()
            .any(|completion| completion.matches(owner_id, habit_id, date))
        {
            return Ok(());
        }
        self.completions.push(Completion {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            habit_id: habit_id.to_string(),
            date,
        });
        Ok(())
    }

    pub fn delete_completion(
        &mut self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        self.completions
            .retain(|completion| !completion.matches(owner_id, habit_id, date));
        Ok(())
    }

    fn owned_habit_mut(&mut self, id: &str, owner_id: &str) -> Result<&mut Habit, StoreError> {
        let habit = self
            .habits
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("habit {id}")))?;
        if habit.owner_id != owner_id {
            return Err(StoreError::Authorization(format!(
                "habit {id} belongs to another owner"
            )));
        }
        Ok(habit)
    }
}

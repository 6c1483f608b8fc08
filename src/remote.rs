use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::StoreError;
use crate::models::{AppData, Completion, Habit};

/// Capability set of the remote data store. The remote is the source of truth;
/// every call is scoped to the owner it is made for.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Habits of `owner_id`, ascending by sort order.
    async fn list_habits(&self, owner_id: &str) -> Result<Vec<Habit>, StoreError>;

    async fn max_sort_order(&self, owner_id: &str) -> Result<Option<i64>, StoreError> {
        let habits = self.list_habits(owner_id).await?;
        Ok(habits.iter().map(|habit| habit.sort_order).max())
    }

    async fn insert_habit(
        &self,
        owner_id: &str,
        name: &str,
        sort_order: i64,
    ) -> Result<Habit, StoreError>;

    async fn update_habit_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Habit, StoreError>;

    async fn update_habit_sort_order(
        &self,
        id: &str,
        owner_id: &str,
        sort_order: i64,
    ) -> Result<(), StoreError>;

    async fn delete_habit(&self, id: &str, owner_id: &str) -> Result<(), StoreError>;

    async fn list_completions(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError>;

    /// Inclusive on both ends.
    async fn list_completions_in_range(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError>;

    async fn insert_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError>;

    async fn delete_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError>;
}

pub(crate) fn authorize(session_owner: &str, owner_id: &str) -> Result<(), StoreError> {
    if session_owner != owner_id {
        return Err(StoreError::Authorization(format!(
            "session of {session_owner} cannot act for {owner_id}"
        )));
    }
    Ok(())
}

/// In-process remote backed by shared [`AppData`], bound to one session owner.
#[derive(Clone)]
pub struct MemoryRemote {
    data: Arc<Mutex<AppData>>,
    owner_id: String,
}

impl MemoryRemote {
    pub fn new(data: Arc<Mutex<AppData>>, owner_id: impl Into<String>) -> Self {
        Self {
            data,
            owner_id: owner_id.into(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn data(&self) -> Arc<Mutex<AppData>> {
        Arc::clone(&self.data)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_habits(&self, owner_id: &str) -> Result<Vec<Habit>, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        Ok(self.data.lock().await.list_habits(owner_id))
    }

    async fn max_sort_order(&self, owner_id: &str) -> Result<Option<i64>, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        Ok(self.data.lock().await.max_sort_order(owner_id))
    }

    async fn insert_habit(
        &self,
        owner_id: &str,
        name: &str,
        sort_order: i64,
    ) -> Result<Habit, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data
            .lock()
            .await
            .insert_habit(owner_id, name, sort_order)
    }

    async fn update_habit_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Habit, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data.lock().await.update_habit_name(id, owner_id, name)
    }

    async fn update_habit_sort_order(
        &self,
        id: &str,
        owner_id: &str,
        sort_order: i64,
    ) -> Result<(), StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data
            .lock()
            .await
            .update_habit_sort_order(id, owner_id, sort_order)
    }

    async fn delete_habit(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data.lock().await.delete_habit(id, owner_id)
    }

    async fn list_completions(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        Ok(self.data.lock().await.list_completions(owner_id, date))
    }

    async fn list_completions_in_range(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data
            .lock()
            .await
            .list_completions_in_range(owner_id, start, end)
    }

    async fn insert_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data
            .lock()
            .await
            .insert_completion(owner_id, habit_id, date)
    }

    async fn delete_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        authorize(&self.owner_id, owner_id)?;
        self.data
            .lock()
            .await
            .delete_completion(owner_id, habit_id, date)
    }
}

use crate::errors::AppError;
use crate::models::AppData;
use crate::remote::MemoryRemote;
use crate::storage::persist_data;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

/// Shared server state: every owner's records plus the file they persist to.
#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, data: AppData) -> Self {
        Self {
            data_path,
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Remote store view scoped to the requesting owner.
    pub fn remote_for(&self, owner_id: &str) -> MemoryRemote {
        MemoryRemote::new(Arc::clone(&self.data), owner_id)
    }

    pub async fn persist(&self) -> Result<(), AppError> {
        let data = self.data.lock().await;
        persist_data(&self.data_path, &data).await
    }
}

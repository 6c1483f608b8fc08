pub mod app;
pub mod completions;
pub mod dates;
pub mod errors;
pub mod habits;
pub mod handlers;
pub mod http_remote;
pub mod models;
pub mod remote;
pub mod reorder;
pub mod state;
pub mod stats;
pub mod storage;
pub mod tracker;

pub use app::router;
pub use completions::{CompletionStore, Haptics};
pub use dates::DateCursor;
pub use errors::StoreError;
pub use habits::HabitListStore;
pub use http_remote::HttpRemoteStore;
pub use remote::{MemoryRemote, RemoteStore};
pub use state::AppState;
pub use storage::{load_data, resolve_data_path};
pub use tracker::{Gesture, Tracker};

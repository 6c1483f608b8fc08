use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/habits",
            get(handlers::list_habits).post(handlers::insert_habit),
        )
        .route("/api/habits/max-sort-order", get(handlers::max_sort_order))
        .route(
            "/api/habits/:id",
            patch(handlers::rename_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/sort-order", put(handlers::update_sort_order))
        .route(
            "/api/completions",
            get(handlers::list_completions)
                .post(handlers::insert_completion)
                .delete(handlers::delete_completion),
        )
        .route(
            "/api/completions/range",
            get(handlers::list_completions_in_range),
        )
        .route("/api/stats", get(handlers::get_stats))
        .with_state(state)
}

use crate::dates::{parse_date, today};
use crate::errors::AppError;
use crate::http_remote::OWNER_HEADER;
use crate::models::{
    Completion, CompletionRequest, DateQuery, Habit, MaxSortOrderResponse, NewHabitRequest,
    RangeQuery, RenameHabitRequest, SortOrderRequest, StatsQuery, StatsResponse,
};
use crate::remote::RemoteStore;
use crate::state::AppState;
use crate::stats::{build_stats, range_for};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CompletionKeyQuery {
    pub habit_id: String,
    pub date: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_habits(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Habit>>, AppError> {
    let owner = owner_id(&headers)?;
    let habits = state.remote_for(&owner).list_habits(&owner).await?;
    Ok(Json(habits))
}

pub async fn max_sort_order(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MaxSortOrderResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let sort_order = state.remote_for(&owner).max_sort_order(&owner).await?;
    Ok(Json(MaxSortOrderResponse { sort_order }))
}

pub async fn insert_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewHabitRequest>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let owner = owner_id(&headers)?;
    let habit = state
        .remote_for(&owner)
        .insert_habit(&owner, &payload.name, payload.sort_order)
        .await?;
    state.persist().await?;

    info!(owner = %owner, id = %habit.id, "habit created");
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn rename_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RenameHabitRequest>,
) -> Result<Json<Habit>, AppError> {
    let owner = owner_id(&headers)?;
    let habit = state
        .remote_for(&owner)
        .update_habit_name(&id, &owner, &payload.name)
        .await?;
    state.persist().await?;
    Ok(Json(habit))
}

pub async fn update_sort_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<SortOrderRequest>,
) -> Result<StatusCode, AppError> {
    let owner = owner_id(&headers)?;
    state
        .remote_for(&owner)
        .update_habit_sort_order(&id, &owner, payload.sort_order)
        .await?;
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_habit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let owner = owner_id(&headers)?;
    state.remote_for(&owner).delete_habit(&id, &owner).await?;
    state.persist().await?;

    info!(owner = %owner, id = %id, "habit deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Completion>>, AppError> {
    let owner = owner_id(&headers)?;
    let date = parse_date(&query.date)?;
    let completions = state
        .remote_for(&owner)
        .list_completions(&owner, date)
        .await?;
    Ok(Json(completions))
}

pub async fn list_completions_in_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<Completion>>, AppError> {
    let owner = owner_id(&headers)?;
    let (start, end) = (parse_date(&query.start)?, parse_date(&query.end)?);
    let completions = state
        .remote_for(&owner)
        .list_completions_in_range(&owner, start, end)
        .await?;
    Ok(Json(completions))
}

pub async fn insert_completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CompletionRequest>,
) -> Result<StatusCode, AppError> {
    let owner = owner_id(&headers)?;
    let date = parse_date(&payload.date)?;
    state
        .remote_for(&owner)
        .insert_completion(&owner, &payload.habit_id, date)
        .await?;
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_completion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CompletionKeyQuery>,
) -> Result<StatusCode, AppError> {
    let owner = owner_id(&headers)?;
    let date = parse_date(&query.date)?;
    state
        .remote_for(&owner)
        .delete_completion(&owner, &query.habit_id, date)
        .await?;
    state.persist().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let owner = owner_id(&headers)?;
    let anchor = match query.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => today(),
    };
    let range = range_for(query.view, anchor);
    let remote = state.remote_for(&owner);
    let habits = remote.list_habits(&owner).await?;
    let completions = remote
        .list_completions_in_range(&owner, range.start, range.end)
        .await?;
    Ok(Json(build_stats(query.view, anchor, &habits, &completions)))
}

fn owner_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized(format!("missing {OWNER_HEADER} header")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn owner_header_is_required_and_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            owner_id(&headers).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );

        headers.insert(OWNER_HEADER, HeaderValue::from_static("  "));
        assert!(owner_id(&headers).is_err());

        headers.insert(OWNER_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(owner_id(&headers).unwrap(), "alice");
    }
}

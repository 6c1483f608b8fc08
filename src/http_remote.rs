use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::dates::normalize;
use crate::errors::StoreError;
use crate::models::{
    Completion, CompletionRequest, Habit, MaxSortOrderResponse, NewHabitRequest,
    RenameHabitRequest, SortOrderRequest,
};
use crate::remote::{authorize, RemoteStore};

/// Header that carries the acting owner to the server.
pub const OWNER_HEADER: &str = "x-owner-id";

/// [`RemoteStore`] over the server's JSON API, bound to one session owner.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    owner_id: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, owner_id)
    }

    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            owner_id: owner_id.into(),
        }
    }

    fn request(
        &self,
        owner_id: &str,
        build: impl FnOnce(&Client, String) -> RequestBuilder,
        path: &str,
    ) -> Result<RequestBuilder, StoreError> {
        authorize(&self.owner_id, owner_id)?;
        let url = format!("{}{path}", self.base_url);
        Ok(build(&self.client, url).header(OWNER_HEADER, owner_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(status_error(status, message))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        Ok(self.send(request).await?.json().await?)
    }
}

fn status_error(status: StatusCode, message: String) -> StoreError {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Validation(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Authorization(message),
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        _ => StoreError::Fetch(message),
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn list_habits(&self, owner_id: &str) -> Result<Vec<Habit>, StoreError> {
        let request = self.request(owner_id, Client::get, "/api/habits")?;
        self.json(request).await
    }

    async fn max_sort_order(&self, owner_id: &str) -> Result<Option<i64>, StoreError> {
        let request = self.request(owner_id, Client::get, "/api/habits/max-sort-order")?;
        let body: MaxSortOrderResponse = self.json(request).await?;
        Ok(body.sort_order)
    }

    async fn insert_habit(
        &self,
        owner_id: &str,
        name: &str,
        sort_order: i64,
    ) -> Result<Habit, StoreError> {
        let request = self
            .request(owner_id, Client::post, "/api/habits")?
            .json(&NewHabitRequest {
                name: name.to_string(),
                sort_order,
            });
        self.json(request).await
    }

    async fn update_habit_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
    ) -> Result<Habit, StoreError> {
        let request = self
            .request(owner_id, Client::patch, &format!("/api/habits/{id}"))?
            .json(&RenameHabitRequest {
                name: name.to_string(),
            });
        self.json(request).await
    }

    async fn update_habit_sort_order(
        &self,
        id: &str,
        owner_id: &str,
        sort_order: i64,
    ) -> Result<(), StoreError> {
        let request = self
            .request(owner_id, Client::put, &format!("/api/habits/{id}/sort-order"))?
            .json(&SortOrderRequest { sort_order });
        self.send(request).await.map(|_| ())
    }

    async fn delete_habit(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        let request = self.request(owner_id, Client::delete, &format!("/api/habits/{id}"))?;
        self.send(request).await.map(|_| ())
    }

    async fn list_completions(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        let request = self
            .request(owner_id, Client::get, "/api/completions")?
            .query(&[("date", normalize(date))]);
        self.json(request).await
    }

    async fn list_completions_in_range(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Completion>, StoreError> {
        let request = self
            .request(owner_id, Client::get, "/api/completions/range")?
            .query(&[("start", normalize(start)), ("end", normalize(end))]);
        self.json(request).await
    }

    async fn insert_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let request = self
            .request(owner_id, Client::post, "/api/completions")?
            .json(&CompletionRequest {
                habit_id: habit_id.to_string(),
                date: normalize(date),
            });
        self.send(request).await.map(|_| ())
    }

    async fn delete_completion(
        &self,
        owner_id: &str,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let request = self
            .request(owner_id, Client::delete, "/api/completions")?
            .query(&[("habit_id", habit_id.to_string()), ("date", normalize(date))]);
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_error_taxonomy() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "empty".into()),
            StoreError::Validation(ref m) if m == "empty"
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, String::new()),
            StoreError::Authorization(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new()),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            StoreError::Fetch(ref m) if m.contains("502")
        ));
    }

    #[tokio::test]
    async fn calls_for_another_owner_fail_before_sending() {
        let remote = HttpRemoteStore::new("http://127.0.0.1:9", "alice");
        let err = remote.list_habits("bob").await.unwrap_err();
        assert!(matches!(err, StoreError::Authorization(_)));
    }
}

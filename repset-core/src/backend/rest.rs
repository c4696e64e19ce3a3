//! Hosted backend over a PostgREST-style HTTP API (`/rest/v1/<table>`).

use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::models::{
    CompletedSetRow, NewWorkoutLog, WorkoutExerciseRow, WorkoutLogRow, WorkoutLogUpdate,
    WorkoutRow,
};
use super::{Backend, BackendResult};
use crate::config::BackendConfig;
use crate::error::BackendError;

pub struct RestBackend {
    client: Client,
    config: BackendConfig,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(self.config.api_key.as_str());
        builder
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn send(&self, label: &str, builder: RequestBuilder) -> BackendResult<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| {
                error!("{} request failed: {}", label, e);
                BackendError::Transient(e.to_string())
            })?;

        let status = response.status();
        debug!("{} -> {}", label, status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, label, body))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        label: &str,
        builder: RequestBuilder,
    ) -> BackendResult<Vec<T>> {
        let response = self.send(label, builder).await?;
        response.json::<Vec<T>>().await.map_err(|e| {
            error!("{} returned an unexpected row shape: {}", label, e);
            BackendError::Rejected(format!("{}: {}", label, e))
        })
    }
}

fn classify_status(status: StatusCode, label: &str, body: String) -> BackendError {
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(label.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Transient(format!("{} {}", status, body))
        }
        s if s.is_server_error() => BackendError::Transient(format!("{} {}", status, body)),
        _ => BackendError::Rejected(format!("{} {}", status, body)),
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn fetch_workout(&self, workout_id: &str) -> BackendResult<WorkoutRow> {
        let request = self
            .client
            .get(self.table_url("workouts"))
            .query(&[("id", format!("eq.{}", workout_id)), ("select", "*".into())]);
        let rows: Vec<WorkoutRow> = self.fetch_rows("fetch_workout", request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("workout {}", workout_id)))
    }

    async fn fetch_workout_exercises(
        &self,
        workout_id: &str,
    ) -> BackendResult<Vec<WorkoutExerciseRow>> {
        let request = self.client.get(self.table_url("workout_exercises")).query(&[
            ("workout_id", format!("eq.{}", workout_id)),
            ("select", "*".into()),
            ("order", "order_index.asc".into()),
        ]);
        self.fetch_rows("fetch_workout_exercises", request).await
    }

    async fn create_workout_log(&self, log: &NewWorkoutLog) -> BackendResult<WorkoutLogRow> {
        let request = self
            .client
            .post(self.table_url("workout_logs"))
            .header("Prefer", "return=representation")
            .json(log);
        let rows: Vec<WorkoutLogRow> = self.fetch_rows("create_workout_log", request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Rejected("create_workout_log returned no row".into()))
    }

    async fn update_workout_log(
        &self,
        log_id: &str,
        update: &WorkoutLogUpdate,
    ) -> BackendResult<()> {
        let request = self
            .client
            .patch(self.table_url("workout_logs"))
            .query(&[("id", format!("eq.{}", log_id))])
            .json(update);
        self.send("update_workout_log", request).await?;
        Ok(())
    }

    async fn insert_completed_set(&self, set: &CompletedSetRow) -> BackendResult<()> {
        let request = self
            .client
            .post(self.table_url("completed_sets"))
            .query(&[("on_conflict", "idempotency_key")])
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(set);
        self.send("insert_completed_set", request).await?;
        Ok(())
    }

    async fn update_exercise_sets(
        &self,
        workout_exercise_id: &str,
        sets: u32,
    ) -> BackendResult<()> {
        let request = self
            .client
            .patch(self.table_url("workout_exercises"))
            .query(&[("id", format!("eq.{}", workout_exercise_id))])
            .json(&json!({ "sets": sets }));
        self.send("update_exercise_sets", request).await?;
        Ok(())
    }

    async fn update_workout_rating(&self, workout_id: &str, rating: u8) -> BackendResult<()> {
        let request = self
            .client
            .patch(self.table_url("workouts"))
            .query(&[("id", format!("eq.{}", workout_id))])
            .json(&json!({ "rating": rating }));
        self.send("update_workout_rating", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_backend_errors() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, "x", String::new()),
            BackendError::Unauthorized
        );
        assert!(classify_status(StatusCode::BAD_GATEWAY, "x", String::new()).is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "x", String::new()).is_transient());
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, "x", String::new()),
            BackendError::Rejected(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "x", String::new()),
            BackendError::NotFound(_)
        ));
    }

    #[test]
    fn table_urls_use_rest_prefix() {
        let backend = RestBackend::new(BackendConfig::new("https://db.example", "anon")).unwrap();
        assert_eq!(
            backend.table_url("completed_sets"),
            "https://db.example/rest/v1/completed_sets"
        );
    }
}

//! HTTP client for the user CRUD service.
//!
//! Endpoints used:
//! - `POST /api/users/sync` upserts a user by email
//! - `GET /api/users/{email}/database` returns `{"databaseAPI": ...}`
//! - `PUT /api/users/{email}/database` replaces the stored connection

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use insight_core::error::{InsightError, Result};
use insight_core::types::{ConnectionConfig, Identity};
use insight_workspace::{CollaboratorError, ConfigStore};

#[derive(Debug, Serialize)]
struct SyncUserRequest<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfigResponse {
    #[serde(rename = "databaseAPI", default)]
    database_api: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateDatabaseRequest<'a> {
    #[serde(rename = "databaseAPI")]
    database_api: &'a str,
}

/// [`ConfigStore`] backed by the user CRUD service.
pub struct HttpUserStore {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpUserStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(InsightError::Config(
                "backend.user_store_url must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn database_url(&self, email: &str) -> String {
        format!(
            "{}/api/users/{}/database",
            self.base_url,
            urlencoding::encode(email)
        )
    }
}

fn request_failed(e: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("HTTP request failed: {}", e))
}

async fn api_error(action: &str, response: reqwest::Response) -> CollaboratorError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    CollaboratorError::Persistence(format!("{} ({}): {}", action, status, error_text))
}

#[async_trait]
impl ConfigStore for HttpUserStore {
    async fn load_connection_config(
        &self,
        identity: &Identity,
    ) -> std::result::Result<Option<ConnectionConfig>, CollaboratorError> {
        let response = self
            .http_client
            .get(self.database_url(&identity.email))
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(user = %identity.email, "User not known to store");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error("failed to load connection", response).await);
        }

        let body: DatabaseConfigResponse = response.json().await.map_err(|e| {
            CollaboratorError::Persistence(format!("failed to parse response: {}", e))
        })?;
        Ok(body
            .database_api
            .filter(|s| !s.trim().is_empty())
            .map(ConnectionConfig::new))
    }

    async fn save_connection_config(
        &self,
        identity: &Identity,
        config: &ConnectionConfig,
    ) -> std::result::Result<(), CollaboratorError> {
        let response = self
            .http_client
            .put(self.database_url(&identity.email))
            .json(&UpdateDatabaseRequest {
                database_api: &config.connection_string,
            })
            .send()
            .await
            .map_err(request_failed)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(api_error("failed to save connection", response).await)
        }
    }

    async fn sync_user(&self, identity: &Identity) -> std::result::Result<(), CollaboratorError> {
        let url = format!("{}/api/users/sync", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&SyncUserRequest {
                email: &identity.email,
                name: &identity.display_name,
            })
            .send()
            .await
            .map_err(request_failed)?;

        if response.status().is_success() {
            debug!(user = %identity.email, "User synced with store");
            Ok(())
        } else {
            Err(api_error("failed to sync user", response).await)
        }
    }
}

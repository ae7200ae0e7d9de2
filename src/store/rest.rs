//! HTTP [`RemoteStore`] implementation for a PostgREST-style endpoint.
//!
//! Speaks the usual filtered-REST dialect: equality filters as
//! `column=eq.value` query parameters, descending order via
//! `order=created_at.desc`, and `Prefer: return=representation` to get the
//! affected rows back from writes.
//!
//! The endpoint offers no push channel, so [`RemoteStore::subscribe`] falls
//! back to polling: a background task refetches the owner's bookmarks on an
//! interval and emits a [`ChangeKind::Refreshed`] event whenever the
//! snapshot differs.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;

use crate::store::{ChangeEvent, ChangeKind, ChangeStream, RemoteStore};
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;

const ENV_BASE_URL: &str = "MARKSYNC_REST_URL";
const ENV_API_KEY: &str = "MARKSYNC_REST_KEY";
const ENV_POLL_SECS: &str = "MARKSYNC_POLL_SECS";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Connection settings for a [`RestStore`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the backend, e.g. `https://example.supabase.co`.
    pub base_url: String,
    /// API key, sent as both `apikey` and bearer token.
    pub api_key: String,
    /// Refetch interval for the polling subscription.
    pub poll_interval: Duration,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Reads the connection settings from the environment:
    /// `MARKSYNC_REST_URL`, `MARKSYNC_REST_KEY`, and optionally
    /// `MARKSYNC_POLL_SECS`.
    pub fn from_env() -> Result<Self, StoreError> {
        let base_url = env::var(ENV_BASE_URL)
            .map_err(|_| StoreError::Rejected(format!("{} not set", ENV_BASE_URL)))?;
        let api_key = env::var(ENV_API_KEY)
            .map_err(|_| StoreError::Rejected(format!("{} not set", ENV_API_KEY)))?;

        let mut config = Self::new(base_url, api_key);
        if let Ok(secs) = env::var(ENV_POLL_SECS) {
            let secs: u64 = secs
                .parse()
                .map_err(|_| StoreError::Rejected(format!("{} is not a number", ENV_POLL_SECS)))?;
            config.poll_interval = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn collection_url(&self) -> String {
        format!("{}/rest/v1/bookmarks", self.base_url.trim_end_matches('/'))
    }
}

/// Bookmark store backed by a PostgREST-style HTTP endpoint.
pub struct RestStore {
    client: Client,
    config: RestConfig,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Maps a non-success HTTP status to a [`StoreError`].
    fn status_error(status: StatusCode, body: String) -> StoreError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StoreError::PermissionDenied(format!("{}: {}", status, body))
            }
            s if s.is_client_error() => StoreError::Rejected(format!("{}: {}", s, body)),
            s => StoreError::Unreachable(format!("{}: {}", s, body)),
        }
    }

    /// Checks the response status and decodes the JSON body.
    async fn decode_rows(response: Response) -> Result<Vec<Bookmark>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, body));
        }
        response
            .json::<Vec<Bookmark>>()
            .await
            .map_err(|e| StoreError::Rejected(format!("invalid response body: {}", e)))
    }

    async fn fetch_owned(
        client: &Client,
        config: &RestConfig,
        owner_id: &str,
    ) -> Result<Vec<Bookmark>, StoreError> {
        let owner_filter = format!("eq.{}", owner_id);
        let response = client
            .get(config.collection_url())
            .header("apikey", &config.api_key)
            .bearer_auth(&config.api_key)
            .query(&[
                ("select", "*"),
                ("owner_id", owner_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        Self::decode_rows(response).await
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn list_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        Self::fetch_owned(&self.client, &self.config, owner_id).await
    }

    async fn insert_bookmark(&self, new: NewBookmark) -> Result<Bookmark, StoreError> {
        let response = self
            .client
            .post(self.config.collection_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "return=representation")
            .json(&[new])
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let mut rows = Self::decode_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::Rejected(
                "insert returned no representation".to_string(),
            ));
        }
        Ok(rows.remove(0))
    }

    async fn delete_bookmark(&self, owner_id: &str, bookmark_id: &str) -> Result<(), StoreError> {
        let id_filter = format!("eq.{}", bookmark_id);
        let owner_filter = format!("eq.{}", owner_id);
        let response = self
            .client
            .delete(self.config.collection_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .header("Prefer", "return=representation")
            .query(&[
                ("id", id_filter.as_str()),
                ("owner_id", owner_filter.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        // With return=representation the deleted rows come back; an empty
        // set means no record matched both the id and the owner.
        let rows = Self::decode_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(bookmark_id.to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, owner_id: &str) -> Result<ChangeStream, StoreError> {
        let client = self.client.clone();
        let config = self.config.clone();
        let owner = owner_id.to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.poll_interval);
            // The first tick fires immediately and establishes the baseline.
            let mut last: Option<Vec<Bookmark>> = None;
            loop {
                interval.tick().await;
                match Self::fetch_owned(&client, &config, &owner).await {
                    Ok(current) => {
                        let changed = last.as_ref().is_some_and(|prev| prev != &current);
                        last = Some(current);
                        if changed {
                            let event = ChangeEvent {
                                kind: ChangeKind::Refreshed,
                                owner_id: owner.clone(),
                                bookmark_id: None,
                            };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Poll for {} failed: {}", owner, e);
                    }
                }
            }
        });

        Ok(ChangeStream::new(rx, Some(producer)))
    }
}

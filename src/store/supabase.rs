use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::session::{SessionHub, SessionListener, Subscription};
use super::traits::ListingStore;
use super::types::{Session, SessionEvent, SessionUser, StoreError};
use crate::config::CatalogConfig;
use crate::models::Listing;

const LISTINGS_TABLE: &str = "properties";

/// Listing store backed by a Supabase project (auth, PostgREST and Storage)
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    sessions: SessionHub,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

impl SupabaseStore {
    /// Create a store for the project described by `config`
    pub fn new(config: &CatalogConfig) -> anyhow::Result<Self> {
        if !config.has_backend() {
            anyhow::bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be configured");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            bucket: config.storage_bucket.clone(),
            sessions: SessionHub::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the project key and, when signed in, the user token
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .sessions
            .current()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    fn table_url(&self) -> String {
        self.endpoint(&format!("rest/v1/{}", LISTINGS_TABLE))
    }

    fn object_url(&self, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/{}/{}", self.bucket, path))
    }
}

/// Pull a readable message out of an error response body
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: Option<Value> = serde_json::from_str(&body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        })
}

async fn check(
    response: Result<Response, reqwest::Error>,
    wrap: fn(String) -> StoreError,
) -> Result<Response, StoreError> {
    let response = response.map_err(|e| wrap(e.to_string()))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(wrap(error_message(response).await))
    }
}

#[async_trait]
impl ListingStore for SupabaseStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        info!("Signing in as {}", email);
        let response = self
            .client
            .post(self.endpoint("auth/v1/token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await;
        let response = check(response, StoreError::Auth).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;

        let session = Session {
            access_token: token.access_token,
            user: SessionUser {
                id: token.user.id,
                email: token.user.email,
            },
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        };
        self.sessions
            .publish(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        if self.sessions.current().is_none() {
            return Ok(());
        }
        let response = self
            .authorized(self.client.post(self.endpoint("auth/v1/logout")))
            .send()
            .await;
        check(response, StoreError::Auth).await?;
        self.sessions.publish(SessionEvent::SignedOut, None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        match self.sessions.current() {
            Some(session) if session.is_expired(Utc::now()) => {
                warn!("Session for {:?} expired", session.user.email);
                self.sessions.publish(SessionEvent::SignedOut, None);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn subscribe_session(&self, listener: SessionListener) -> Subscription {
        self.sessions.subscribe(listener)
    }

    async fn list_listings(&self) -> Result<Vec<Value>, StoreError> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await;
        let response = check(response, StoreError::Query).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        debug!("Fetched {} listing rows", rows.len());
        Ok(rows)
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(listing)
            .send()
            .await;
        check(response, StoreError::Query).await?;
        Ok(())
    }

    async fn update_listing(&self, id: &str, listing: &Listing) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(listing)
            .send()
            .await;
        check(response, StoreError::Query).await?;
        Ok(())
    }

    async fn delete_listing(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.delete(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await;
        check(response, StoreError::Query).await?;
        Ok(())
    }

    async fn upload_blob(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let size = bytes.len();
        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await;
        let response = response.map_err(|e| StoreError::Storage(e.to_string()))?;
        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::Storage(format!("The resource already exists: {}", path)));
        }
        check(Ok(response), StoreError::Storage).await?;
        debug!("Uploaded {} bytes to {}/{}", size, self.bucket, path);
        Ok(())
    }

    async fn delete_blobs(&self, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let response = self
            .authorized(
                self.client
                    .delete(self.endpoint(&format!("storage/v1/object/{}", self.bucket))),
            )
            .json(&json!({ "prefixes": paths }))
            .send()
            .await;
        let response = check(response, StoreError::Storage).await?;

        // The response lists the objects that were actually removed.
        let removed: Vec<Value> = response.json().await.unwrap_or_default();
        let removed: Vec<&str> = removed
            .iter()
            .filter_map(|o| o.get("name").and_then(Value::as_str))
            .collect();
        let missing: Vec<&str> = paths
            .iter()
            .map(String::as_str)
            .filter(|p| !removed.contains(p))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::Storage(format!(
                "could not delete: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{}/{}", self.bucket, path))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn source_name(&self) -> &'static str {
        "supabase"
    }
}

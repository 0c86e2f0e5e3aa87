use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

use super::session::{SessionHub, SessionListener, Subscription};
use super::traits::ListingStore;
use super::types::{Session, SessionEvent, SessionUser, StoreError};
use crate::models::Listing;

/// Every call made against a `MemoryStore`, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    SignIn(String),
    SignOut,
    ListListings,
    InsertListing(String),
    UpdateListing(String),
    DeleteListing(String),
    UploadBlob(String),
    DeleteBlobs(Vec<String>),
}

/// A stored image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
struct MemState {
    rows: Vec<(u64, Value)>,
    next_seq: u64,
    blobs: BTreeMap<String, StoredBlob>,
    credentials: BTreeMap<String, String>,
    calls: Vec<StoreCall>,
    uploads: usize,
    fail_upload_at: Option<usize>,
    fail_record_writes: bool,
    fail_blob_deletes: bool,
    fail_session_reads: bool,
    session_lifetime: Option<Duration>,
}

/// In-process listing store.
///
/// Keeps rows, blobs and sessions in memory and records every call so
/// tests can assert on what reached the backend. Failures can be injected
/// per operation.
pub struct MemoryStore {
    bucket: String,
    state: Mutex<MemState>,
    sessions: SessionHub,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("property-images")
    }
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(MemState::default()),
            sessions: SessionHub::new(),
        }
    }

    /// Allow `email` to sign in with `password`
    pub fn add_user(&self, email: &str, password: &str) {
        self.lock()
            .credentials
            .insert(email.to_string(), password.to_string());
    }

    /// Make the `n`th upload from now on (1-based) fail
    pub fn fail_upload_at(&self, n: usize) {
        let mut state = self.lock();
        state.fail_upload_at = Some(state.uploads + n);
    }

    pub fn set_fail_record_writes(&self, fail: bool) {
        self.lock().fail_record_writes = fail;
    }

    pub fn set_fail_blob_deletes(&self, fail: bool) {
        self.lock().fail_blob_deletes = fail;
    }

    /// Make `current_session` fail, as an unreachable auth server would
    pub fn set_fail_session_reads(&self, fail: bool) {
        self.lock().fail_session_reads = fail;
    }

    /// Give sessions issued from now on an expiry `lifetime` after sign-in
    pub fn set_session_lifetime(&self, lifetime: Option<Duration>) {
        self.lock().session_lifetime = lifetime;
    }

    /// Seed a row directly, bypassing the call log
    pub fn seed_row(&self, row: Value) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.push((seq, row));
    }

    /// Seed a blob directly, bypassing the call log
    pub fn seed_blob(&self, path: &str, bytes: Vec<u8>, content_type: &str) {
        self.lock().blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
    }

    /// End the session from outside, as an expiring token would
    pub fn expire_session(&self) {
        self.sessions.publish(SessionEvent::SignedOut, None);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn blob_paths(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    pub fn blob(&self, path: &str) -> Option<StoredBlob> {
        self.lock().blobs.get(path).cloned()
    }

    pub fn row(&self, id: &str) -> Option<Value> {
        self.lock()
            .rows
            .iter()
            .find(|(_, row)| row_id(row) == Some(id))
            .map(|(_, row)| row.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: StoreCall) -> MutexGuard<'_, MemState> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    fn to_row(listing: &Listing) -> Result<Value, StoreError> {
        serde_json::to_value(listing).map_err(|e| StoreError::Query(e.to_string()))
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let (known, lifetime) = {
            let state = self.record(StoreCall::SignIn(email.to_string()));
            let known = state
                .credentials
                .get(email)
                .is_some_and(|expected| expected == password);
            (known, state.session_lifetime)
        };
        if !known {
            return Err(StoreError::Auth("Invalid login credentials".to_string()));
        }

        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            user: SessionUser {
                id: Uuid::new_v4().to_string(),
                email: Some(email.to_string()),
            },
            expires_at: lifetime.map(|lifetime| Utc::now() + lifetime),
        };
        self.sessions
            .publish(SessionEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        drop(self.record(StoreCall::SignOut));
        self.sessions.publish(SessionEvent::SignedOut, None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, StoreError> {
        if self.lock().fail_session_reads {
            return Err(StoreError::Auth("session lookup failed".to_string()));
        }
        match self.sessions.current() {
            Some(session) if session.is_expired(Utc::now()) => {
                debug!("Session for {:?} expired", session.user.email);
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
        let state = self.record(StoreCall::ListListings);
        let mut rows: Vec<&(u64, Value)> = state.rows.iter().collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, row)| row.clone()).collect())
    }

    async fn insert_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::InsertListing(listing.id.clone()));
        if state.fail_record_writes {
            return Err(StoreError::Query("insert rejected".to_string()));
        }
        if state.rows.iter().any(|(_, row)| row_id(row) == Some(&listing.id)) {
            return Err(StoreError::Query(format!("duplicate key: {}", listing.id)));
        }
        let mut row = Self::to_row(listing)?;
        row["created_at"] = Value::String(Utc::now().to_rfc3339());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.push((seq, row));
        Ok(())
    }

    async fn update_listing(&self, id: &str, listing: &Listing) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::UpdateListing(id.to_string()));
        if state.fail_record_writes {
            return Err(StoreError::Query("update rejected".to_string()));
        }
        let mut row = Self::to_row(listing)?;
        match state.rows.iter_mut().find(|(_, r)| row_id(r) == Some(id)) {
            Some((_, existing)) => {
                if let Some(created) = existing.get("created_at").cloned() {
                    row["created_at"] = created;
                }
                *existing = row;
                Ok(())
            }
            None => Err(StoreError::Query(format!("no listing with id {}", id))),
        }
    }

    async fn delete_listing(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::DeleteListing(id.to_string()));
        if state.fail_record_writes {
            return Err(StoreError::Query("delete rejected".to_string()));
        }
        state.rows.retain(|(_, row)| row_id(row) != Some(id));
        Ok(())
    }

    async fn upload_blob(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::UploadBlob(path.to_string()));
        state.uploads += 1;
        if state.fail_upload_at == Some(state.uploads) {
            return Err(StoreError::Storage("upload rejected".to_string()));
        }
        if state.blobs.contains_key(path) {
            return Err(StoreError::Storage(format!("The resource already exists: {}", path)));
        }
        debug!("Stored {} bytes at {}", bytes.len(), path);
        state.blobs.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_blobs(&self, paths: &[String]) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::DeleteBlobs(paths.to_vec()));
        if state.fail_blob_deletes {
            return Err(StoreError::Storage(format!(
                "could not delete: {}",
                paths.join(", ")
            )));
        }
        for path in paths {
            state.blobs.remove(path);
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{}/{}", self.bucket, path)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

use async_trait::async_trait;
use serde_json::Value;

use super::session::{SessionListener, Subscription};
use super::types::{Session, StoreError};
use crate::models::Listing;

/// Common trait for the hosted backend that owns listings, sessions and images.
///
/// Blob operations act on the single image bucket the store was configured with.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, StoreError>;

    async fn sign_out(&self) -> Result<(), StoreError>;

    async fn current_session(&self) -> Result<Option<Session>, StoreError>;

    /// Register for session transitions; drop the handle to stop listening
    fn subscribe_session(&self, listener: SessionListener) -> Subscription;

    /// Raw listing rows, newest first
    async fn list_listings(&self) -> Result<Vec<Value>, StoreError>;

    async fn insert_listing(&self, listing: &Listing) -> Result<(), StoreError>;

    async fn update_listing(&self, id: &str, listing: &Listing) -> Result<(), StoreError>;

    async fn delete_listing(&self, id: &str) -> Result<(), StoreError>;

    /// Upload a blob; fails if something already lives at `path`
    async fn upload_blob(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Delete blobs; paths that could not be removed are reported in the error
    async fn delete_blobs(&self, paths: &[String]) -> Result<(), StoreError>;

    fn public_url(&self, path: &str) -> String;

    fn bucket(&self) -> &str;

    /// Get the name of the backend
    fn source_name(&self) -> &'static str;
}

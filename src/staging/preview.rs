use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

type Live = Arc<Mutex<HashSet<String>>>;

fn lock(live: &Live) -> MutexGuard<'_, HashSet<String>> {
    live.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks transient preview references handed out for local files.
///
/// Each reference stays registered until its `TransientPreview` is
/// released or dropped, so a leak shows up as a non-zero `live_count`.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    live: Live,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh reference for a local file
    pub fn mint(&self, file_name: &str) -> TransientPreview {
        let url = format!("blob:local/{}", Uuid::new_v4());
        debug!("Minted preview {} for {}", url, file_name);
        lock(&self.live).insert(url.clone());
        TransientPreview {
            url,
            live: self.live.clone(),
        }
    }

    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        lock(&self.live).contains(url)
    }
}

/// A transient preview reference with a single owner
#[derive(Debug)]
pub struct TransientPreview {
    url: String,
    live: Live,
}

impl TransientPreview {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Give the reference back to the registry
    pub fn release(self) {}
}

impl Drop for TransientPreview {
    fn drop(&mut self) {
        if lock(&self.live).remove(&self.url) {
            debug!("Released preview {}", self.url);
        }
    }
}

/// Where a staged image's preview comes from
#[derive(Debug)]
pub enum Preview {
    /// Public URL of an image already in storage
    Remote(String),
    /// Locally minted reference for a file not yet uploaded
    Transient(TransientPreview),
}

impl Preview {
    pub fn url(&self) -> &str {
        match self {
            Self::Remote(url) => url,
            Self::Transient(preview) => preview.url(),
        }
    }
}

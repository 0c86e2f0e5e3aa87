//! Runtime configuration, read from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `SUPABASE_URL` | (none) | Project URL of the hosted backend |
//! | `SUPABASE_ANON_KEY` | (none) | Public API key of the project |
//! | `SUPABASE_STORAGE_BUCKET` | `property-images` | Bucket holding listing images |
//!
//! Values still containing the `YOUR_` placeholder from the sample config
//! count as unset.

use serde::{Deserialize, Serialize};

use crate::staging::CompressionOptions;

pub const DEFAULT_BUCKET: &str = "property-images";

const PLACEHOLDER: &str = "YOUR_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_bucket: String,
    pub compression: CompressionOptions,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            storage_bucket: DEFAULT_BUCKET.to_string(),
            compression: CompressionOptions::default(),
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so callers need not touch the process env
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let bucket = read("SUPABASE_STORAGE_BUCKET");
        Self {
            supabase_url: read("SUPABASE_URL"),
            supabase_anon_key: read("SUPABASE_ANON_KEY"),
            storage_bucket: if bucket.is_empty() {
                DEFAULT_BUCKET.to_string()
            } else {
                bucket
            },
            compression: CompressionOptions::default(),
        }
    }

    /// Whether a usable backend is configured
    pub fn has_backend(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_url.contains(PLACEHOLDER)
            && !self.supabase_anon_key.contains(PLACEHOLDER)
    }
}

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::catalog::present::fold_diacritics;
use crate::error::{CatalogError, Result, ValidationError};
use crate::models::{Listing, ListingFields};
use crate::staging::{
    compress, CompressedImage, CompressionOptions, ImageStagingManager, LocalFile, StageId,
    StageOrigin,
};
use crate::store::{ListingStore, StoreError};

const MAX_BASE_NAME: usize = 45;
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Whether the listing record is created or overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Insert,
    Update,
}

/// What to save: the record id and its validated fields
#[derive(Debug, Clone, Copy)]
pub struct CommitRequest<'a> {
    pub listing_id: &'a str,
    pub fields: &'a ListingFields,
    pub mode: CommitMode,
}

/// How the saved cover was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverResolution {
    /// The stage flagged as cover resolved to a path
    Flagged,
    /// Nothing was flagged, the first image was used
    DefaultFirst,
    /// A stage was flagged but had no path, the first image was used
    FallbackFirst,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Saved {
        listing: Listing,
        cover: CoverResolution,
    },
    /// The record was saved but some cleanup failed
    SavedWithWarnings {
        listing: Listing,
        cover: CoverResolution,
        warnings: Vec<String>,
    },
}

impl CommitOutcome {
    pub fn listing(&self) -> &Listing {
        match self {
            Self::Saved { listing, .. } | Self::SavedWithWarnings { listing, .. } => listing,
        }
    }

    pub fn cover(&self) -> CoverResolution {
        match self {
            Self::Saved { cover, .. } | Self::SavedWithWarnings { cover, .. } => *cover,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Saved { .. } => &[],
            Self::SavedWithWarnings { warnings, .. } => warnings,
        }
    }
}

/// Save the staged images and the listing record.
///
/// Stages are resolved in order: existing images keep their path, new ones
/// are compressed and uploaded one at a time. If anything fails after an
/// upload succeeded, the blobs uploaded by this attempt are deleted again.
/// Images removed during the edit are deleted only once the record is saved,
/// and a failure there is reported as a warning.
pub async fn commit_listing(
    store: &dyn ListingStore,
    staging: &ImageStagingManager,
    request: CommitRequest<'_>,
    options: &CompressionOptions,
) -> Result<CommitOutcome> {
    if staging.is_empty() {
        return Err(ValidationError::NoImages.into());
    }

    let mut uploaded = Vec::new();
    let (listing, cover) =
        match write_listing(store, staging, request, options, &mut uploaded).await {
            Ok(saved) => saved,
            Err(err) => {
                rollback(store, &uploaded).await;
                return Err(err);
            }
        };
    info!(
        "Saved listing {} with {} image(s), {} new",
        listing.id,
        listing.image_paths.len(),
        uploaded.len()
    );

    let mut warnings = Vec::new();
    // A removed path may still be referenced if the listing held it twice.
    let removed: Vec<String> = staging
        .removed_paths()
        .iter()
        .filter(|path| !listing.image_paths.contains(*path))
        .cloned()
        .collect();
    if !removed.is_empty() {
        match store.delete_blobs(&removed).await {
            Ok(()) => debug!("Deleted {} replaced image(s)", removed.len()),
            Err(err) => {
                warn!("Listing {} saved but old images remain: {}", listing.id, err);
                warnings.push(format!(
                    "listing saved, but old images could not be removed: {}",
                    err
                ));
            }
        }
    }

    Ok(if warnings.is_empty() {
        CommitOutcome::Saved { listing, cover }
    } else {
        CommitOutcome::SavedWithWarnings {
            listing,
            cover,
            warnings,
        }
    })
}

async fn write_listing(
    store: &dyn ListingStore,
    staging: &ImageStagingManager,
    request: CommitRequest<'_>,
    options: &CompressionOptions,
    uploaded: &mut Vec<String>,
) -> Result<(Listing, CoverResolution)> {
    let mut resolved: Vec<(StageId, String)> = Vec::with_capacity(staging.len());
    for stage in staging.stages() {
        let path = match &stage.origin {
            StageOrigin::Existing { path } => path.clone(),
            StageOrigin::New { file } => {
                let path = upload_new_image(store, file, request.listing_id, options).await?;
                uploaded.push(path.clone());
                path
            }
        };
        if !path.is_empty() {
            resolved.push((stage.id, path));
        }
    }

    if resolved.is_empty() {
        return Err(ValidationError::NoImages.into());
    }

    let (cover_path, cover) = resolve_cover(staging.cover(), &resolved);
    let paths = resolved.into_iter().map(|(_, path)| path).collect();
    let listing = Listing::from_fields(request.listing_id, request.fields, paths, Some(cover_path));

    match request.mode {
        CommitMode::Insert => store.insert_listing(&listing).await?,
        CommitMode::Update => store.update_listing(request.listing_id, &listing).await?,
    }
    Ok((listing, cover))
}

/// Pick the cover path for the resolved stages (which must be non-empty)
fn resolve_cover(flagged: Option<StageId>, resolved: &[(StageId, String)]) -> (String, CoverResolution) {
    let first = resolved[0].1.clone();
    match flagged {
        Some(id) => match resolved.iter().find(|(stage, _)| *stage == id) {
            Some((_, path)) => (path.clone(), CoverResolution::Flagged),
            None => {
                warn!("Cover stage {} has no stored path, using the first image", id);
                (first, CoverResolution::FallbackFirst)
            }
        },
        None => {
            debug!("No cover chosen, using the first image");
            (first, CoverResolution::DefaultFirst)
        }
    }
}

async fn upload_new_image(
    store: &dyn ListingStore,
    file: &LocalFile,
    listing_id: &str,
    options: &CompressionOptions,
) -> Result<String> {
    let input = file.clone();
    let options = *options;
    let compressed = tokio::task::spawn_blocking(move || compress(&input, &options))
        .await
        .map_err(|e| CatalogError::Compression {
            name: file.name.clone(),
            reason: e.to_string(),
        })??;

    let path = allocate_upload_path(listing_id, &file.name);
    store
        .upload_blob(&path, compressed.bytes, CompressedImage::CONTENT_TYPE)
        .await
        .map_err(|e| upload_error(e, store.bucket()))?;
    debug!("Uploaded {} as {}", file.name, path);
    Ok(path)
}

fn upload_error(err: StoreError, bucket: &str) -> CatalogError {
    match err {
        StoreError::Storage(message) => {
            let lower = message.to_lowercase();
            if lower.contains("bucket") && lower.contains("not found") {
                CatalogError::Storage(format!(
                    "bucket \"{}\" not found; create it in storage or set SUPABASE_STORAGE_BUCKET",
                    bucket
                ))
            } else {
                CatalogError::Storage(format!("image upload failed: {}", message))
            }
        }
        other => other.into(),
    }
}

/// Best-effort removal of blobs uploaded by a failed attempt
async fn rollback(store: &dyn ListingStore, uploaded: &[String]) {
    if uploaded.is_empty() {
        return;
    }
    match store.delete_blobs(uploaded).await {
        Ok(()) => info!("Rolled back {} uploaded image(s)", uploaded.len()),
        Err(err) => warn!("Rollback left {} orphaned image(s): {}", uploaded.len(), err),
    }
}

/// Storage-safe base name for an uploaded file
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => file_name,
    };

    let folded = fold_diacritics(&base.to_lowercase());
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed: String = out.trim_matches('-').chars().take(MAX_BASE_NAME).collect();
    if trimmed.is_empty() {
        "imagem".to_string()
    } else {
        trimmed
    }
}

/// Fresh storage path for a new image of `listing_id`
pub fn allocate_upload_path(listing_id: &str, file_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!(
        "{}/{}-{}-{}.{}",
        listing_id,
        Utc::now().timestamp_millis(),
        suffix,
        sanitize_file_name(file_name),
        CompressedImage::EXTENSION
    )
}

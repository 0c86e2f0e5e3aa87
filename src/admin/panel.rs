use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

use super::commit::{commit_listing, CommitMode, CommitOutcome, CommitRequest};
use crate::catalog::FilterEngine;
use crate::error::{CatalogError, Result, ValidationError};
use crate::models::{normalize_rows, Listing, ListingDraft};
use crate::staging::{CompressionOptions, ImageStagingManager};
use crate::store::{ListingStore, Session, SessionEvent, Subscription};

/// Result of deleting a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The record is gone but some images could not be removed
    DeletedWithWarnings(Vec<String>),
}

type EventQueue = Arc<Mutex<VecDeque<SessionEvent>>>;

/// Catalog plus admin form state, driven against a listing store.
///
/// Session transitions pushed by the store are queued and applied at the
/// start of the next panel operation (or by `process_session_events`), so
/// an ended session always clears the form before anything else runs.
pub struct AdminPanel {
    store: Arc<dyn ListingStore>,
    catalog: FilterEngine,
    staging: ImageStagingManager,
    editing: Option<String>,
    session: Option<Session>,
    compression: CompressionOptions,
    events: EventQueue,
    _subscription: Subscription,
}

impl AdminPanel {
    /// Restore any existing session, start listening for session changes
    /// and load the catalog.
    pub async fn connect(store: Arc<dyn ListingStore>, compression: CompressionOptions) -> Result<Self> {
        let session = store
            .current_session()
            .await
            .map_err(|e| CatalogError::Auth(format!("could not restore session: {}", e)))?;

        let events: EventQueue = Arc::default();
        let queue = events.clone();
        let subscription =
            store.subscribe_session(Arc::new(move |event: SessionEvent, _: Option<&Session>| {
                queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(event);
            }));

        let mut panel = Self {
            store,
            catalog: FilterEngine::new(),
            staging: ImageStagingManager::default(),
            editing: None,
            session,
            compression,
            events,
            _subscription: subscription,
        };
        panel.refresh().await?;
        Ok(panel)
    }

    pub fn catalog(&self) -> &FilterEngine {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut FilterEngine {
        &mut self.catalog
    }

    pub fn staging(&self) -> &ImageStagingManager {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut ImageStagingManager {
        &mut self.staging
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn public_url(&self, path: &str) -> String {
        self.store.public_url(path)
    }

    /// Re-read the session from the store and apply queued transitions.
    ///
    /// The form is cleared whenever the session turned out to have ended,
    /// whether the store announced it or the token simply expired.
    pub async fn process_session_events(&mut self) {
        let was_signed_in = self.session.is_some();
        let current = match self.store.current_session().await {
            Ok(session) => session.filter(|s| !s.is_expired(Utc::now())),
            Err(err) => {
                warn!("Could not read the session, treating it as ended: {}", err);
                None
            }
        };
        let events: Vec<SessionEvent> = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        self.session = current;
        let ended = was_signed_in || events.contains(&SessionEvent::SignedOut);
        if self.session.is_none() && ended {
            info!("Session ended, clearing the admin form");
            self.reset_form();
        }
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&Session> {
        self.process_session_events().await;
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        let session = self.store.sign_in(email, password).await?;
        info!("Signed in as {}", email);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(self.session.insert(session))
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.store.sign_out().await?;
        self.process_session_events().await;
        self.session = None;
        self.reset_form();
        Ok(())
    }

    /// Reload listings from the store; filter options are reconciled
    pub async fn refresh(&mut self) -> Result<usize> {
        let rows = self
            .store
            .list_listings()
            .await
            .map_err(|e| CatalogError::Query(format!("could not load listings: {}", e)))?;
        let listings = normalize_rows(&rows);
        info!("Loaded {} listing(s) from {}", listings.len(), self.store.source_name());
        let count = listings.len();
        self.catalog.replace_listings(listings);
        Ok(count)
    }

    /// Put a stored listing into the form for editing
    pub fn start_editing(&mut self, id: &str) -> Result<ListingDraft> {
        let listing = self
            .catalog
            .find(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownListing(id.to_string()))?;
        let store = self.store.clone();
        self.staging
            .load_existing(&listing, |path| store.public_url(path));
        self.editing = Some(listing.id.clone());
        info!("Editing listing {}", listing.id);
        Ok(ListingDraft::from_listing(&listing))
    }

    /// Discard the form: staged images, cover choice and edit target
    pub fn reset_form(&mut self) {
        self.staging.reset();
        self.editing = None;
    }

    /// Validate the draft and commit it with the staged images
    pub async fn save(&mut self, draft: &ListingDraft) -> Result<CommitOutcome> {
        self.require_session().await?;
        let fields = draft.validate()?;

        let (listing_id, mode) = match &self.editing {
            Some(id) => (id.clone(), CommitMode::Update),
            None => (Uuid::new_v4().to_string(), CommitMode::Insert),
        };
        let request = CommitRequest {
            listing_id: &listing_id,
            fields: &fields,
            mode,
        };
        let outcome = commit_listing(
            self.store.as_ref(),
            &self.staging,
            request,
            &self.compression,
        )
        .await?;

        self.reset_form();
        Ok(self.after_write(outcome).await)
    }

    /// Delete a listing and, best-effort, its images
    pub async fn delete(&mut self, id: &str) -> Result<DeleteOutcome> {
        self.require_session().await?;
        let listing: Listing = self
            .catalog
            .find(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownListing(id.to_string()))?;

        self.store.delete_listing(id).await?;
        info!("Deleted listing {}", id);

        let mut warnings = Vec::new();
        if !listing.image_paths.is_empty() {
            if let Err(err) = self.store.delete_blobs(&listing.image_paths).await {
                warn!("Listing {} deleted but images remain: {}", id, err);
                warnings.push(format!(
                    "listing deleted, but some images could not be removed: {}",
                    err
                ));
            }
        }

        if self.editing.as_deref() == Some(id) {
            self.reset_form();
        }
        if let Err(err) = self.refresh().await {
            warnings.push(err.to_string());
        }

        Ok(if warnings.is_empty() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::DeletedWithWarnings(warnings)
        })
    }

    async fn require_session(&mut self) -> Result<()> {
        self.process_session_events().await;
        if self.session.is_none() {
            return Err(CatalogError::Auth("sign in to the admin panel first".to_string()));
        }
        Ok(())
    }

    /// Reload after a successful write; a failed reload only adds a warning
    async fn after_write(&mut self, outcome: CommitOutcome) -> CommitOutcome {
        match self.refresh().await {
            Ok(_) => outcome,
            Err(err) => {
                warn!("Listing saved but the catalog could not be reloaded: {}", err);
                let mut warnings = outcome.warnings().to_vec();
                warnings.push(err.to_string());
                CommitOutcome::SavedWithWarnings {
                    listing: outcome.listing().clone(),
                    cover: outcome.cover(),
                    warnings,
                }
            }
        }
    }
}

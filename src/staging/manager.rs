use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use super::compress::LocalFile;
use super::preview::{Preview, PreviewRegistry};
use crate::models::Listing;

/// Identifier of a staged image, unique within a form session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(Uuid);

impl StageId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a staged image came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOrigin {
    /// Already stored, referenced by its storage path
    Existing { path: String },
    /// Attached in this session, waiting to be compressed and uploaded
    New { file: LocalFile },
}

/// One image attached to the create/edit form
#[derive(Debug)]
pub struct StagedImage {
    pub id: StageId,
    pub origin: StageOrigin,
    pub preview: Preview,
}

impl StagedImage {
    pub fn path(&self) -> Option<&str> {
        match &self.origin {
            StageOrigin::Existing { path } => Some(path),
            StageOrigin::New { .. } => None,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self.origin, StageOrigin::Existing { .. })
    }
}

/// Coarse state of the stage collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    Empty,
    Populated,
}

/// Images attached to the listing being created or edited.
///
/// The cover is tracked by stage id rather than by path because new images
/// have no path until they are uploaded. Existing images removed during an
/// edit are only remembered here; deleting them from storage is up to the
/// caller once the listing itself has been saved.
pub struct ImageStagingManager {
    stages: Vec<StagedImage>,
    cover: Option<StageId>,
    removed_paths: BTreeSet<String>,
    previews: PreviewRegistry,
}

impl Default for ImageStagingManager {
    fn default() -> Self {
        Self::new(PreviewRegistry::new())
    }
}

impl ImageStagingManager {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            stages: Vec::new(),
            cover: None,
            removed_paths: BTreeSet::new(),
            previews,
        }
    }

    pub fn stages(&self) -> &[StagedImage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn state(&self) -> StagingState {
        if self.stages.is_empty() {
            StagingState::Empty
        } else {
            StagingState::Populated
        }
    }

    /// The stage explicitly flagged as cover, if any
    pub fn cover(&self) -> Option<StageId> {
        self.cover
    }

    pub fn removed_paths(&self) -> &BTreeSet<String> {
        &self.removed_paths
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn get(&self, id: StageId) -> Option<&StagedImage> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    /// Stage every image among `files`; anything else is skipped.
    ///
    /// Returns the ids of the new stages in attach order.
    pub fn attach_new_files(&mut self, files: impl IntoIterator<Item = LocalFile>) -> Vec<StageId> {
        let mut added = Vec::new();
        for file in files {
            if !file.is_image() {
                debug!("Skipping {} ({})", file.name, file.content_type);
                continue;
            }
            let preview = Preview::Transient(self.previews.mint(&file.name));
            let id = StageId::fresh();
            self.stages.push(StagedImage {
                id,
                origin: StageOrigin::New { file },
                preview,
            });
            added.push(id);
        }

        if self.cover.is_none() {
            self.cover = self.stages.first().map(|stage| stage.id);
        }
        debug!("Attached {} image(s), {} staged", added.len(), self.stages.len());
        added
    }

    /// Drop a stage; returns false if no such stage exists
    pub fn remove_stage(&mut self, id: StageId) -> bool {
        let Some(index) = self.stages.iter().position(|stage| stage.id == id) else {
            return false;
        };

        let stage = self.stages.remove(index);
        if let StageOrigin::Existing { path } = &stage.origin {
            self.removed_paths.insert(path.clone());
        }
        // Dropping the stage releases any transient preview it owned.
        drop(stage);

        if self.cover == Some(id) {
            self.cover = self.stages.first().map(|stage| stage.id);
            debug!("Removed cover stage {}, cover is now {:?}", id, self.cover);
        }
        true
    }

    /// Flag a stage as cover; returns false if it is not staged
    pub fn set_cover(&mut self, id: StageId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.cover = Some(id);
        true
    }

    /// Start an edit session seeded with the images of `listing`
    pub fn load_existing(&mut self, listing: &Listing, public_url: impl Fn(&str) -> String) {
        self.reset();
        self.stages = listing
            .image_paths
            .iter()
            .map(|path| StagedImage {
                id: StageId::fresh(),
                origin: StageOrigin::Existing { path: path.clone() },
                preview: Preview::Remote(public_url(path)),
            })
            .collect();

        let cover = listing
            .cover_image
            .as_deref()
            .and_then(|cover| self.stages.iter().find(|stage| stage.path() == Some(cover)))
            .or_else(|| self.stages.first())
            .map(|stage| stage.id);
        self.cover = cover;
    }

    /// Release every preview and forget all staged state
    pub fn reset(&mut self) {
        self.stages.clear();
        self.cover = None;
        self.removed_paths.clear();
    }
}

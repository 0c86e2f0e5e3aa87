use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

use listing_catalog::admin::{
    commit_listing, CommitMode, CommitOutcome, CommitRequest, CoverResolution,
};
use listing_catalog::models::{Listing, ListingFields, PropertyType};
use listing_catalog::staging::{CompressionOptions, ImageStagingManager, LocalFile};
use listing_catalog::store::{
    ListingStore, MemoryStore, Session, SessionListener, StoreCall, StoreError, Subscription,
};
use listing_catalog::{CatalogError, ValidationError};

fn png(name: &str, width: u32, height: u32) -> LocalFile {
    let img = ImageBuffer::from_pixel(width, height, Rgb([10u8, 120, 200]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    LocalFile::new(name, "image/png", bytes)
}

fn fields() -> ListingFields {
    ListingFields {
        title: "Casa com quintal".into(),
        description: "Perto da praia".into(),
        price: 420000.0,
        bedrooms: 3,
        neighborhood: "Centro".into(),
        location: "Rua B, 20".into(),
        property_type: PropertyType::Casa,
        whatsapp: "11999990000".into(),
    }
}

fn existing_listing() -> Listing {
    Listing::from_fields(
        "l1",
        &fields(),
        vec!["l1/a.jpg".into(), "l1/b.jpg".into(), "l1/c.jpg".into()],
        Some("l1/b.jpg".into()),
    )
}

fn options() -> CompressionOptions {
    CompressionOptions {
        max_width: 32,
        max_height: 32,
        quality: 0.8,
    }
}

fn insert(fields: &ListingFields) -> CommitRequest<'_> {
    CommitRequest {
        listing_id: "new",
        fields,
        mode: CommitMode::Insert,
    }
}

fn uploads(calls: &[StoreCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|c| match c {
            StoreCall::UploadBlob(path) => Some(path.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn empty_staging_fails_before_touching_the_store() {
    let store = MemoryStore::default();
    let staging = ImageStagingManager::default();

    let err = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Validation(ValidationError::NoImages)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn new_images_are_compressed_uploaded_and_inserted_in_order() {
    let store = MemoryStore::default();
    let mut staging = ImageStagingManager::default();
    let ids = staging.attach_new_files([png("Sala.png", 64, 16), png("Quarto.png", 8, 8)]);
    staging.set_cover(ids[1]);

    let outcome = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap();

    let listing = outcome.listing().clone();
    assert!(matches!(outcome, CommitOutcome::Saved { cover: CoverResolution::Flagged, .. }));
    assert_eq!(listing.image_paths.len(), 2);
    assert!(listing.image_paths[0].starts_with("new/") && listing.image_paths[0].ends_with("-sala.jpg"));
    assert!(listing.image_paths[1].ends_with("-quarto.jpg"));
    assert_eq!(listing.cover_image.as_ref(), Some(&listing.image_paths[1]));

    let calls = store.calls();
    assert_eq!(uploads(&calls), listing.image_paths);
    assert_eq!(calls.last(), Some(&StoreCall::InsertListing("new".into())));

    let blob = store.blob(&listing.image_paths[0]).unwrap();
    assert_eq!(blob.content_type, "image/jpeg");
    let stored = image::load_from_memory(&blob.bytes).unwrap();
    assert_eq!((stored.width(), stored.height()), (32, 8));
}

#[tokio::test]
async fn failed_upload_rolls_back_earlier_uploads() {
    let store = MemoryStore::default();
    store.fail_upload_at(2);
    let mut staging = ImageStagingManager::default();
    staging.attach_new_files([png("a.png", 4, 4), png("b.png", 4, 4), png("c.png", 4, 4)]);

    let err = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Storage(_)));
    let calls = store.calls();
    let uploaded = uploads(&calls);
    assert_eq!(uploaded.len(), 2);
    assert_eq!(
        calls.last(),
        Some(&StoreCall::DeleteBlobs(vec![uploaded[0].clone()]))
    );
    assert!(!calls.iter().any(|c| matches!(c, StoreCall::InsertListing(_) | StoreCall::UpdateListing(_))));
    assert!(store.blob_paths().is_empty());
}

#[tokio::test]
async fn failed_record_write_rolls_back_all_uploads() {
    let store = MemoryStore::default();
    store.set_fail_record_writes(true);
    let mut staging = ImageStagingManager::default();
    staging.attach_new_files([png("a.png", 4, 4), png("b.png", 4, 4)]);

    let err = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Query(_)));
    assert!(store.blob_paths().is_empty());
    assert!(store.row("new").is_none());
}

#[tokio::test]
async fn undecodable_image_aborts_the_commit() {
    let store = MemoryStore::default();
    let mut staging = ImageStagingManager::default();
    staging.attach_new_files([
        png("ok.png", 4, 4),
        LocalFile::new("broken.jpg", "image/jpeg", b"garbage".to_vec()),
    ]);

    let err = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::ImageDecode { ref name, .. } if name == "broken.jpg"));
    assert!(store.blob_paths().is_empty());
    assert!(store.row("new").is_none());
}

#[tokio::test]
async fn unchanged_edit_reproduces_images_and_cover() {
    let store = MemoryStore::default();
    let original = existing_listing();
    store.insert_listing(&original).await.unwrap();
    store.clear_calls();

    let mut staging = ImageStagingManager::default();
    staging.load_existing(&original, |p| store.public_url(p));

    let request = CommitRequest {
        listing_id: "l1",
        fields: &fields(),
        mode: CommitMode::Update,
    };
    let outcome = commit_listing(&store, &staging, request, &options())
        .await
        .unwrap();

    assert_eq!(outcome.listing().image_paths, original.image_paths);
    assert_eq!(outcome.listing().cover_image, original.cover_image);
    assert_eq!(store.calls(), vec![StoreCall::UpdateListing("l1".into())]);
}

#[tokio::test]
async fn removed_images_are_deleted_after_the_save() {
    let store = MemoryStore::default();
    let original = existing_listing();
    store.insert_listing(&original).await.unwrap();
    for path in &original.image_paths {
        store.seed_blob(path, vec![1], "image/jpeg");
    }
    store.clear_calls();

    let mut staging = ImageStagingManager::default();
    staging.load_existing(&original, |p| store.public_url(p));
    let cover = staging.cover().unwrap();
    staging.remove_stage(cover);
    staging.attach_new_files([png("nova.png", 4, 4)]);

    let request = CommitRequest {
        listing_id: "l1",
        fields: &fields(),
        mode: CommitMode::Update,
    };
    let outcome = commit_listing(&store, &staging, request, &options())
        .await
        .unwrap();

    let listing = outcome.listing();
    assert_eq!(listing.image_paths.len(), 3);
    assert_eq!(listing.image_paths[..2], ["l1/a.jpg".to_string(), "l1/c.jpg".to_string()]);
    assert_eq!(listing.cover_image.as_deref(), Some("l1/a.jpg"));

    let calls = store.calls();
    assert_eq!(
        calls.last(),
        Some(&StoreCall::DeleteBlobs(vec!["l1/b.jpg".into()]))
    );
    assert!(store.blob("l1/b.jpg").is_none());
    assert!(store.blob("l1/a.jpg").is_some());
}

#[tokio::test]
async fn failed_cleanup_is_only_a_warning() {
    let store = MemoryStore::default();
    let original = existing_listing();
    store.insert_listing(&original).await.unwrap();
    store.set_fail_blob_deletes(true);

    let mut staging = ImageStagingManager::default();
    staging.load_existing(&original, |p| store.public_url(p));
    let first = staging.stages()[0].id;
    staging.remove_stage(first);

    let request = CommitRequest {
        listing_id: "l1",
        fields: &fields(),
        mode: CommitMode::Update,
    };
    let outcome = commit_listing(&store, &staging, request, &options())
        .await
        .unwrap();

    assert!(matches!(outcome, CommitOutcome::SavedWithWarnings { .. }));
    assert_eq!(outcome.warnings().len(), 1);
    let row = store.row("l1").unwrap();
    assert_eq!(row["image_paths"], serde_json::json!(["l1/b.jpg", "l1/c.jpg"]));
}

#[tokio::test]
async fn removing_one_copy_of_a_repeated_path_keeps_the_blob() {
    let store = MemoryStore::default();
    let doubled = Listing::from_fields(
        "l1",
        &fields(),
        vec!["l1/a.jpg".into(), "l1/a.jpg".into()],
        Some("l1/a.jpg".into()),
    );
    store.insert_listing(&doubled).await.unwrap();
    store.seed_blob("l1/a.jpg", vec![1], "image/jpeg");
    store.clear_calls();

    let mut staging = ImageStagingManager::default();
    staging.load_existing(&doubled, |p| store.public_url(p));
    let second = staging.stages()[1].id;
    staging.remove_stage(second);

    let request = CommitRequest {
        listing_id: "l1",
        fields: &fields(),
        mode: CommitMode::Update,
    };
    let outcome = commit_listing(&store, &staging, request, &options())
        .await
        .unwrap();

    assert_eq!(outcome.listing().image_paths, vec!["l1/a.jpg".to_string()]);
    assert!(store.blob("l1/a.jpg").is_some());
    assert_eq!(store.calls(), vec![StoreCall::UpdateListing("l1".into())]);
}

#[tokio::test]
async fn missing_bucket_is_explained() {
    struct NoBucket(MemoryStore);

    #[async_trait::async_trait]
    impl ListingStore for NoBucket {
        async fn sign_in(&self, e: &str, p: &str) -> Result<Session, StoreError> {
            self.0.sign_in(e, p).await
        }
        async fn sign_out(&self) -> Result<(), StoreError> {
            self.0.sign_out().await
        }
        async fn current_session(&self) -> Result<Option<Session>, StoreError> {
            self.0.current_session().await
        }
        fn subscribe_session(&self, l: SessionListener) -> Subscription {
            self.0.subscribe_session(l)
        }
        async fn list_listings(&self) -> Result<Vec<serde_json::Value>, StoreError> {
            self.0.list_listings().await
        }
        async fn insert_listing(&self, l: &Listing) -> Result<(), StoreError> {
            self.0.insert_listing(l).await
        }
        async fn update_listing(&self, id: &str, l: &Listing) -> Result<(), StoreError> {
            self.0.update_listing(id, l).await
        }
        async fn delete_listing(&self, id: &str) -> Result<(), StoreError> {
            self.0.delete_listing(id).await
        }
        async fn upload_blob(&self, _: &str, _: Vec<u8>, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Storage("Bucket not found".into()))
        }
        async fn delete_blobs(&self, paths: &[String]) -> Result<(), StoreError> {
            self.0.delete_blobs(paths).await
        }
        fn public_url(&self, path: &str) -> String {
            self.0.public_url(path)
        }
        fn bucket(&self) -> &str {
            "fotos"
        }
        fn source_name(&self) -> &'static str {
            "no-bucket"
        }
    }

    let store = NoBucket(MemoryStore::default());
    let mut staging = ImageStagingManager::default();
    staging.attach_new_files([png("a.png", 4, 4)]);

    let err = commit_listing(&store, &staging, insert(&fields()), &options())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bucket \"fotos\" not found"));
}

use thiserror::Error;

use crate::store::StoreError;

/// Problems with form input, caught before anything reaches the store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid property type: {0:?}")]
    InvalidType(String),

    #[error("invalid price: {0:?}")]
    InvalidPrice(String),

    #[error("invalid bedroom count: {0:?}")]
    InvalidBedrooms(String),

    #[error("add at least one image before saving")]
    NoImages,

    #[error("unknown listing: {0}")]
    UnknownListing(String),
}

/// Every failure the catalog and admin workflows can surface
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid image file {name}: {reason}")]
    ImageDecode { name: String, reason: String },

    #[error("could not compress image {name}: {reason}")]
    Compression { name: String, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("storage failed: {0}")]
    Storage(String),
}

impl From<StoreError> for CatalogError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Auth(message) => Self::Auth(message),
            StoreError::Query(message) => Self::Query(message),
            StoreError::Storage(message) => Self::Storage(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_their_category() {
        let err: CatalogError = StoreError::Auth("Invalid login credentials".into()).into();
        assert!(matches!(err, CatalogError::Auth(ref m) if m == "Invalid login credentials"));

        let err: CatalogError = StoreError::Storage("Bucket not found".into()).into();
        assert_eq!(err.to_string(), "storage failed: Bucket not found");
    }

    #[test]
    fn validation_errors_display_verbatim() {
        let err: CatalogError = ValidationError::NoImages.into();
        assert_eq!(err.to_string(), "add at least one image before saving");
    }
}

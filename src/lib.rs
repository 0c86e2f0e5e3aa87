//! Real-estate listing catalog: filtering for visitors, image staging and
//! listing commits for the admin, over a hosted listing store.

pub mod admin;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod staging;
pub mod store;

pub use error::{CatalogError, Result, ValidationError};

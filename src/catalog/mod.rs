pub mod filter;
pub mod gallery;
pub mod present;

pub use filter::{
    apply_filters, distinct_bedroom_counts, distinct_neighborhoods, parse_optional_number,
    FilterEngine, FilterState,
};
pub use gallery::{gallery_urls, GalleryCursor, Lightbox, LightboxKey};

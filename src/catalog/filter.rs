use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::present::collation_key;
use crate::models::{Listing, PropertyType};

/// Active catalog filters.
///
/// An empty set places no restriction on its dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub types: BTreeSet<PropertyType>,
    pub neighborhoods: BTreeSet<String>,
    pub bedrooms: BTreeSet<u32>,
}

impl FilterState {
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&listing.property_type) {
            return false;
        }
        if !self.neighborhoods.is_empty() && !self.neighborhoods.contains(&listing.neighborhood) {
            return false;
        }
        if !self.bedrooms.is_empty() && !self.bedrooms.contains(&listing.bedrooms) {
            return false;
        }
        true
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a free-text numeric input; anything unusable means "unset"
pub fn parse_optional_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Listings that pass every filter, in their original order
pub fn apply_filters(listings: &[Listing], filters: &FilterState) -> Vec<Listing> {
    listings
        .iter()
        .filter(|listing| filters.matches(listing))
        .cloned()
        .collect()
}

/// Non-empty neighborhoods, deduplicated, in Portuguese collation order
pub fn distinct_neighborhoods(listings: &[Listing]) -> Vec<String> {
    let unique: BTreeSet<&str> = listings
        .iter()
        .map(|l| l.neighborhood.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    let mut values: Vec<String> = unique.into_iter().map(str::to_string).collect();
    values.sort_by_cached_key(|v| (collation_key(v), v.clone()));
    values
}

/// Observed bedroom counts, ascending
pub fn distinct_bedroom_counts(listings: &[Listing]) -> Vec<u32> {
    listings
        .iter()
        .map(|l| l.bedrooms)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Holds the loaded listings, the active filters and the derived views
#[derive(Debug, Default)]
pub struct FilterEngine {
    listings: Vec<Listing>,
    filters: FilterState,
    visible: Vec<Listing>,
    neighborhood_options: Vec<String>,
    bedroom_options: Vec<u32>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn find(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id)
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn visible(&self) -> &[Listing] {
        &self.visible
    }

    pub fn neighborhood_options(&self) -> &[String] {
        &self.neighborhood_options
    }

    pub fn bedroom_options(&self) -> &[u32] {
        &self.bedroom_options
    }

    /// Swap in a fresh listing collection.
    ///
    /// Option lists are rebuilt from the new data and any selected
    /// neighborhood or bedroom value that no longer exists is dropped.
    pub fn replace_listings(&mut self, listings: Vec<Listing>) {
        self.listings = listings;
        self.neighborhood_options = distinct_neighborhoods(&self.listings);
        self.bedroom_options = distinct_bedroom_counts(&self.listings);

        let before = (self.filters.neighborhoods.len(), self.filters.bedrooms.len());
        let options = &self.neighborhood_options;
        self.filters.neighborhoods.retain(|n| options.contains(n));
        let options = &self.bedroom_options;
        self.filters.bedrooms.retain(|b| options.contains(b));
        let after = (self.filters.neighborhoods.len(), self.filters.bedrooms.len());
        if before != after {
            debug!(
                "Dropped stale filter values: {} neighborhood(s), {} bedroom count(s)",
                before.0 - after.0,
                before.1 - after.1
            );
        }

        self.recompute();
    }

    /// Replace every filter at once
    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.recompute();
    }

    pub fn set_price_range(&mut self, min: Option<f64>, max: Option<f64>) {
        self.filters.min_price = min;
        self.filters.max_price = max;
        self.recompute();
    }

    /// Set the price range from raw text inputs
    pub fn set_price_inputs(&mut self, min: &str, max: &str) {
        self.set_price_range(parse_optional_number(min), parse_optional_number(max));
    }

    pub fn toggle_type(&mut self, property_type: PropertyType, checked: bool) {
        if checked {
            self.filters.types.insert(property_type);
        } else {
            self.filters.types.remove(&property_type);
        }
        self.recompute();
    }

    pub fn toggle_neighborhood(&mut self, neighborhood: &str, checked: bool) {
        if checked {
            self.filters.neighborhoods.insert(neighborhood.to_string());
        } else {
            self.filters.neighborhoods.remove(neighborhood);
        }
        self.recompute();
    }

    pub fn toggle_bedrooms(&mut self, bedrooms: u32, checked: bool) {
        if checked {
            self.filters.bedrooms.insert(bedrooms);
        } else {
            self.filters.bedrooms.remove(&bedrooms);
        }
        self.recompute();
    }

    pub fn clear(&mut self) {
        self.filters = FilterState::default();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.visible = apply_filters(&self.listings, &self.filters);
    }
}

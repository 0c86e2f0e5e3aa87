use std::collections::BTreeSet;

use proptest::prelude::*;

use listing_catalog::catalog::{apply_filters, FilterEngine, FilterState};
use listing_catalog::models::{Listing, PropertyType, PROPERTY_TYPES};

const HOODS: [&str; 5] = ["Centro", "Norte", "Água Verde", "Batel", ""];

fn listing_strategy() -> impl Strategy<Value = Listing> {
    (
        0u32..10_000,
        0usize..PROPERTY_TYPES.len(),
        0usize..HOODS.len(),
        0u32..6,
    )
        .prop_map(|(price, t, hood, bedrooms)| Listing {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            price: f64::from(price),
            neighborhood: HOODS[hood].to_string(),
            location: String::new(),
            property_type: PROPERTY_TYPES[t],
            bedrooms,
            whatsapp: String::new(),
            image_paths: vec![],
            cover_image: None,
            created_at: None,
        })
}

fn listings_strategy() -> impl Strategy<Value = Vec<Listing>> {
    prop::collection::vec(listing_strategy(), 0..40).prop_map(|mut all| {
        for (i, listing) in all.iter_mut().enumerate() {
            listing.id = format!("l{i}");
        }
        all
    })
}

fn filter_strategy() -> impl Strategy<Value = FilterState> {
    (
        prop::option::of(0u32..10_000),
        prop::option::of(0u32..10_000),
        prop::collection::btree_set(0usize..PROPERTY_TYPES.len(), 0..3),
        prop::collection::btree_set(0usize..HOODS.len(), 0..3),
        prop::collection::btree_set(0u32..6, 0..3),
    )
        .prop_map(|(min, max, types, hoods, bedrooms)| FilterState {
            min_price: min.map(f64::from),
            max_price: max.map(f64::from),
            types: types.into_iter().map(|i| PROPERTY_TYPES[i]).collect(),
            neighborhoods: hoods.into_iter().map(|i| HOODS[i].to_string()).collect(),
            bedrooms,
        })
}

fn is_subsequence(needle: &[Listing], haystack: &[Listing]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|n| rest.any(|h| h.id == n.id))
}

proptest! {
    #[test]
    fn output_is_an_ordered_subsequence_of_matches(all in listings_strategy(), filters in filter_strategy()) {
        let out = apply_filters(&all, &filters);
        prop_assert!(is_subsequence(&out, &all));
        for listing in &out {
            prop_assert!(filters.min_price.map_or(true, |m| listing.price >= m));
            prop_assert!(filters.max_price.map_or(true, |m| listing.price <= m));
            prop_assert!(filters.types.is_empty() || filters.types.contains(&listing.property_type));
            prop_assert!(filters.neighborhoods.is_empty() || filters.neighborhoods.contains(&listing.neighborhood));
            prop_assert!(filters.bedrooms.is_empty() || filters.bedrooms.contains(&listing.bedrooms));
        }
        let excluded = all.iter().filter(|l| !out.iter().any(|o| o.id == l.id));
        for listing in excluded {
            prop_assert!(!filters.matches(listing));
        }
    }

    #[test]
    fn filtering_is_idempotent(all in listings_strategy(), filters in filter_strategy()) {
        let once = apply_filters(&all, &filters);
        let twice = apply_filters(&once, &filters);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn empty_type_set_never_excludes_on_type(all in listings_strategy(), filters in filter_strategy()) {
        let unrestricted = FilterState { types: BTreeSet::new(), ..filters.clone() };
        let every_type = FilterState { types: PROPERTY_TYPES.into_iter().collect(), ..filters };
        prop_assert_eq!(apply_filters(&all, &unrestricted), apply_filters(&all, &every_type));
    }

    #[test]
    fn selections_never_outlive_their_options(
        first in listings_strategy(),
        second in listings_strategy(),
        picks in prop::collection::vec(0usize..HOODS.len(), 0..4),
    ) {
        let mut engine = FilterEngine::new();
        engine.replace_listings(first);
        for i in picks {
            engine.toggle_neighborhood(HOODS[i], true);
        }
        engine.replace_listings(second);
        for hood in &engine.filters().neighborhoods {
            prop_assert!(engine.neighborhood_options().contains(hood));
        }
        for bedrooms in &engine.filters().bedrooms {
            prop_assert!(engine.bedroom_options().contains(bedrooms));
        }
        let expected = apply_filters(engine.listings(), engine.filters());
        prop_assert_eq!(engine.visible(), expected.as_slice());
    }
}

#[test]
fn min_price_example() {
    let mut engine = FilterEngine::new();
    engine.replace_listings(vec![
        Listing {
            id: "1".into(),
            title: "Casa".into(),
            description: String::new(),
            price: 1000.0,
            neighborhood: "Centro".into(),
            location: String::new(),
            property_type: PropertyType::Casa,
            bedrooms: 2,
            whatsapp: String::new(),
            image_paths: vec![],
            cover_image: None,
            created_at: None,
        },
        Listing {
            id: "2".into(),
            title: "Apartamento".into(),
            description: String::new(),
            price: 5000.0,
            neighborhood: "Norte".into(),
            location: String::new(),
            property_type: PropertyType::Apartamento,
            bedrooms: 3,
            whatsapp: String::new(),
            image_paths: vec![],
            cover_image: None,
            created_at: None,
        },
    ]);
    engine.set_price_inputs("2000", "not a number");
    let ids: Vec<&str> = engine.visible().iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["2"]);
    assert_eq!(engine.filters().max_price, None);
}

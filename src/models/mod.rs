use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::ValidationError;

/// Kind of property a listing advertises
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Casa,
    Apartamento,
    Kitnet,
    Terreno,
    Loja,
}

/// All property types, in the order the type filter offers them
pub const PROPERTY_TYPES: [PropertyType; 5] = [
    PropertyType::Casa,
    PropertyType::Apartamento,
    PropertyType::Kitnet,
    PropertyType::Terreno,
    PropertyType::Loja,
];

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casa => "casa",
            Self::Apartamento => "apartamento",
            Self::Kitnet => "kitnet",
            Self::Terreno => "terreno",
            Self::Loja => "loja",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PROPERTY_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidType(s.to_string()))
    }
}

/// Core listing data model, shaped like a row of the `properties` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub neighborhood: String,
    pub location: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub bedrooms: u32,
    pub whatsapp: String,
    pub image_paths: Vec<String>,
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Build a listing from validated form fields and its resolved images
    pub fn from_fields(
        id: impl Into<String>,
        fields: &ListingFields,
        image_paths: Vec<String>,
        cover_image: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: fields.title.clone(),
            description: fields.description.clone(),
            price: fields.price,
            neighborhood: fields.neighborhood.clone(),
            location: fields.location.clone(),
            property_type: fields.property_type,
            bedrooms: fields.bedrooms,
            whatsapp: fields.whatsapp.clone(),
            image_paths,
            cover_image,
            created_at: None,
        }
    }
}

/// Normalize a raw store row into a `Listing`.
///
/// Missing or malformed columns fall back to neutral defaults. Rows from
/// older schemas that stored images under `images` are still accepted.
/// Returns `None` only when the row carries a property type outside the
/// known set.
pub fn normalize_row(row: &Value) -> Option<Listing> {
    let mut image_paths: Vec<String> = Vec::new();
    let raw_paths = row
        .get("image_paths")
        .and_then(Value::as_array)
        .or_else(|| row.get("images").and_then(Value::as_array));
    for path in raw_paths.into_iter().flatten().filter_map(Value::as_str) {
        // Paths form an ordered set; keep the first occurrence only.
        if !path.is_empty() && !image_paths.iter().any(|p| p == path) {
            image_paths.push(path.to_string());
        }
    }

    let raw_type = string_column(row, "type");
    let property_type = match raw_type.parse::<PropertyType>() {
        Ok(t) => t,
        Err(_) => {
            warn!("Skipping listing {:?} with unknown type {:?}", row.get("id"), raw_type);
            return None;
        }
    };

    let cover_image = match row.get("cover_image").and_then(Value::as_str) {
        Some(cover) if image_paths.iter().any(|p| p == cover) => Some(cover.to_string()),
        Some(cover) if !cover.is_empty() => {
            debug!("Cover {} is not among the listing images, using the first one", cover);
            image_paths.first().cloned()
        }
        _ => image_paths.first().cloned(),
    };

    let title = string_column(row, "title");

    Some(Listing {
        id: match row.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        },
        title: if title.is_empty() { "Sem titulo".to_string() } else { title },
        description: string_column(row, "description"),
        price: number_column(row, "price").max(0.0),
        neighborhood: string_column(row, "neighborhood"),
        location: string_column(row, "location"),
        property_type,
        bedrooms: number_column(row, "bedrooms").max(0.0) as u32,
        whatsapp: string_column(row, "whatsapp"),
        image_paths,
        cover_image,
        created_at: row
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// Normalize every row, dropping those that cannot be represented
pub fn normalize_rows(rows: &[Value]) -> Vec<Listing> {
    rows.iter().filter_map(normalize_row).collect()
}

fn string_column(row: &Value, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number_column(row: &Value, key: &str) -> f64 {
    let parsed = match row.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Raw admin form input, as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: String,
    pub bedrooms: String,
    pub neighborhood: String,
    pub location: String,
    pub property_type: String,
    pub whatsapp: String,
}

/// Form input after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub bedrooms: u32,
    pub neighborhood: String,
    pub location: String,
    pub property_type: PropertyType,
    pub whatsapp: String,
}

impl ListingDraft {
    /// Prefill the form from a stored listing
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price.to_string(),
            bedrooms: listing.bedrooms.to_string(),
            neighborhood: listing.neighborhood.clone(),
            location: listing.location.clone(),
            property_type: listing.property_type.to_string(),
            whatsapp: listing.whatsapp.clone(),
        }
    }

    pub fn validate(&self) -> Result<ListingFields, ValidationError> {
        let required = [
            ("title", &self.title),
            ("description", &self.description),
            ("neighborhood", &self.neighborhood),
            ("location", &self.location),
            ("type", &self.property_type),
            ("whatsapp", &self.whatsapp),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(name));
            }
        }

        let property_type = self.property_type.parse::<PropertyType>()?;

        let price = self
            .price
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or_else(|| ValidationError::InvalidPrice(self.price.clone()))?;

        let bedrooms = self
            .bedrooms
            .trim()
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidBedrooms(self.bedrooms.clone()))?;

        Ok(ListingFields {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            price,
            bedrooms,
            neighborhood: self.neighborhood.trim().to_string(),
            location: self.location.trim().to_string(),
            property_type,
            whatsapp: self.whatsapp.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> ListingDraft {
        ListingDraft {
            title: " Casa no Centro ".into(),
            description: "Ampla".into(),
            price: "350000".into(),
            bedrooms: "3".into(),
            neighborhood: "Centro".into(),
            location: "Rua A, 10".into(),
            property_type: "Casa".into(),
            whatsapp: "(11) 99999-0000".into(),
        }
    }

    #[test]
    fn property_type_parses_case_insensitively() {
        assert_eq!(" APARTAMENTO ".parse::<PropertyType>(), Ok(PropertyType::Apartamento));
        assert!(matches!(
            "castle".parse::<PropertyType>(),
            Err(ValidationError::InvalidType(_))
        ));
    }

    #[test]
    fn property_type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(PropertyType::Kitnet).unwrap(), json!("kitnet"));
    }

    #[test]
    fn validate_trims_and_types_fields() {
        let fields = draft().validate().unwrap();
        assert_eq!(fields.title, "Casa no Centro");
        assert_eq!(fields.property_type, PropertyType::Casa);
        assert_eq!(fields.price, 350000.0);
        assert_eq!(fields.bedrooms, 3);
    }

    #[test]
    fn validate_rejects_blank_required_fields() {
        let mut d = draft();
        d.location = "   ".into();
        assert_eq!(d.validate(), Err(ValidationError::MissingField("location")));
    }

    #[test]
    fn validate_rejects_bad_numbers() {
        let mut d = draft();
        d.price = "-1".into();
        assert!(matches!(d.validate(), Err(ValidationError::InvalidPrice(_))));

        let mut d = draft();
        d.price = "".into();
        assert!(matches!(d.validate(), Err(ValidationError::InvalidPrice(_))));

        let mut d = draft();
        d.bedrooms = "dois".into();
        assert!(matches!(d.validate(), Err(ValidationError::InvalidBedrooms(_))));
    }

    #[test]
    fn validate_rejects_unknown_type() {
        let mut d = draft();
        d.property_type = "mansao".into();
        assert_eq!(d.validate(), Err(ValidationError::InvalidType("mansao".into())));
    }

    #[test]
    fn normalize_fills_defaults() {
        let listing = normalize_row(&json!({
            "id": "abc",
            "type": "LOJA",
            "price": "not a number",
        }))
        .unwrap();
        assert_eq!(listing.title, "Sem titulo");
        assert_eq!(listing.price, 0.0);
        assert_eq!(listing.bedrooms, 0);
        assert_eq!(listing.property_type, PropertyType::Loja);
        assert!(listing.image_paths.is_empty());
        assert_eq!(listing.cover_image, None);
    }

    #[test]
    fn normalize_accepts_legacy_images_column() {
        let listing = normalize_row(&json!({
            "id": "abc",
            "type": "casa",
            "images": ["a.jpg", "b.jpg"],
        }))
        .unwrap();
        assert_eq!(listing.image_paths, vec!["a.jpg", "b.jpg"]);
        assert_eq!(listing.cover_image.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn normalize_keeps_cover_only_when_it_is_an_image() {
        let row = json!({
            "id": "abc",
            "type": "casa",
            "image_paths": ["a.jpg", "b.jpg"],
            "cover_image": "b.jpg",
        });
        assert_eq!(normalize_row(&row).unwrap().cover_image.as_deref(), Some("b.jpg"));

        let row = json!({
            "id": "abc",
            "type": "casa",
            "image_paths": ["a.jpg", "b.jpg"],
            "cover_image": "gone.jpg",
        });
        assert_eq!(normalize_row(&row).unwrap().cover_image.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn normalize_drops_repeated_paths() {
        let listing = normalize_row(&json!({
            "id": "abc",
            "type": "casa",
            "image_paths": ["b.jpg", "a.jpg", "b.jpg", "", "a.jpg"],
        }))
        .unwrap();
        assert_eq!(listing.image_paths, vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn normalize_skips_unknown_types() {
        assert!(normalize_row(&json!({"id": "x", "type": "castelo"})).is_none());
    }

    #[test]
    fn listing_serializes_to_row_shape() {
        let listing = normalize_row(&json!({
            "id": "abc",
            "type": "casa",
            "image_paths": ["a.jpg"],
        }))
        .unwrap();
        let row = serde_json::to_value(&listing).unwrap();
        assert_eq!(row["type"], json!("casa"));
        assert_eq!(row["cover_image"], json!("a.jpg"));
        assert!(row.get("created_at").is_none());
    }
}

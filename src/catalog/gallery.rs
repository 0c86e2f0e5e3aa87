use super::present::escape_html;
use crate::models::Listing;

/// Minimum horizontal travel, in pixels, for a swipe on a catalog card
pub const CARD_SWIPE_THRESHOLD: f32 = 35.0;

/// Minimum horizontal travel, in pixels, for a swipe inside the lightbox
pub const LIGHTBOX_SWIPE_THRESHOLD: f32 = 40.0;

const PLACEHOLDER_LABEL: &str = "Sem imagem";

/// Resolve a stored path to a displayable URL; full URLs pass through
pub fn image_url(path: &str, public_url: impl Fn(&str) -> String) -> String {
    if path.is_empty() {
        return placeholder_image(PLACEHOLDER_LABEL);
    }
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return path.to_string();
    }
    public_url(path)
}

/// Image URLs for a listing card: cover first, no duplicates, never empty
pub fn gallery_urls(listing: &Listing, public_url: impl Fn(&str) -> String) -> Vec<String> {
    let mut ordered: Vec<&str> = Vec::with_capacity(listing.image_paths.len() + 1);
    if let Some(cover) = listing.cover_image.as_deref().filter(|c| !c.is_empty()) {
        ordered.push(cover);
    }
    for path in &listing.image_paths {
        if !path.is_empty() && !ordered.contains(&path.as_str()) {
            ordered.push(path);
        }
    }

    if ordered.is_empty() {
        return vec![placeholder_image(&listing.title)];
    }
    ordered
        .into_iter()
        .map(|path| image_url(path, &public_url))
        .collect()
}

// Same unreserved set as JavaScript's encodeURIComponent. `Url` serializers
// would turn spaces into `+`, which an SVG data URI shows literally.
fn encode_uri_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*'
            | b'\'' | b'(' | b')' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Inline SVG data URI shown when a listing has no images
pub fn placeholder_image(label: &str) -> String {
    let label = if label.is_empty() { PLACEHOLDER_LABEL } else { label };
    format!(
        "data:image/svg+xml;charset=UTF-8,%3Csvg xmlns='http://www.w3.org/2000/svg' width='640' height='420'%3E\
%3Cdefs%3E%3ClinearGradient id='g' x1='0' y1='0' x2='1' y2='1'%3E\
%3Cstop stop-color='%230f8f8d' offset='0'/%3E%3Cstop stop-color='%23e67e22' offset='1'/%3E\
%3C/linearGradient%3E%3C/defs%3E%3Crect width='640' height='420' fill='url(%23g)'/%3E\
%3Ctext x='50%25' y='50%25' dominant-baseline='middle' text-anchor='middle' fill='white' \
font-family='Outfit,sans-serif' font-size='30'%3E{}%3C/text%3E%3C/svg%3E",
        encode_uri_component(&escape_html(label))
    )
}

/// Position within a card's image list, wrapping at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryCursor {
    len: usize,
    index: usize,
}

impl GalleryCursor {
    pub fn new(len: usize) -> Self {
        Self { len, index: 0 }
    }

    /// Start at `index`, clamped into range
    pub fn starting_at(len: usize, index: usize) -> Self {
        Self {
            len,
            index: index.min(len.saturating_sub(1)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Navigation controls only make sense with more than one image
    pub fn can_navigate(&self) -> bool {
        self.len > 1
    }

    pub fn next(&mut self) {
        if self.can_navigate() {
            self.index = (self.index + 1) % self.len;
        }
    }

    pub fn prev(&mut self) {
        if self.can_navigate() {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    /// Apply a horizontal swipe; returns whether it moved the cursor
    pub fn swipe(&mut self, start_x: f32, end_x: f32, threshold: f32) -> bool {
        let delta = end_x - start_x;
        if !self.can_navigate() || delta.abs() < threshold {
            return false;
        }
        if delta < 0.0 {
            self.next();
        } else {
            self.prev();
        }
        true
    }

    /// Counter such as `2/5`
    pub fn label(&self) -> String {
        format!("{}/{}", self.index + 1, self.len)
    }

    pub fn alt_text(&self, title: &str) -> String {
        format!("Foto {} de {} de {}", self.index + 1, self.len, title)
    }
}

/// Keys the lightbox reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightboxKey {
    Escape,
    ArrowLeft,
    ArrowRight,
    Other,
}

/// Full-screen image viewer opened from a card
#[derive(Debug, Clone, Default)]
pub struct Lightbox {
    images: Vec<String>,
    cursor: Option<GalleryCursor>,
    title: String,
    open: bool,
}

impl Lightbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, images: Vec<String>, start: usize, title: &str) {
        self.cursor = Some(GalleryCursor::starting_at(images.len(), start));
        self.images = images;
        self.title = if title.is_empty() {
            "Imagem do imovel".to_string()
        } else {
            title.to_string()
        };
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn current(&self) -> Option<&str> {
        let cursor = self.cursor?;
        self.images.get(cursor.index()).map(String::as_str)
    }

    /// `i/n` counter, hidden for single images
    pub fn count_label(&self) -> Option<String> {
        self.cursor
            .filter(GalleryCursor::can_navigate)
            .map(|c| c.label())
    }

    pub fn next(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.next();
        }
    }

    pub fn prev(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.prev();
        }
    }

    /// Keyboard handling; ignored while closed
    pub fn handle_key(&mut self, key: LightboxKey) {
        if !self.open {
            return;
        }
        match key {
            LightboxKey::Escape => self.close(),
            LightboxKey::ArrowLeft => self.prev(),
            LightboxKey::ArrowRight => self.next(),
            LightboxKey::Other => {}
        }
    }

    pub fn swipe(&mut self, start_x: f32, end_x: f32) -> bool {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.swipe(start_x, end_x, LIGHTBOX_SWIPE_THRESHOLD),
            None => false,
        }
    }
}

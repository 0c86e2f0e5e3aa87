//! Text formatting for catalog cards and the admin list.

use reqwest::Url;

use crate::models::{Listing, PropertyType};

/// Longest description shown on a card before truncation
pub const DESCRIPTION_LIMIT: usize = 140;

/// Replace accented Latin letters with their base letter.
///
/// Covers the Latin-1 Supplement and Latin Extended-A blocks. Letters
/// outside them (Vietnamese stacked marks, for instance) are kept as is.
pub fn fold_diacritics(value: &str) -> String {
    value.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'À'..='Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'ď' | 'đ' => 'd',
        'Ď' | 'Đ' => 'D',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'È'..='Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'ĥ' | 'ħ' => 'h',
        'Ĥ' | 'Ħ' => 'H',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'Ì'..='Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
        'ĵ' => 'j',
        'Ĵ' => 'J',
        'ķ' => 'k',
        'Ķ' => 'K',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => 'L',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'Ò'..='Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'Ŕ' | 'Ŗ' | 'Ř' => 'R',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'ţ' | 'ť' | 'ŧ' => 't',
        'Ţ' | 'Ť' | 'Ŧ' => 'T',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'Ù'..='Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ŵ' => 'w',
        'Ŵ' => 'W',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'Ý' | 'Ŷ' | 'Ÿ' => 'Y',
        'ź' | 'ż' | 'ž' => 'z',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        other => other,
    }
}

/// Sort key approximating Portuguese collation: accents and case are ignored
pub fn collation_key(value: &str) -> String {
    fold_diacritics(value).to_lowercase()
}

/// Format a price as Brazilian reais without cents, e.g. `R$ 350.000`
pub fn format_currency(value: f64) -> String {
    let value = if value.is_finite() { value.round() } else { 0.0 };
    let digits = format!("{}", value.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}R$\u{a0}{}", sign, grouped)
}

pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn type_label(property_type: PropertyType) -> String {
    capitalize(property_type.as_str())
}

pub fn bedrooms_label(bedrooms: u32) -> String {
    format!("{} quarto(s)", bedrooms)
}

pub fn results_label(count: usize) -> String {
    format!("{} resultado(s)", count)
}

/// Cut `text` to `limit` characters, marking the cut with `...`
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}...", head.trim())
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// "Bairro - Endereço" line under the card title
pub fn location_line(listing: &Listing) -> String {
    format!("{} - {}", listing.neighborhood, listing.location)
}

/// Summary shown next to each listing in the admin list
pub fn admin_meta_line(listing: &Listing) -> String {
    format!(
        "{} | {} | {}",
        type_label(listing.property_type),
        bedrooms_label(listing.bedrooms),
        format_currency(listing.price)
    )
}

/// wa.me link with a prefilled enquiry, or `None` when there is no phone
pub fn whatsapp_link(listing: &Listing) -> Option<String> {
    let phone: String = listing
        .whatsapp
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if phone.is_empty() {
        return None;
    }

    let message = [
        "Ola! Tenho interesse no imovel:".to_string(),
        listing.title.clone(),
        format!("Bairro: {}", listing.neighborhood),
        format!("Valor: {}", format_currency(listing.price)),
        "Pode me passar mais detalhes?".to_string(),
    ]
    .join("\n");

    let base = format!("https://wa.me/{}", phone);
    Url::parse_with_params(&base, &[("text", message)])
        .ok()
        .map(String::from)
}

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{CatalogError, Result};

/// A file the admin attached to the form, not yet uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let content_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Bounds and quality used when shrinking images before upload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CompressionOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`
    pub quality: f32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: 1600,
            max_height: 1600,
            quality: 0.82,
        }
    }
}

/// Output of `compress`, ready to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CompressedImage {
    pub const CONTENT_TYPE: &'static str = "image/jpeg";
    pub const EXTENSION: &'static str = "jpg";
}

/// Uniform scale that fits the image inside the bounds; never upscales
pub fn scale_factor(width: u32, height: u32, options: &CompressionOptions) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    (options.max_width as f64 / width as f64)
        .min(options.max_height as f64 / height as f64)
        .min(1.0)
}

pub fn target_dimensions(width: u32, height: u32, options: &CompressionOptions) -> (u32, u32) {
    let ratio = scale_factor(width, height, options);
    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Decode, shrink to fit and re-encode an attached image
pub fn compress(file: &LocalFile, options: &CompressionOptions) -> Result<CompressedImage> {
    let img = image::load_from_memory(&file.bytes).map_err(|e| CatalogError::ImageDecode {
        name: file.name.clone(),
        reason: e.to_string(),
    })?;

    let (width, height) = target_dimensions(img.width(), img.height(), options);
    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    let quality = (options.quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    DynamicImage::ImageRgb8(resized.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| CatalogError::Compression {
            name: file.name.clone(),
            reason: e.to_string(),
        })?;

    if bytes.is_empty() {
        return Err(CatalogError::Compression {
            name: file.name.clone(),
            reason: "encoder produced no output".to_string(),
        });
    }

    debug!(
        "Compressed {} to {}x{} ({} -> {} bytes)",
        file.name,
        width,
        height,
        file.bytes.len(),
        bytes.len()
    );

    Ok(CompressedImage {
        bytes,
        width,
        height,
    })
}

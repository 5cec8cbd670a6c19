//! Raster image element.

use super::{ElementBase, ElementTrait};
use crate::cache::ByteCache;
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Image format for stored image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }
        None
    }
}

/// Where the pixel payload of an image lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// Bytes carried on the element itself, base64 encoded.
    Inline { data_base64: String },
    /// Bytes held in the document's byte cache.
    Cached { key: String },
}

/// A placed raster image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(flatten)]
    pub base: ElementBase,
    /// Unscaled display width.
    pub width: f64,
    /// Unscaled display height.
    pub height: f64,
    /// Pixel width of the decoded source.
    pub source_width: u32,
    /// Pixel height of the decoded source.
    pub source_height: u32,
    pub format: ImageFormat,
    pub source: ImageSource,
}

impl Image {
    /// Create an image carrying its bytes inline.
    /// Display size starts at the source pixel size.
    pub fn new(
        position: Point,
        data: &[u8],
        source_width: u32,
        source_height: u32,
        format: ImageFormat,
    ) -> Self {
        Self::with_source(
            position,
            ImageSource::Inline {
                data_base64: STANDARD.encode(data),
            },
            source_width,
            source_height,
            format,
        )
    }

    /// Create an image whose bytes already live in a cache.
    pub fn from_cache(
        position: Point,
        key: impl Into<String>,
        source_width: u32,
        source_height: u32,
        format: ImageFormat,
    ) -> Self {
        Self::with_source(
            position,
            ImageSource::Cached { key: key.into() },
            source_width,
            source_height,
            format,
        )
    }

    fn with_source(
        position: Point,
        source: ImageSource,
        source_width: u32,
        source_height: u32,
        format: ImageFormat,
    ) -> Self {
        Self {
            base: ElementBase::new(position),
            width: source_width as f64,
            height: source_height as f64,
            source_width,
            source_height,
            format,
            source,
        }
    }

    /// Set the display dimensions.
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Scale the image to fit within max dimensions while preserving aspect ratio.
    pub fn fit_within(mut self, max_width: f64, max_height: f64) -> Self {
        if self.source_width == 0 || self.source_height == 0 {
            return self;
        }
        let aspect = self.source_width as f64 / self.source_height as f64;
        let target_aspect = max_width / max_height;

        if aspect > target_aspect {
            self.width = max_width;
            self.height = max_width / aspect;
        } else {
            self.height = max_height;
            self.width = max_height * aspect;
        }
        self
    }

    /// Cache key, if the bytes are held by reference.
    pub fn cache_key(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Cached { key } => Some(key),
            ImageSource::Inline { .. } => None,
        }
    }

    /// Resolve the raw bytes, decoding inline data or reading the cache.
    pub fn data(&self, cache: &dyn ByteCache) -> Option<Vec<u8>> {
        match &self.source {
            ImageSource::Inline { data_base64 } => STANDARD.decode(data_base64).ok(),
            ImageSource::Cached { key } => cache.get(key),
        }
    }

    /// Move inline bytes into the cache and reference them by key.
    /// Returns the key. Already cached images are left untouched.
    pub fn share_source(&mut self, cache: &dyn ByteCache) -> Option<String> {
        match &self.source {
            ImageSource::Cached { key } => Some(key.clone()),
            ImageSource::Inline { data_base64 } => {
                let bytes = match STANDARD.decode(data_base64) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        log::warn!("image {} carries undecodable inline data: {err}", self.base.id);
                        return None;
                    }
                };
                let key = cache.insert(bytes);
                self.source = ImageSource::Cached { key: key.clone() };
                Some(key)
            }
        }
    }

    /// Replace a cache reference with inline bytes. Returns false when the
    /// cache cannot provide them.
    pub fn inline_source(&mut self, cache: &dyn ByteCache) -> bool {
        match &self.source {
            ImageSource::Inline { .. } => true,
            ImageSource::Cached { key } => match cache.get(key) {
                Some(bytes) => {
                    self.source = ImageSource::Inline {
                        data_base64: STANDARD.encode(bytes),
                    };
                    true
                }
                None => false,
            },
        }
    }

    /// Approximate payload size in bytes when held inline.
    pub fn inline_size(&self) -> usize {
        match &self.source {
            ImageSource::Inline { data_base64 } => data_base64.len() * 3 / 4,
            ImageSource::Cached { .. } => 0,
        }
    }
}

impl ElementTrait for Image {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn intrinsic_size(&self) -> Option<Size> {
        Some(Size::new(self.width, self.height))
    }

    fn set_intrinsic_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }
}

//! Portable document form.
//!
//! A [`PortableDocument`] is plain data: numbers, strings and nested arrays.
//! Image bytes are carried inline only when the receiving side could not
//! otherwise recover them, which keeps saved documents small.

use crate::cache::{ByteCache, content_key};
use crate::canvas::{CanvasDocument, DocumentSettings};
use crate::config::EngineConfig;
use crate::elements::{Element, ElementId, Image, ImageSource};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Current version of the portable form.
pub const FORMAT_VERSION: u32 = 1;

fn default_version() -> u32 {
    FORMAT_VERSION
}

/// Errors reading or writing the portable form.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported document version {0}")]
    UnsupportedVersion(u32),
}

/// When image bytes are written into the portable form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineMode {
    /// Reference bytes by cache key, inlining only those the cache lacks.
    #[default]
    WhenMissing,
    /// Inline every image so the document stands alone.
    Always,
}

/// Serializable snapshot of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub settings: DocumentSettings,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl PortableDocument {
    /// Capture a document's elements in portable form.
    pub fn export(doc: &CanvasDocument, mode: InlineMode) -> Self {
        let mut elements = doc.elements().to_vec();
        let cache = doc.cache().as_ref();
        for element in &mut elements {
            for_each_image(element, &mut |image| prepare_image(image, cache, mode));
        }
        Self {
            version: FORMAT_VERSION,
            id: doc.id.clone(),
            name: doc.name.clone(),
            settings: doc.settings.clone(),
            elements,
        }
    }

    /// Capture only the given top-level elements, e.g. for a clipboard.
    /// Images are always inlined.
    pub fn export_selection(doc: &CanvasDocument, ids: &[ElementId]) -> Self {
        let mut portable = Self::export(doc, InlineMode::Always);
        portable.elements.retain(|e| ids.contains(&e.id()));
        portable
    }

    /// Rebuild an editable document. Inline image bytes move into `cache` and
    /// are referenced by key from then on.
    pub fn into_document(
        self,
        cache: Arc<dyn ByteCache>,
        config: EngineConfig,
    ) -> CanvasDocument {
        let mut elements = self.elements;
        for element in &mut elements {
            for_each_image(element, &mut |image| {
                image.share_source(cache.as_ref());
            });
        }
        let mut doc = CanvasDocument::with_cache(self.settings, cache, config);
        doc.id = self.id;
        doc.name = self.name;
        doc.load_elements(elements);
        doc
    }

    /// Images whose bytes are neither inline nor held by `cache`.
    pub fn unresolved_images(&self, cache: &dyn ByteCache) -> Vec<ElementId> {
        let mut images = Vec::new();
        for element in &self.elements {
            collect_images(element, &mut images);
        }
        images
            .into_iter()
            .filter(|image| {
                matches!(&image.source, ImageSource::Cached { key } if !cache.contains(key))
            })
            .map(|image| image.base.id)
            .collect()
    }

    /// Move every inline image payload into `blobs` and reference it by
    /// key. Returns how many images were moved.
    pub fn share_images(&mut self, blobs: &dyn ByteCache) -> usize {
        let mut moved = 0;
        for element in &mut self.elements {
            for_each_image(element, &mut |image| {
                if image.cache_key().is_none() && image.share_source(blobs).is_some() {
                    moved += 1;
                }
            });
        }
        moved
    }

    /// Inline every cached image from `blobs` so the document stands alone.
    /// Returns the images whose bytes `blobs` does not hold.
    pub fn inline_images(&mut self, blobs: &dyn ByteCache) -> Vec<ElementId> {
        let mut missing = Vec::new();
        for element in &mut self.elements {
            for_each_image(element, &mut |image| {
                if !image.inline_source(blobs) {
                    missing.push(image.base.id);
                }
            });
        }
        missing
    }

    /// Cache keys referenced by this document, without repeats.
    pub fn image_keys(&self) -> Vec<String> {
        let mut images = Vec::new();
        for element in &self.elements {
            collect_images(element, &mut images);
        }
        let mut keys: Vec<String> = images
            .into_iter()
            .filter_map(|image| image.cache_key().map(str::to_owned))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON. Geometry is sanitized on the way in.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let mut doc: Self = serde_json::from_str(json)?;
        if doc.version > FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(doc.version));
        }
        crate::elements::sanitize_elements(&mut doc.elements);
        Ok(doc)
    }
}

fn for_each_image(element: &mut Element, f: &mut dyn FnMut(&mut Image)) {
    match element {
        Element::Image(image) => f(image),
        Element::Group(group) => {
            for child in &mut group.children {
                for_each_image(child, f);
            }
        }
        _ => {}
    }
}

fn collect_images<'a>(element: &'a Element, out: &mut Vec<&'a Image>) {
    match element {
        Element::Image(image) => out.push(image),
        Element::Group(group) => {
            for child in &group.children {
                collect_images(child, out);
            }
        }
        _ => {}
    }
}

fn prepare_image(image: &mut Image, cache: &dyn ByteCache, mode: InlineMode) {
    match mode {
        InlineMode::Always => {
            if !image.inline_source(cache) {
                log::warn!(
                    "bytes for image {} are not in the cache, keeping reference",
                    image.base.id
                );
            }
        }
        InlineMode::WhenMissing => match &image.source {
            ImageSource::Inline { data_base64 } => {
                // Bytes the cache already holds travel as a key.
                let Ok(bytes) = STANDARD.decode(data_base64) else {
                    return;
                };
                let key = content_key(&bytes);
                if cache.contains(&key) {
                    image.source = ImageSource::Cached { key };
                }
            }
            ImageSource::Cached { key } => {
                if !cache.contains(key) {
                    log::warn!("bytes for image {} are missing from the cache", image.base.id);
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::elements::{Group, ImageFormat, Shape, ShapeKind};
    use kurbo::Point;

    fn image(bytes: &[u8]) -> Element {
        Element::Image(Image::new(Point::new(5.0, 5.0), bytes, 4, 4, ImageFormat::Png))
    }

    fn source_of(element: &Element) -> Option<&ImageSource> {
        element.as_image().map(|i| &i.source)
    }

    #[test]
    fn test_export_references_cached_bytes() {
        let mut doc = CanvasDocument::default();
        doc.add_element(image(&[1, 2, 3]));

        let portable = PortableDocument::export(&doc, InlineMode::WhenMissing);
        assert!(matches!(
            source_of(&portable.elements[0]),
            Some(ImageSource::Cached { .. })
        ));
        assert!(portable.unresolved_images(doc.cache().as_ref()).is_empty());
    }

    #[test]
    fn test_export_always_inlines() {
        let mut doc = CanvasDocument::default();
        doc.add_element(image(&[1, 2, 3]));

        let portable = PortableDocument::export(&doc, InlineMode::Always);
        let data = portable.elements[0]
            .as_image()
            .and_then(|i| i.data(&MemoryByteCache::new()));
        assert_eq!(data, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_export_inlines_inside_groups() {
        let mut doc = CanvasDocument::default();
        let group = Group::from_absolute(vec![
            image(&[7, 7]),
            Element::Shape(Shape::new(ShapeKind::Star, Point::ZERO, 10.0, 10.0)),
        ])
        .unwrap();
        doc.add_element(Element::Group(group));

        let portable = PortableDocument::export(&doc, InlineMode::Always);
        let child = &portable.elements[0].as_group().unwrap().children[0];
        assert!(matches!(source_of(child), Some(ImageSource::Inline { .. })));
    }

    #[test]
    fn test_reload_into_fresh_cache() {
        let mut doc = CanvasDocument::default();
        doc.name = "Sheet".to_string();
        doc.add_element(image(&[9, 8, 7]));
        let json = PortableDocument::export(&doc, InlineMode::Always).to_json().unwrap();

        let cache: Arc<dyn ByteCache> = Arc::new(MemoryByteCache::new());
        let loaded = PortableDocument::from_json(&json)
            .unwrap()
            .into_document(Arc::clone(&cache), EngineConfig::default());

        assert_eq!(loaded.id, doc.id);
        assert_eq!(loaded.name, "Sheet");
        let key = loaded.elements()[0].as_image().and_then(|i| i.cache_key()).unwrap();
        assert_eq!(cache.get(key), Some(vec![9, 8, 7]));
        assert!(!loaded.can_undo());
    }

    #[test]
    fn test_unresolved_images() {
        let element =
            Element::Image(Image::from_cache(Point::ZERO, "gone", 1, 1, ImageFormat::Png));
        let id = element.id();
        let portable = PortableDocument {
            version: FORMAT_VERSION,
            id: "doc".to_string(),
            name: "Doc".to_string(),
            settings: DocumentSettings::default(),
            elements: vec![element],
        };
        assert_eq!(portable.unresolved_images(&MemoryByteCache::new()), vec![id]);
    }

    #[test]
    fn test_share_and_inline_images() {
        let mut doc = CanvasDocument::default();
        doc.add_element(image(&[1, 1]));
        doc.add_element(image(&[1, 1]));
        doc.add_element(image(&[2, 2]));
        let mut portable = PortableDocument::export(&doc, InlineMode::Always);

        let blobs = MemoryByteCache::new();
        assert_eq!(portable.share_images(&blobs), 3);
        assert_eq!(portable.image_keys().len(), 2);
        assert_eq!(blobs.len(), 2);
        assert_eq!(portable.share_images(&blobs), 0);

        assert!(portable.inline_images(&blobs).is_empty());
        assert!(portable.image_keys().is_empty());
        assert!(portable.inline_images(&MemoryByteCache::new()).is_empty());
    }

    #[test]
    fn test_inline_images_reports_missing() {
        let element =
            Element::Image(Image::from_cache(Point::ZERO, "gone", 1, 1, ImageFormat::Png));
        let id = element.id();
        let mut portable = PortableDocument {
            version: FORMAT_VERSION,
            id: "doc".to_string(),
            name: "Doc".to_string(),
            settings: DocumentSettings::default(),
            elements: vec![element],
        };
        assert_eq!(portable.inline_images(&MemoryByteCache::new()), vec![id]);
        assert_eq!(portable.image_keys(), vec!["gone".to_string()]);
    }

    #[test]
    fn test_export_selection() {
        let mut doc = CanvasDocument::default();
        let ellipse = Shape::new(ShapeKind::Ellipse, Point::ZERO, 10.0, 10.0);
        let a = doc.add_element(Element::Shape(ellipse));
        doc.add_element(Element::Shape(Shape::new(ShapeKind::Line, Point::ZERO, 10.0, 1.0)));

        let clip = PortableDocument::export_selection(&doc, &[a]);
        assert_eq!(clip.elements.len(), 1);
        assert_eq!(clip.elements[0].id(), a);
    }

    #[test]
    fn test_from_json_sanitizes_and_defaults() {
        let json = r#"{
            "id": "d1",
            "name": "Legacy",
            "elements": [
                {
                    "type": "shape",
                    "id": "6f1c1f0e-8a4b-4c55-9d0e-2b1a3c4d5e6f",
                    "kind": "rectangle",
                    "x": 1.0,
                    "y": 2.0,
                    "width": -4.0,
                    "height": 20.0
                }
            ]
        }"#;
        let doc = PortableDocument::from_json(json).unwrap();
        assert_eq!(doc.version, FORMAT_VERSION);
        assert!((doc.settings.dpi - 300.0).abs() < f64::EPSILON);
        let size = doc.elements[0].intrinsic_size().unwrap();
        assert!((size.width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_newer_version() {
        let json = r#"{"version": 99, "id": "d", "name": "n"}"#;
        assert!(matches!(
            PortableDocument::from_json(json),
            Err(PersistError::UnsupportedVersion(99))
        ));
        assert!(matches!(PortableDocument::from_json("{"), Err(PersistError::Json(_))));
    }
}

//! In-memory document library.

use super::{BoxFuture, Storage, StorageError, StorageResult, referenced_keys};
use crate::cache::MemoryByteCache;
use crate::persist::PortableDocument;
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps documents structurally, with image bytes pooled in a shared
/// content-addressed store. Two documents tiling the same artwork hold one
/// copy of its bytes.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<String, PortableDocument>>,
    blobs: MemoryByteCache,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct image payloads held.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("document library lock poisoned: {}", e))
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, document: &PortableDocument) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let mut document = document.clone();
        Box::pin(async move {
            document.share_images(&self.blobs);
            let dangling = document.unresolved_images(&self.blobs);
            if !dangling.is_empty() {
                log::warn!("document {id} stored with {} image(s) lacking bytes", dangling.len());
            }
            self.documents.write().map_err(poisoned)?.insert(id, document);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<PortableDocument>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut document = self
                .documents
                .read()
                .map_err(poisoned)?
                .get(&id)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(id.clone()))?;
            let missing = document.inline_images(&self.blobs);
            if !missing.is_empty() {
                log::warn!("document {id} has {} image(s) without stored bytes", missing.len());
            }
            Ok(document)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            self.documents.write().map_err(poisoned)?.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let mut ids: Vec<String> =
                self.documents.read().map_err(poisoned)?.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.documents.read().map_err(poisoned)?.contains_key(&id)) })
    }

    fn prune(&self) -> BoxFuture<'_, StorageResult<usize>> {
        Box::pin(async move {
            let live = referenced_keys(self.documents.read().map_err(poisoned)?.values());
            let dropped = self.blobs.retain(|key| live.contains(key));
            log::debug!("pruned {dropped} unreferenced image payload(s)");
            Ok(dropped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasDocument;
    use crate::elements::{Element, Image, ImageFormat, ImageSource, Text};
    use crate::persist::InlineMode;
    use crate::storage::block_on;
    use kurbo::Point;

    fn sheet_with_images(name: &str, payloads: &[&[u8]]) -> PortableDocument {
        let mut doc = CanvasDocument::default();
        doc.name = name.to_string();
        for bytes in payloads {
            let image = Image::new(Point::ZERO, bytes, 8, 8, ImageFormat::Png);
            doc.add_element(Element::Image(image));
        }
        PortableDocument::export(&doc, InlineMode::Always)
    }

    #[test]
    fn test_load_returns_self_contained_document() {
        let storage = MemoryStorage::new();
        let doc = sheet_with_images("A", &[&[1, 2, 3]]);

        block_on(storage.save("a", &doc)).unwrap();
        let loaded = block_on(storage.load("a")).unwrap();

        assert_eq!(loaded, doc);
        assert!(matches!(
            loaded.elements[0].as_image().map(|i| &i.source),
            Some(ImageSource::Inline { .. })
        ));
    }

    #[test]
    fn test_documents_share_image_bytes() {
        let storage = MemoryStorage::new();
        block_on(storage.save("a", &sheet_with_images("A", &[&[7; 32], &[7; 32]]))).unwrap();
        block_on(storage.save("b", &sheet_with_images("B", &[&[7; 32], &[8; 32]]))).unwrap();
        assert_eq!(storage.blob_count(), 2);
    }

    #[test]
    fn test_prune_after_delete() {
        let storage = MemoryStorage::new();
        block_on(storage.save("a", &sheet_with_images("A", &[&[1], &[2]]))).unwrap();
        block_on(storage.save("b", &sheet_with_images("B", &[&[2]]))).unwrap();

        block_on(storage.delete("a")).unwrap();
        assert_eq!(storage.blob_count(), 2);
        assert_eq!(block_on(storage.prune()).unwrap(), 1);
        assert_eq!(storage.blob_count(), 1);

        let b = block_on(storage.load("b")).unwrap();
        let data = b.elements[0].as_image().and_then(|i| i.data(&MemoryByteCache::new()));
        assert_eq!(data, Some(vec![2]));
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.load("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_list_is_sorted() {
        let storage = MemoryStorage::new();
        let mut doc = CanvasDocument::default();
        doc.add_element(Element::Text(Text::new(Point::ZERO, "Hi")));
        let doc = PortableDocument::export(&doc, InlineMode::WhenMissing);

        block_on(storage.save("zeta", &doc)).unwrap();
        block_on(storage.save("alpha", &doc)).unwrap();
        assert!(block_on(storage.exists("zeta")).unwrap());
        assert_eq!(block_on(storage.list()).unwrap(), vec!["alpha", "zeta"]);
    }
}

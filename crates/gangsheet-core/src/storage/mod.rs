//! Document library backends.
//!
//! A library keeps each document's structure apart from its image bytes.
//! Bytes are stored once per content key no matter how many documents or
//! tiled copies reference them, and [`Storage::load`] hands back a
//! self-contained document with every image inline.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use crate::cache::ByteCache;
use crate::canvas::CanvasDocument;
use crate::config::EngineConfig;
use crate::persist::{InlineMode, PortableDocument};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Trait for document storage backends.
///
/// Backends hold documents in portable form, keyed by id. Saving accepts
/// inline or cache-referenced images; loading always returns inline ones.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Storage: Send + Sync {
    /// Save a document.
    fn save(&self, id: &str, document: &PortableDocument) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a document.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<PortableDocument>>;

    /// Delete a document.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all document IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a document exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;

    /// Drop stored image bytes no remaining document references. Returns
    /// how many payloads were removed.
    fn prune(&self) -> BoxFuture<'_, StorageResult<usize>>;
}

/// Trait for document storage backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Storage {
    fn save(&self, id: &str, document: &PortableDocument) -> BoxFuture<'_, StorageResult<()>>;
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<PortableDocument>>;
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
    fn prune(&self) -> BoxFuture<'_, StorageResult<usize>>;
}

/// Save an editable document under its own id. Image bytes are taken from
/// the document's cache; the backend keeps one copy per payload.
pub async fn save_document(
    storage: &dyn Storage,
    document: &CanvasDocument,
) -> StorageResult<()> {
    let portable = PortableDocument::export(document, InlineMode::Always);
    let dangling = portable.unresolved_images(document.cache().as_ref());
    if !dangling.is_empty() {
        log::warn!(
            "saving document {} without bytes for {} image(s)",
            document.id,
            dangling.len()
        );
    }
    storage.save(&document.id, &portable).await?;
    log::debug!("saved document {} ({} elements)", document.id, portable.elements.len());
    Ok(())
}

/// Load a document and move its inline image bytes into `cache`.
pub async fn load_document(
    storage: &dyn Storage,
    id: &str,
    cache: Arc<dyn ByteCache>,
    config: EngineConfig,
) -> StorageResult<CanvasDocument> {
    let portable = storage.load(id).await?;
    let unresolved = portable.unresolved_images(cache.as_ref());
    if !unresolved.is_empty() {
        log::warn!(
            "document {id} references {} image(s) missing from the cache",
            unresolved.len()
        );
    }
    Ok(portable.into_document(cache, config))
}

/// Union of the image keys referenced by `documents`.
pub(crate) fn referenced_keys<'a>(
    documents: impl IntoIterator<Item = &'a PortableDocument>,
) -> HashSet<String> {
    documents.into_iter().flat_map(PortableDocument::image_keys).collect()
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::elements::{Element, Image, ImageFormat};
    use kurbo::Point;

    #[test]
    fn test_save_and_load_document() {
        let storage = MemoryStorage::new();
        let mut doc = CanvasDocument::default();
        doc.name = "Gang sheet".to_string();
        let image = Image::new(Point::ZERO, &[3, 1, 4], 2, 2, ImageFormat::Png);
        doc.add_element(Element::Image(image));

        block_on(save_document(&storage, &doc)).unwrap();

        let cache: Arc<dyn ByteCache> = Arc::new(MemoryByteCache::new());
        let loaded = block_on(load_document(
            &storage,
            &doc.id,
            Arc::clone(&cache),
            EngineConfig::default(),
        ))
        .unwrap();
        assert_eq!(loaded.name, "Gang sheet");
        let image = loaded.elements()[0].as_image().unwrap();
        assert_eq!(image.data(cache.as_ref()), Some(vec![3, 1, 4]));
    }

    #[test]
    fn test_tiled_copies_store_one_payload() {
        let storage = MemoryStorage::new();
        let mut doc = CanvasDocument::default();
        for x in [0.0, 40.0, 80.0] {
            let image = Image::new(Point::new(x, 0.0), &[9; 64], 4, 4, ImageFormat::Png);
            doc.add_element(Element::Image(image));
        }

        block_on(save_document(&storage, &doc)).unwrap();
        assert_eq!(storage.blob_count(), 1);

        let loaded = block_on(storage.load(&doc.id)).unwrap();
        assert_eq!(loaded.elements.len(), 3);
        assert!(loaded.image_keys().is_empty());
    }

    #[test]
    fn test_load_missing_document() {
        let storage = MemoryStorage::new();
        let result = block_on(load_document(
            &storage,
            "nope",
            Arc::new(MemoryByteCache::new()),
            EngineConfig::default(),
        ));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}

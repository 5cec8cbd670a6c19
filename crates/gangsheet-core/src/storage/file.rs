//! File-based document library for native platforms.
//!
//! Layout under the base directory:
//!
//! ```text
//! <id>.json      document structure, images referenced by content key
//! blobs/<key>    one file per distinct image payload
//! ```

use super::{BoxFuture, Storage, StorageError, StorageResult, referenced_keys};
use crate::cache::ByteCache;
use crate::persist::PortableDocument;
use std::fs;
use std::path::{Path, PathBuf};

const BLOB_DIR: &str = "blobs";

// Ids and keys become file names, so anything outside [A-Za-z0-9_-] is replaced.
fn safe_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn create_dir(path: &Path) -> StorageResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            StorageError::Io(format!("Failed to create {}: {}", path.display(), e))
        })?;
    }
    Ok(())
}

/// Image payloads on disk, addressed by content key.
struct BlobDir {
    path: PathBuf,
}

impl BlobDir {
    fn blob_path(&self, key: &str) -> PathBuf {
        self.path.join(safe_name(key))
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(&self.path)
            .map_err(|e| StorageError::Io(format!("Failed to read blob directory: {}", e)))?;
        Ok(entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect())
    }
}

impl ByteCache for BlobDir {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.blob_path(key);
        if !path.exists() {
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::error!("failed to read image blob {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, bytes: Vec<u8>) {
        let path = self.blob_path(key);
        if let Err(e) = fs::write(&path, bytes) {
            log::error!("failed to write image blob {}: {}", path.display(), e);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.blob_path(key).is_file()
    }
}

/// Stores each document as a JSON file with its image bytes pooled in a
/// shared blob directory.
pub struct FileStorage {
    base_path: PathBuf,
    blobs: BlobDir,
}

impl FileStorage {
    /// Create a library rooted at `base_path`, creating the directories if
    /// needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        create_dir(&base_path)?;
        let blobs = BlobDir { path: base_path.join(BLOB_DIR) };
        create_dir(&blobs.path)?;
        Ok(Self { base_path, blobs })
    }

    /// Create a library in the platform data directory, e.g.
    /// `~/.local/share/gangsheet/library/` on Linux.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("gangsheet").join("library"))
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", safe_name(id)))
    }

    fn read_document(path: &Path) -> StorageResult<PortableDocument> {
        let json = fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        PortableDocument::from_json(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn document_paths(&self) -> StorageResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Number of distinct image payloads on disk.
    pub fn blob_count(&self) -> StorageResult<usize> {
        Ok(self.blobs.keys()?.len())
    }
}

impl Storage for FileStorage {
    fn save(&self, id: &str, document: &PortableDocument) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);
        let mut document = document.clone();

        Box::pin(async move {
            let moved = document.share_images(&self.blobs);
            let dangling = document.unresolved_images(&self.blobs);
            if !dangling.is_empty() {
                let path = path.display();
                log::warn!("{path} stored with {} image(s) lacking bytes", dangling.len());
            }
            let json = document
                .to_json()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, json).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            })?;
            log::debug!("wrote {} ({moved} image payload(s) pooled)", path.display());
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<PortableDocument>> {
        let path = self.document_path(id);
        let id_owned = id.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(id_owned));
            }
            let mut document = Self::read_document(&path)?;
            let missing = document.inline_images(&self.blobs);
            if !missing.is_empty() {
                let path = path.display();
                log::warn!("{path} has {} image(s) without stored bytes", missing.len());
            }
            Ok(document)
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);

        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            Ok(self
                .document_paths()?
                .into_iter()
                .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.document_path(id);
        Box::pin(async move { Ok(path.is_file()) })
    }

    fn prune(&self) -> BoxFuture<'_, StorageResult<usize>> {
        Box::pin(async move {
            // A document that fails to parse aborts the sweep: its references are unknown.
            let documents = self
                .document_paths()?
                .iter()
                .map(|path| Self::read_document(path))
                .collect::<StorageResult<Vec<_>>>()?;
            let live = referenced_keys(&documents);

            let mut removed = 0;
            for key in self.blobs.keys()? {
                if live.contains(&key) {
                    continue;
                }
                let path = self.blobs.blob_path(&key);
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
                removed += 1;
            }
            log::debug!("pruned {removed} unreferenced image blob(s)");
            Ok(removed)
        })
    }
}

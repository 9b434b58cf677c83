//! Byte sources for local asset reads.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use stowage_core::alloc::HashMap;

use crate::error::{LoadError, LoadResult};

/// Future type for async byte loading.
pub type BytesFuture = Pin<Box<dyn Future<Output = LoadResult<Vec<u8>>> + 'static>>;

/// Reads raw bytes for local assets.
///
/// The returned future is polled at most once per tick; a future that is
/// not ready keeps the instance in `Loading`.
pub trait BytesReader {
    /// Read all bytes from a path.
    fn read_bytes(&self, path: &Path) -> BytesFuture;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Blocking file reader wrapped in ready futures.
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    /// Create a new file reader; relative paths are joined onto `base_path`.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Read bytes synchronously.
    pub fn read_bytes_sync(&self, path: &Path) -> LoadResult<Vec<u8>> {
        let full_path = self.resolve_path(path);
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound {
                    key: full_path.display().to_string(),
                }
            } else {
                LoadError::Io {
                    path: full_path.clone(),
                    source: e,
                }
            }
        })
    }
}

impl BytesReader for FileReader {
    fn read_bytes(&self, path: &Path) -> BytesFuture {
        let result = self.read_bytes_sync(path);
        Box::pin(async move { result })
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }
}

/// In-memory bytes reader for tests or embedded assets.
#[derive(Default)]
pub struct MemoryReader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bytes for a path.
    pub fn insert(&mut self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.as_ref().to_string(), bytes.into());
    }

    /// Builder form of [`MemoryReader::insert`].
    pub fn with(mut self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn remove(&mut self, path: impl AsRef<str>) -> Option<Vec<u8>> {
        self.files.remove(path.as_ref())
    }

    pub fn contains(&self, path: impl AsRef<str>) -> bool {
        self.files.contains_key(path.as_ref())
    }
}

impl BytesReader for MemoryReader {
    fn read_bytes(&self, path: &Path) -> BytesFuture {
        let key = path.to_string_lossy().to_string();
        let result = self
            .files
            .get(&key)
            .cloned()
            .ok_or(LoadError::NotFound { key });

        Box::pin(async move { result })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path.to_string_lossy().as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future;

    #[test]
    fn test_memory_reader() {
        let reader = MemoryReader::new().with("greeting.txt", "hello");
        assert!(reader.exists(Path::new("greeting.txt")));

        let bytes = future::block_on(reader.read_bytes(Path::new("greeting.txt"))).unwrap();
        assert_eq!(bytes, b"hello");

        let missing = future::block_on(reader.read_bytes(Path::new("other.txt")));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn test_file_reader_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("level.txt"), b"level one").unwrap();

        let reader = FileReader::new(dir.path());
        assert!(reader.exists(Path::new("level.txt")));

        let bytes = future::block_on(reader.read_bytes(Path::new("level.txt"))).unwrap();
        assert_eq!(bytes, b"level one");

        let missing = reader.read_bytes_sync(Path::new("nope.txt"));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));
    }
}

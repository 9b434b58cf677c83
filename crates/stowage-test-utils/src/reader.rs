//! Byte reader that counts reads and can delay them.

use std::path::Path;
use std::sync::Arc;

use futures_lite::future;
use parking_lot::Mutex;
use stowage::{BytesFuture, BytesReader, MemoryReader};

#[derive(Default)]
struct State {
    files: MemoryReader,
    reads: Vec<String>,
    delay: u32,
}

/// In-memory reader that records every read.
///
/// With a delay of `n`, each read future returns `Pending` `n` times
/// before yielding its bytes, so it completes on the `n + 1`th tick.
#[derive(Clone, Default)]
pub struct CountingReader {
    state: Arc<Mutex<State>>,
}

impl CountingReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) {
        self.state.lock().files.insert(path, bytes);
    }

    pub fn with(self, path: impl AsRef<str>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn with_delay(self, polls: u32) -> Self {
        self.state.lock().delay = polls;
        self
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().reads.len()
    }

    pub fn read_count_for(&self, path: &str) -> usize {
        self.state.lock().reads.iter().filter(|p| *p == path).count()
    }
}

impl BytesReader for CountingReader {
    fn read_bytes(&self, path: &Path) -> BytesFuture {
        let mut state = self.state.lock();
        state.reads.push(path.to_string_lossy().into_owned());
        let delay = state.delay;
        let read = state.files.read_bytes(path);
        Box::pin(async move {
            for _ in 0..delay {
                future::yield_now().await;
            }
            read.await
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().files.exists(path)
    }
}

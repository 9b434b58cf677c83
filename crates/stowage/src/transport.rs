//! Network collaborators: file downloads and in-memory web requests.
//!
//! Both are polled by the strategies, never awaited. Real transports advance
//! on their own; `advance_all` exists so a synchronous load can push every
//! active transfer forward while it waits.

use std::path::PathBuf;

use stowage_core::alloc::HashMap;

/// A file download to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub expected_size: u64,
    pub checksum: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(pub u64);

/// Progress of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    InProgress { downloaded_bytes: u64 },
    /// The file is at the request's destination.
    Completed,
    Failed(String),
}

/// Downloads bundles to disk.
pub trait DownloadTransport {
    fn begin_download(&mut self, request: DownloadRequest) -> DownloadId;

    fn status(&self, id: DownloadId) -> DownloadStatus;

    /// Forget a download once its result has been consumed or it is abandoned.
    fn dispose(&mut self, id: DownloadId);

    /// Move every active download forward one step.
    fn advance_all(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WebRequestId(pub u64);

/// Snapshot of a web request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebPoll {
    pub progress: f32,
    pub error: Option<String>,
    pub done: bool,
}

/// Fetches bodies into memory.
pub trait WebTransport {
    fn send(&mut self, url: &str) -> WebRequestId;

    fn poll(&self, id: WebRequestId) -> WebPoll;

    /// Take the body of a finished request.
    fn take_body(&mut self, id: WebRequestId) -> Option<Vec<u8>>;

    /// Release the request's resources. Called on every exit path.
    fn dispose(&mut self, id: WebRequestId);

    /// Move every active request forward one step.
    fn advance_all(&mut self);
}

/// Transport used when no network is configured: every transfer fails.
#[derive(Debug, Default)]
pub struct OfflineTransport {
    next_id: u64,
    urls: HashMap<u64, String>,
}

impl OfflineTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, url: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.urls.insert(id, url.to_string());
        id
    }

    /// Transfers that have not been disposed yet.
    pub fn live_count(&self) -> usize {
        self.urls.len()
    }

    fn failure(&self, id: u64) -> String {
        match self.urls.get(&id) {
            Some(url) => format!("no network transport configured for {}", url),
            None => "unknown transfer".to_string(),
        }
    }
}

impl DownloadTransport for OfflineTransport {
    fn begin_download(&mut self, request: DownloadRequest) -> DownloadId {
        DownloadId(self.track(&request.url))
    }

    fn status(&self, id: DownloadId) -> DownloadStatus {
        DownloadStatus::Failed(self.failure(id.0))
    }

    fn dispose(&mut self, id: DownloadId) {
        self.urls.remove(&id.0);
    }

    fn advance_all(&mut self) {}
}

impl WebTransport for OfflineTransport {
    fn send(&mut self, url: &str) -> WebRequestId {
        WebRequestId(self.track(url))
    }

    fn poll(&self, id: WebRequestId) -> WebPoll {
        WebPoll {
            progress: 0.0,
            error: Some(self.failure(id.0)),
            done: true,
        }
    }

    fn take_body(&mut self, _id: WebRequestId) -> Option<Vec<u8>> {
        None
    }

    fn dispose(&mut self, id: WebRequestId) {
        self.urls.remove(&id.0);
    }

    fn advance_all(&mut self) {}
}

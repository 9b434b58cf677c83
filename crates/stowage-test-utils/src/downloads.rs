//! Scripted download transport.

use std::sync::Arc;

use parking_lot::Mutex;
use stowage::{DownloadId, DownloadRequest, DownloadStatus, DownloadTransport};
use stowage_core::alloc::HashMap;

/// How a download to one URL behaves.
#[derive(Debug, Clone)]
pub struct DownloadScript {
    /// Advances needed before the transfer finishes.
    pub steps: u32,
    /// `Some` makes the transfer fail with this message once finished.
    pub error: Option<String>,
    /// Written to the request's destination on success.
    pub body: Option<Vec<u8>>,
}

impl Default for DownloadScript {
    fn default() -> Self {
        Self::succeed_after(0)
    }
}

impl DownloadScript {
    pub fn succeed_after(steps: u32) -> Self {
        Self {
            steps,
            error: None,
            body: None,
        }
    }

    pub fn fail_after(steps: u32, error: impl Into<String>) -> Self {
        Self {
            steps,
            error: Some(error.into()),
            body: None,
        }
    }

    /// Write `body` to disk when the transfer succeeds.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Never finishes.
    pub fn stall() -> Self {
        Self::succeed_after(u32::MAX)
    }
}

#[derive(Debug)]
struct Transfer {
    request: DownloadRequest,
    script: DownloadScript,
    advanced: u32,
    written: bool,
    disposed: bool,
}

impl Transfer {
    fn is_finished(&self) -> bool {
        self.advanced >= self.script.steps
    }

    fn advance(&mut self) {
        if !self.is_finished() {
            self.advanced += 1;
        }
        if self.is_finished() && self.script.error.is_none() && !self.written {
            self.written = true;
            if let Some(body) = &self.script.body {
                if let Some(parent) = self.request.destination.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(&self.request.destination, body);
            }
        }
    }

    fn status(&self) -> DownloadStatus {
        if !self.is_finished() {
            let downloaded_bytes = if self.script.steps == 0 {
                0
            } else {
                self.request.expected_size * u64::from(self.advanced) / u64::from(self.script.steps)
            };
            return DownloadStatus::InProgress { downloaded_bytes };
        }
        match &self.script.error {
            Some(error) => DownloadStatus::Failed(error.clone()),
            None => DownloadStatus::Completed,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, DownloadScript>,
    transfers: Vec<Transfer>,
    auto_advance: bool,
}

/// Download transport driven by per-URL scripts.
///
/// Unscripted URLs succeed immediately. Transfers only move when
/// [`ScriptedDownloads::advance`] (or the transport's `advance_all`) is
/// called, unless auto-advance is on.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDownloads {
    state: Arc<Mutex<State>>,
}

impl ScriptedDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every transfer one step on each status poll.
    pub fn auto_advance(self) -> Self {
        self.state.lock().auto_advance = true;
        self
    }

    pub fn script(&self, url: impl Into<String>, script: DownloadScript) {
        self.state.lock().scripts.insert(url.into(), script);
    }

    /// Move every unfinished transfer forward one step.
    pub fn advance(&self) {
        for transfer in &mut self.state.lock().transfers {
            transfer.advance();
        }
    }

    /// Number of transfers started.
    pub fn begin_count(&self) -> usize {
        self.state.lock().transfers.len()
    }

    pub fn begin_count_for(&self, url: &str) -> usize {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.request.url == url)
            .count()
    }

    pub fn dispose_count(&self) -> usize {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.disposed)
            .count()
    }

    /// Every request passed to `begin_download`, in order.
    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.state
            .lock()
            .transfers
            .iter()
            .map(|t| t.request.clone())
            .collect()
    }
}

impl DownloadTransport for ScriptedDownloads {
    fn begin_download(&mut self, request: DownloadRequest) -> DownloadId {
        let mut state = self.state.lock();
        let script = state.scripts.get(&request.url).cloned().unwrap_or_default();
        let mut transfer = Transfer {
            request,
            script,
            advanced: 0,
            written: false,
            disposed: false,
        };
        if transfer.script.steps == 0 {
            transfer.advance();
        }
        state.transfers.push(transfer);
        DownloadId(state.transfers.len() as u64 - 1)
    }

    fn status(&self, id: DownloadId) -> DownloadStatus {
        let mut state = self.state.lock();
        let auto_advance = state.auto_advance;
        match state.transfers.get_mut(id.0 as usize) {
            Some(transfer) => {
                if auto_advance {
                    transfer.advance();
                }
                transfer.status()
            }
            None => DownloadStatus::Failed(format!("unknown download {}", id.0)),
        }
    }

    fn dispose(&mut self, id: DownloadId) {
        if let Some(transfer) = self.state.lock().transfers.get_mut(id.0 as usize) {
            transfer.disposed = true;
        }
    }

    fn advance_all(&mut self) {
        self.advance();
    }
}

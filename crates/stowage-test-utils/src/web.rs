//! Scripted web transport.

use std::sync::Arc;

use parking_lot::Mutex;
use stowage::{WebPoll, WebRequestId, WebTransport};
use stowage_core::alloc::HashMap;

/// How a request to one URL behaves.
#[derive(Debug, Clone)]
pub struct WebScript {
    pub steps: u32,
    pub body: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl WebScript {
    pub fn respond_after(steps: u32, body: impl Into<Vec<u8>>) -> Self {
        Self {
            steps,
            body: Some(body.into()),
            error: None,
        }
    }

    pub fn fail_after(steps: u32, error: impl Into<String>) -> Self {
        Self {
            steps,
            body: None,
            error: Some(error.into()),
        }
    }

    /// Finishes without a body and without an error.
    pub fn empty_after(steps: u32) -> Self {
        Self {
            steps,
            body: None,
            error: None,
        }
    }
}

#[derive(Debug)]
struct Request {
    url: String,
    script: WebScript,
    advanced: u32,
    disposed: bool,
}

impl Request {
    fn is_finished(&self) -> bool {
        self.advanced >= self.script.steps
    }
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, WebScript>,
    requests: Vec<Request>,
}

/// Web transport driven by per-URL scripts.
///
/// Unscripted URLs fail with a 404-style error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWeb {
    state: Arc<Mutex<State>>,
}

impl ScriptedWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: impl Into<String>, script: WebScript) {
        self.state.lock().scripts.insert(url.into(), script);
    }

    /// Move every live request forward one step.
    pub fn advance(&self) {
        for request in &mut self.state.lock().requests {
            if !request.disposed && !request.is_finished() {
                request.advanced += 1;
            }
        }
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn send_count_for(&self, url: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn dispose_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.disposed)
            .count()
    }

    /// Requests sent but not yet disposed.
    pub fn live_count(&self) -> usize {
        self.send_count() - self.dispose_count()
    }
}

impl WebTransport for ScriptedWeb {
    fn send(&mut self, url: &str) -> WebRequestId {
        let mut state = self.state.lock();
        let script = state
            .scripts
            .get(url)
            .cloned()
            .unwrap_or_else(|| WebScript::fail_after(0, format!("HTTP 404: {}", url)));
        state.requests.push(Request {
            url: url.to_string(),
            script,
            advanced: 0,
            disposed: false,
        });
        WebRequestId(state.requests.len() as u64 - 1)
    }

    fn poll(&self, id: WebRequestId) -> WebPoll {
        let state = self.state.lock();
        let Some(request) = state.requests.get(id.0 as usize) else {
            return WebPoll {
                progress: 0.0,
                error: Some(format!("unknown request {}", id.0)),
                done: true,
            };
        };

        let progress = if request.script.steps == 0 {
            1.0
        } else {
            request.advanced as f32 / request.script.steps as f32
        };
        let done = request.is_finished();
        WebPoll {
            progress,
            error: if done { request.script.error.clone() } else { None },
            done,
        }
    }

    fn take_body(&mut self, id: WebRequestId) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        let request = state.requests.get_mut(id.0 as usize)?;
        if !request.is_finished() {
            return None;
        }
        request.script.body.take()
    }

    fn dispose(&mut self, id: WebRequestId) {
        if let Some(request) = self.state.lock().requests.get_mut(id.0 as usize) {
            request.disposed = true;
        }
    }

    fn advance_all(&mut self) {
        self.advance();
    }
}

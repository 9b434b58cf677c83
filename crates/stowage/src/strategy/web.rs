use crate::error::LoadResult;
use crate::status::LoadableStatus;
use crate::strategy::{Backends, LoadContext, LoadStrategy};
use crate::transport::{WebPoll, WebRequestId};

/// Fetches the body over the web transport into memory.
///
/// Assets decode the body; bundles mount it directly. The request is
/// disposed on every exit path.
#[derive(Debug, Default)]
pub struct StreamingWeb {
    request: Option<WebRequestId>,
}

impl StreamingWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one poll result. Returns `true` once the request is finished.
    fn step(&mut self, ctx: &mut LoadContext<'_>, id: WebRequestId, poll: WebPoll) -> bool {
        ctx.report_progress(poll.progress);

        if let Some(error) = poll.error.filter(|e| !e.is_empty()) {
            self.close(ctx.backends, id);
            ctx.fail(error);
            return true;
        }

        if !poll.done {
            return false;
        }

        let body = ctx.backends.web.take_body(id);
        self.close(ctx.backends, id);
        let Some(bytes) = body else {
            ctx.fail(format!("{} returned no body", ctx.location));
            return true;
        };

        if ctx.kind.is_bundle() {
            let archive = ctx.backends.mounter.mount_bytes(ctx.key, bytes);
            ctx.finish_mount(archive);
        } else {
            ctx.decode_and_finish(&bytes);
        }
        true
    }

    fn close(&mut self, backends: &mut Backends, id: WebRequestId) {
        backends.web.dispose(id);
        self.request = None;
    }
}

impl LoadStrategy for StreamingWeb {
    fn name(&self) -> &'static str {
        "StreamingWeb"
    }

    fn begin_load(&mut self, ctx: &mut LoadContext<'_>) {
        self.request = Some(ctx.backends.web.send(ctx.location));
        ctx.set_stage(LoadableStatus::Downloading);
    }

    fn poll_tick(&mut self, ctx: &mut LoadContext<'_>) {
        let Some(id) = self.request else {
            return;
        };
        let poll = ctx.backends.web.poll(id);
        self.step(ctx, id, poll);
    }

    fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
        let cap = ctx.config.immediate_iteration_cap;
        let mut iterations = 0;
        while let Some(id) = self.request {
            if ctx.is_done() {
                break;
            }
            let poll = ctx.backends.web.poll(id);
            if self.step(ctx, id, poll) {
                break;
            }
            if iterations >= cap {
                self.close(ctx.backends, id);
                ctx.fail_stalled();
                break;
            }
            ctx.backends.web.advance_all();
            iterations += 1;
        }
        Ok(())
    }

    fn teardown(&mut self, backends: &mut Backends) {
        if let Some(id) = self.request {
            self.close(backends, id);
        }
    }
}

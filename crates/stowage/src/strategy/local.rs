use std::path::Path;

use futures_lite::future;

use crate::error::LoadResult;
use crate::io::BytesFuture;
use crate::mount::{MountPoll, MountTicket};
use crate::strategy::{Backends, LoadContext, LoadStrategy};

/// Reads an asset through the byte reader and decodes it.
///
/// The read future is polled once per tick.
#[derive(Default)]
pub struct LocalAsset {
    pending: Option<BytesFuture>,
}

impl LocalAsset {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(ctx: &mut LoadContext<'_>, result: LoadResult<Vec<u8>>) {
        match result {
            Ok(bytes) => ctx.decode_and_finish(&bytes),
            Err(e) => ctx.fail(e.to_string()),
        }
    }
}

impl LoadStrategy for LocalAsset {
    fn name(&self) -> &'static str {
        "LocalAsset"
    }

    fn begin_load(&mut self, ctx: &mut LoadContext<'_>) {
        let path = Path::new(ctx.location);
        self.pending = Some(ctx.backends.reader.read_bytes(path));
    }

    fn poll_tick(&mut self, ctx: &mut LoadContext<'_>) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let Some(result) = future::block_on(future::poll_once(pending)) else {
            return;
        };
        self.pending = None;
        Self::deliver(ctx, result);
    }

    fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
        if ctx.is_done() {
            return Ok(());
        }
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        for _ in 0..ctx.config.immediate_iteration_cap {
            if let Some(result) = future::block_on(future::poll_once(&mut pending)) {
                Self::deliver(ctx, result);
                return Ok(());
            }
        }
        ctx.fail_stalled();
        Ok(())
    }

    fn teardown(&mut self, _backends: &mut Backends) {
        self.pending = None;
    }
}

/// Mounts a bundle that is already on local storage.
///
/// A synchronous request mounts directly inside begin-load.
#[derive(Debug, Default)]
pub struct LocalBundle {
    ticket: Option<MountTicket>,
}

impl LocalBundle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadStrategy for LocalBundle {
    fn name(&self) -> &'static str {
        "LocalBundle"
    }

    fn begin_load(&mut self, ctx: &mut LoadContext<'_>) {
        let path = Path::new(ctx.location);
        if ctx.must_complete_now() {
            let archive = ctx.backends.mounter.mount_now(path);
            ctx.finish_mount(archive);
        } else {
            self.ticket = Some(ctx.backends.mounter.begin_mount(path));
        }
    }

    fn poll_tick(&mut self, ctx: &mut LoadContext<'_>) {
        let Some(ticket) = self.ticket else {
            return;
        };
        match ctx.backends.mounter.poll_mount(ticket) {
            MountPoll::Pending { progress } => ctx.report_progress(progress),
            MountPoll::Ready(archive) => {
                self.ticket = None;
                ctx.finish_mount(archive);
            }
        }
    }

    fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
        if ctx.is_done() {
            return Ok(());
        }
        if let Some(ticket) = self.ticket.take() {
            ctx.await_mount(ticket);
        }
        Ok(())
    }
}

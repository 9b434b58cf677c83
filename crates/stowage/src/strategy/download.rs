use std::path::PathBuf;

use crate::error::LoadResult;
use crate::mount::{MountPoll, MountTicket};
use crate::status::LoadableStatus;
use crate::strategy::{Backends, LoadContext, LoadStrategy};
use crate::transport::{DownloadId, DownloadRequest, DownloadStatus};

enum Phase {
    Idle,
    Transferring(DownloadId),
    Mounting(MountTicket),
    Finished,
}

/// Downloads a remote bundle to disk, then mounts the saved file.
///
/// Progress is split in halves: the transfer covers `[0, 0.5]` and the
/// mount covers `[0.5, 1]`.
pub struct DownloadThenMount {
    phase: Phase,
    destination: PathBuf,
}

impl Default for DownloadThenMount {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadThenMount {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            destination: PathBuf::new(),
        }
    }

    fn transfer_progress(ctx: &LoadContext<'_>, downloaded_bytes: u64) -> f32 {
        let size = ctx.descriptor().map(|d| d.size).unwrap_or(0);
        if size == 0 {
            return 0.0;
        }
        let ratio = (downloaded_bytes as f64 / size as f64).min(1.0);
        (ratio * 0.5) as f32
    }

    /// Remember the saved file so the next load of this version stays local.
    fn record_saved_file(&self, ctx: &mut LoadContext<'_>) {
        let kind = ctx.kind;
        if let Some(descriptor) = kind.descriptor() {
            ctx.backends
                .resolver
                .record_mounted_path(descriptor, &self.destination);
        }
    }

    fn on_transfer_status(
        &mut self,
        ctx: &mut LoadContext<'_>,
        id: DownloadId,
        status: DownloadStatus,
    ) {
        match status {
            DownloadStatus::InProgress { downloaded_bytes } => {
                let progress = Self::transfer_progress(ctx, downloaded_bytes);
                ctx.report_progress(progress);
            }
            DownloadStatus::Failed(error) => {
                ctx.backends.downloads.dispose(id);
                self.phase = Phase::Finished;
                ctx.fail(error);
            }
            DownloadStatus::Completed => {
                ctx.backends.downloads.dispose(id);
                self.record_saved_file(ctx);
                ctx.set_stage(LoadableStatus::Loading);
                ctx.report_progress(0.5);
                let ticket = ctx.backends.mounter.begin_mount(&self.destination);
                self.phase = Phase::Mounting(ticket);
            }
        }
    }
}

impl LoadStrategy for DownloadThenMount {
    fn name(&self) -> &'static str {
        "DownloadThenMount"
    }

    fn begin_load(&mut self, ctx: &mut LoadContext<'_>) {
        let kind = ctx.kind;
        let Some(descriptor) = kind.descriptor() else {
            ctx.fail(format!("{} is not a bundle", ctx.key));
            return;
        };
        self.destination = ctx.backends.resolver.download_destination(descriptor);
        let request = DownloadRequest {
            url: ctx.location.to_string(),
            destination: self.destination.clone(),
            expected_size: descriptor.size,
            checksum: descriptor.checksum,
        };
        let id = ctx.backends.downloads.begin_download(request);
        self.phase = Phase::Transferring(id);
        ctx.set_stage(LoadableStatus::Downloading);
    }

    fn poll_tick(&mut self, ctx: &mut LoadContext<'_>) {
        if let Phase::Transferring(id) = self.phase {
            let status = ctx.backends.downloads.status(id);
            self.on_transfer_status(ctx, id, status);
        }

        if let Phase::Mounting(ticket) = self.phase {
            match ctx.backends.mounter.poll_mount(ticket) {
                MountPoll::Pending { progress } => ctx.report_progress(0.5 + 0.5 * progress),
                MountPoll::Ready(archive) => {
                    self.phase = Phase::Finished;
                    ctx.finish_mount(archive);
                }
            }
        }
    }

    fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
        if ctx.is_done() {
            return Ok(());
        }

        if let Phase::Transferring(id) = self.phase {
            let cap = ctx.config.immediate_iteration_cap;
            let mut iterations = 0;
            let mut status = ctx.backends.downloads.status(id);
            while matches!(status, DownloadStatus::InProgress { .. }) {
                if iterations >= cap {
                    ctx.backends.downloads.dispose(id);
                    self.phase = Phase::Finished;
                    ctx.fail_stalled();
                    return Ok(());
                }
                ctx.backends.downloads.advance_all();
                iterations += 1;
                status = ctx.backends.downloads.status(id);
            }

            match status {
                DownloadStatus::Completed => {
                    ctx.backends.downloads.dispose(id);
                    self.record_saved_file(ctx);
                    ctx.set_stage(LoadableStatus::Loading);
                    self.phase = Phase::Finished;
                    let archive = ctx.backends.mounter.mount_now(&self.destination);
                    ctx.finish_mount(archive);
                }
                other => self.on_transfer_status(ctx, id, other),
            }
            return Ok(());
        }

        if let Phase::Mounting(ticket) = self.phase {
            self.phase = Phase::Finished;
            ctx.await_mount(ticket);
        }
        Ok(())
    }

    fn teardown(&mut self, backends: &mut Backends) {
        if let Phase::Transferring(id) = self.phase {
            backends.downloads.dispose(id);
        }
        self.phase = Phase::Finished;
    }
}

//! Cleanup Loop
//!
//! Periodic housekeeping: expire pending payments past their deadline,
//! close tickets past the inactivity timeout, and prune stale files from
//! the QR and upload directories. Everything here is idempotent; a missed
//! sweep is caught up by the next one.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;

use crate::context::AppContext;
use crate::tickets::TicketService;

/// Interval between sweeps
pub const CLEANUP_TICK: Duration = Duration::from_secs(300);

/// Pause after a failed sweep before the next attempt
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// QR images are useless once the charge has expired
const QR_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Uploads linger long enough for a manual retry of a failed deploy
const UPLOAD_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// What one sweep removed
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub expired_payments: usize,
    pub closed_tickets: usize,
    pub removed_qr_images: usize,
    pub removed_uploads: usize,
}

pub struct CleanupSweeper {
    ctx: Arc<AppContext>,
    tickets: TicketService,
}

impl CleanupSweeper {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let tickets = TicketService::new(ctx.clone());
        Self { ctx, tickets }
    }

    /// Run the loop forever.
    pub async fn run(self) {
        tracing::info!(tick_secs = CLEANUP_TICK.as_secs(), "Cleanup sweeper started");
        loop {
            match self.sweep().await {
                Ok(_) => tokio::time::sleep(CLEANUP_TICK).await,
                Err(e) => {
                    tracing::error!(error = %e, "Cleanup sweep failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// One full housekeeping pass.
    pub async fn sweep(&self) -> anyhow::Result<CleanupReport> {
        let report = CleanupReport {
            expired_payments: self.ctx.ledger.expire_sweep(Utc::now())?.len(),
            closed_tickets: self.tickets.expire_sweep().await?,
            removed_qr_images: sweep_dir(&self.ctx.qrcodes_dir, QR_MAX_AGE),
            removed_uploads: sweep_dir(&self.ctx.uploads_dir, UPLOAD_MAX_AGE),
        };

        if report.expired_payments > 0
            || report.closed_tickets > 0
            || report.removed_qr_images > 0
            || report.removed_uploads > 0
        {
            tracing::info!(
                expired_payments = report.expired_payments,
                closed_tickets = report.closed_tickets,
                removed_qr_images = report.removed_qr_images,
                removed_uploads = report.removed_uploads,
                "Cleanup sweep finished"
            );
        }
        Ok(report)
    }
}

/// Delete regular files in `dir` older than `max_age`. Unreadable entries
/// are skipped rather than aborting the sweep.
fn sweep_dir(dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let stale = meta.is_file() && meta.modified().is_ok_and(|m| m < cutoff);
        if !stale {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Stale file removal failed");
            }
        }
    }
    removed
}

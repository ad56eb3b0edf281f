//! Deploy Reconciliation Loop
//!
//! Every tick, scan the ledger for paid payments whose archive is ready and
//! push each one to the hosting provider. A payment is claimed with a
//! compare-and-set before any provider call, so a record is deployed at
//! most once no matter how ticks and restarts interleave.
//!
//! Precondition failures (archive gone, no API key on file) do not consume
//! the payment; they bump a bounded retry counter and eventually park the
//! record as blocked for an operator to resolve.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hyperdeploy_core::{PaymentRecord, PaymentStatus, StatusUpdate};

use crate::chat::OutboundMessage;
use crate::context::AppContext;

/// Interval between ledger scans
pub const DEPLOY_TICK: Duration = Duration::from_secs(10);

/// Pause after a failed scan before the next attempt
pub const ERROR_BACKOFF: Duration = Duration::from_secs(30);

pub struct Reconciler {
    ctx: Arc<AppContext>,
}

impl Reconciler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Run the loop forever.
    pub async fn run(self) {
        tracing::info!(tick_secs = DEPLOY_TICK.as_secs(), "Deploy reconciler started");
        loop {
            match self.tick().await {
                Ok(deployed) => {
                    if deployed > 0 {
                        tracing::info!(deployed, "Reconciliation tick finished");
                    }
                    tokio::time::sleep(DEPLOY_TICK).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation tick failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// One scan over the ledger. Returns how many deploys were attempted.
    pub async fn tick(&self) -> anyhow::Result<usize> {
        let mut attempted = 0;

        for payment in self.ctx.ledger.ready_for_deploy() {
            // ready_for_deploy guarantees the file is set
            let Some(archive) = payment.deploy_file.clone() else {
                continue;
            };

            if !archive.exists() {
                self.precondition_failed(&payment, "the uploaded archive is no longer on disk")
                    .await?;
                continue;
            }
            let Some(api_key) = self.ctx.keys.get(payment.user_id) else {
                self.precondition_failed(&payment, "no hosting API key is on file")
                    .await?;
                continue;
            };

            // Claim before any provider call; a lost claim means another
            // worker got here first.
            if !self.ctx.ledger.claim_for_processing(&payment.id)? {
                continue;
            }

            self.deploy(&payment, &api_key, &archive).await?;
            attempted += 1;
        }

        Ok(attempted)
    }

    async fn deploy(
        &self,
        payment: &PaymentRecord,
        api_key: &str,
        archive: &Path,
    ) -> anyhow::Result<()> {
        tracing::info!(
            payment_id = %payment.id,
            user_id = payment.user_id,
            archive = %archive.display(),
            "Deploy started"
        );

        match self.ctx.host.upload(api_key, archive).await {
            Ok(app) => {
                self.ctx.ledger.update_status(
                    &payment.id,
                    PaymentStatus::Deployed,
                    Some(StatusUpdate::deployed_app(app.id.clone(), app.display_name())),
                )?;
                self.ctx
                    .tickets
                    .set_payment_status(payment.user_id, PaymentStatus::Deployed)?;

                if self.ctx.config.auto_deploy() {
                    if let Err(e) = self.ctx.host.start(api_key, &app.id).await {
                        tracing::warn!(app_id = %app.id, error = %e, "Automatic start failed");
                    }
                }

                self.notify(
                    payment.user_id,
                    &OutboundMessage::new(
                        "Deploy complete",
                        "Your application is live on Square Cloud.",
                    )
                    .field("Application", app.display_name().to_string())
                    .field("App id", app.id.clone()),
                )
                .await;

                // The archive has served its purpose
                if let Err(e) = tokio::fs::remove_file(archive).await {
                    tracing::warn!(archive = %archive.display(), error = %e, "Archive cleanup failed");
                }

                tracing::info!(payment_id = %payment.id, app_id = %app.id, "Deploy complete");
            }
            Err(e) => {
                tracing::error!(payment_id = %payment.id, error = %e, "Deploy failed");
                self.ctx.ledger.update_status(
                    &payment.id,
                    PaymentStatus::Failed,
                    Some(StatusUpdate::error(e.to_string())),
                )?;
                self.ctx
                    .tickets
                    .set_payment_status(payment.user_id, PaymentStatus::Failed)?;

                // The archive is kept so an operator can retry by hand
                self.notify(
                    payment.user_id,
                    &OutboundMessage::new("Deploy failed", e.user_message().to_string()),
                )
                .await;
            }
        }

        Ok(())
    }

    async fn precondition_failed(&self, payment: &PaymentRecord, reason: &str) -> anyhow::Result<()> {
        tracing::warn!(
            payment_id = %payment.id,
            attempts = payment.deploy_attempts + 1,
            reason,
            "Deploy precondition failed"
        );

        if self.ctx.ledger.note_precondition_failure(&payment.id, reason)? {
            self.notify(
                payment.user_id,
                &OutboundMessage::new(
                    "Deploy blocked",
                    format!(
                        "Your paid deploy could not start: {reason}. \
                         An operator will follow up with you."
                    ),
                ),
            )
            .await;
        }
        Ok(())
    }

    /// Deliver to the ticket channel when it still exists, otherwise DM.
    async fn notify(&self, user_id: u64, message: &OutboundMessage) {
        if let Some(ticket) = self.ctx.tickets.get(user_id) {
            if self.ctx.chat.send(ticket.channel_id, message).await.is_ok() {
                return;
            }
        }
        if let Err(e) = self.ctx.chat.send_dm(user_id, message).await {
            tracing::warn!(user_id, error = %e, "Deploy notification not delivered");
        }
    }
}

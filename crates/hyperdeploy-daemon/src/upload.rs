//! Upload Handler
//!
//! Validates deploy archives dropped into a ticket channel, stores them
//! under the uploads directory, and kicks off the PIX charge for the
//! deploy. The user gets an acknowledgement as soon as the file is saved;
//! charge creation happens in a background task so a slow gateway never
//! stalls the upload path.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use hyperdeploy_core::{PaymentStatus, StatusUpdate, TicketFile};
use hyperdeploy_payments::{ChargeRequest, qr};

use crate::chat::OutboundMessage;
use crate::context::AppContext;

/// An attachment as delivered by the chat front-end
pub struct IncomingAttachment {
    /// Filename as uploaded
    pub filename: String,

    /// Raw file content
    pub data: Vec<u8>,
}

/// Archive extensions accepted for deploy
const ALLOWED_EXTENSIONS: &[&str] = &["zip"];

#[derive(Clone)]
pub struct UploadHandler {
    ctx: Arc<AppContext>,
}

impl UploadHandler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Full upload path: accept the archive, then start the payment flow
    /// in the background.
    pub async fn handle(
        &self,
        user_id: u64,
        channel_id: u64,
        attachments: Vec<IncomingAttachment>,
    ) -> anyhow::Result<Option<TicketFile>> {
        let Some(file) = self.accept(user_id, channel_id, attachments).await? else {
            return Ok(None);
        };

        let handler = self.clone();
        let flow_file = file.clone();
        tokio::spawn(async move {
            if let Err(e) = handler
                .start_payment_flow(user_id, channel_id, &flow_file)
                .await
            {
                tracing::error!(user_id, error = %e, "Payment flow failed");
            }
        });

        Ok(Some(file))
    }

    /// Validate and store an uploaded archive.
    ///
    /// Rejections are reported into the channel and return `None`; only a
    /// stored archive comes back as `Some`.
    pub async fn accept(
        &self,
        user_id: u64,
        channel_id: u64,
        attachments: Vec<IncomingAttachment>,
    ) -> anyhow::Result<Option<TicketFile>> {
        if !self.ctx.tickets.owns_channel(user_id, channel_id) {
            tracing::warn!(user_id, channel_id, "Upload outside the user's ticket channel");
            return Ok(None);
        }

        let mut attachments = attachments;
        if attachments.len() != 1 {
            self.reject(
                channel_id,
                "Send exactly one ZIP archive containing your project.",
            )
            .await?;
            return Ok(None);
        }
        let Some(attachment) = attachments.pop() else {
            return Ok(None);
        };

        let original = Path::new(&attachment.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extension_ok = Path::new(&original)
            .extension()
            .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()));
        if !extension_ok {
            self.reject(
                channel_id,
                "Only ZIP archives are accepted. Compress your project and try again.",
            )
            .await?;
            return Ok(None);
        }

        let limit = self.ctx.config.max_file_size_bytes();
        if attachment.data.len() as u64 > limit {
            self.reject(
                channel_id,
                format!(
                    "Archive is too large: {:.1} MB, the limit is {} MB.",
                    attachment.data.len() as f64 / (1024.0 * 1024.0),
                    self.ctx.config.max_file_size_mb()
                ),
            )
            .await?;
            return Ok(None);
        }

        // Acknowledge before the disk write so the user sees progress
        // immediately.
        let ack = self
            .ctx
            .chat
            .send(
                channel_id,
                &OutboundMessage::new("Archive received", "Storing your upload..."),
            )
            .await?;

        let now = Utc::now();
        let stored_name = format!("{user_id}_{}_{original}", now.format("%Y%m%d_%H%M%S"));
        let path = self.ctx.uploads_dir.join(&stored_name);
        tokio::fs::write(&path, &attachment.data).await?;

        let file = TicketFile {
            filename: stored_name,
            original_filename: original,
            path,
            size_bytes: attachment.data.len() as u64,
            uploaded_at: now,
        };
        self.ctx.tickets.add_file(user_id, file.clone())?;

        self.ctx
            .chat
            .edit(
                ack,
                &OutboundMessage::new("Archive received", "Preparing your PIX charge...")
                    .field("File", file.original_filename.clone())
                    .field("Size", format!("{} bytes", file.size_bytes)),
            )
            .await?;

        tracing::info!(user_id, file = %file.filename, "Upload stored");
        Ok(Some(file))
    }

    /// Create the pending payment and post the PIX charge for an accepted
    /// archive.
    ///
    /// The price is re-read from disk at this point so an admin edit to the
    /// config file takes effect without a restart.
    pub async fn start_payment_flow(
        &self,
        user_id: u64,
        channel_id: u64,
        file: &TicketFile,
    ) -> anyhow::Result<Option<String>> {
        let gateway = match (&self.ctx.gateway, self.ctx.config.mercadopago_enabled()) {
            (Some(gateway), true) => gateway,
            _ => {
                tracing::warn!(user_id, "Payment flow skipped, gateway unavailable");
                self.reject(
                    channel_id,
                    "Payments are currently unavailable. An operator has been notified; \
                     your archive is kept and the charge will be issued manually.",
                )
                .await?;
                return Ok(None);
            }
        };

        let price = self.ctx.config.fresh_deploy_price();
        let description = format!("HyperDeploy - {}", file.original_filename);
        let timeout = self.ctx.config.payment_timeout();

        let payment_id = self
            .ctx
            .ledger
            .create(user_id, price, description.clone(), timeout)?;
        self.ctx.ledger.attach_deploy_file(&payment_id, &file.path)?;
        self.ctx.ledger.mark_ready_for_deploy(&payment_id)?;

        let charge = match gateway
            .create_charge(ChargeRequest::new(price, description))
            .await
        {
            Ok(charge) => charge,
            Err(e) => {
                tracing::error!(user_id, payment_id = %payment_id, error = %e, "Charge creation failed");
                self.ctx.ledger.update_status(
                    &payment_id,
                    PaymentStatus::Failed,
                    Some(StatusUpdate::error(e.user_message())),
                )?;
                self.reject(channel_id, e.user_message()).await?;
                return Ok(None);
            }
        };

        // A missing QR image degrades to the copy-paste code alone.
        let qr_path = match qr::render_code_svg(&charge.code, &self.ctx.qrcodes_dir, &payment_id) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(payment_id = %payment_id, error = %e, "QR render failed");
                None
            }
        };
        self.ctx
            .ledger
            .set_pix_details(&payment_id, charge.code.clone(), qr_path.clone())?;

        let mut message = OutboundMessage::new(
            "PIX payment",
            format!(
                "Pay with the code below to start your deploy. \
                 The charge expires in {} minutes.",
                timeout.num_minutes()
            ),
        )
        .field("Amount", format!("R$ {price:.2}"))
        .field("PIX code", charge.code);
        if let Some(path) = qr_path {
            message = message.field("QR code", path.display().to_string());
        }
        self.ctx.chat.send(channel_id, &message).await?;

        tracing::info!(user_id, payment_id = %payment_id, "PIX charge posted");
        Ok(Some(payment_id))
    }

    async fn reject(
        &self,
        channel_id: u64,
        reason: impl Into<String>,
    ) -> Result<(), crate::chat::ChatError> {
        self.ctx
            .chat
            .send(channel_id, &OutboundMessage::new("Upload", reason.into()))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::RecordingChat;
    use crate::context::testutil;
    use hyperdeploy_cloud::MockHostingProvider;
    use hyperdeploy_payments::MockPixGateway;

    fn attachment(name: &str, size: usize) -> IncomingAttachment {
        IncomingAttachment {
            filename: name.into(),
            data: vec![0x50; size],
        }
    }

    async fn open_ticket(built: &testutil::TestContext) -> u64 {
        built
            .ctx
            .tickets
            .create(42, 1, 100)
            .unwrap()
            .unwrap()
            .channel_id
    }

    #[tokio::test]
    async fn test_accept_stores_archive_and_acknowledges() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let file = handler
            .accept(42, channel, vec![attachment("my bot.zip", 128)])
            .await
            .unwrap()
            .unwrap();

        assert!(file.filename.starts_with("42_"));
        assert!(file.filename.ends_with("_my bot.zip"));
        assert!(file.path.exists());
        assert_eq!(built.ctx.tickets.get(42).unwrap().files.len(), 1);

        // One ack, later edited with the stored details
        assert_eq!(built.chat.sent_to(channel).len(), 1);
        let edits = built.chat.edits.lock().unwrap();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].1.fields.iter().any(|(n, _)| n == "File"));
    }

    #[tokio::test]
    async fn test_accept_rejects_multiple_attachments() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let result = handler
            .accept(
                42,
                channel,
                vec![attachment("a.zip", 10), attachment("b.zip", 10)],
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(built.chat.sent_to(channel)[0].body.contains("exactly one"));
    }

    #[tokio::test]
    async fn test_accept_rejects_non_zip() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let result = handler
            .accept(42, channel, vec![attachment("bot.tar.gz", 10)])
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(built.chat.sent_to(channel)[0].body.contains("ZIP"));
        assert!(built.ctx.tickets.get(42).unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_accept_rejects_oversized_archive() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        built.ctx.config.set_max_file_size_mb(0).unwrap();
        let handler = UploadHandler::new(built.ctx.clone());

        let result = handler
            .accept(42, channel, vec![attachment("big.zip", 1)])
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(built.chat.sent_to(channel)[0].body.contains("too large"));
    }

    #[tokio::test]
    async fn test_accept_ignores_foreign_channel() {
        let built = testutil::context();
        open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let result = handler
            .accept(42, 999, vec![attachment("bot.zip", 10)])
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(built.chat.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_flow_creates_pending_charge() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let file = handler
            .accept(42, channel, vec![attachment("bot.zip", 64)])
            .await
            .unwrap()
            .unwrap();
        let payment_id = handler
            .start_payment_flow(42, channel, &file)
            .await
            .unwrap()
            .unwrap();

        let payment = built.ctx.ledger.get(&payment_id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.deploy_ready);
        assert_eq!(payment.deploy_file.as_deref(), Some(file.path.as_path()));
        assert!(payment.pix_code.is_some());
        assert!(payment.qr_code_path.as_ref().is_some_and(|p| p.exists()));

        let posted = built.chat.sent_to(channel);
        let pix = posted.last().unwrap();
        assert_eq!(pix.title, "PIX payment");
        assert!(pix.fields.iter().any(|(n, _)| n == "PIX code"));
    }

    #[tokio::test]
    async fn test_payment_flow_marks_failed_on_gateway_error() {
        let built = testutil::context_with(
            MockPixGateway::failing(),
            MockHostingProvider::new(),
            RecordingChat::new(),
        );
        let channel = open_ticket(&built).await;
        let handler = UploadHandler::new(built.ctx.clone());

        let file = handler
            .accept(42, channel, vec![attachment("bot.zip", 64)])
            .await
            .unwrap()
            .unwrap();
        let result = handler.start_payment_flow(42, channel, &file).await.unwrap();

        assert!(result.is_none());
        let failed = built.ctx.ledger.by_status(PaymentStatus::Failed);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.is_some());
    }

    #[tokio::test]
    async fn test_payment_flow_skipped_when_gateway_disabled() {
        let built = testutil::context();
        let channel = open_ticket(&built).await;
        built.ctx.config.set_mercadopago_enabled(false).unwrap();
        let handler = UploadHandler::new(built.ctx.clone());

        let file = handler
            .accept(42, channel, vec![attachment("bot.zip", 64)])
            .await
            .unwrap()
            .unwrap();
        let result = handler.start_payment_flow(42, channel, &file).await.unwrap();

        assert!(result.is_none());
        assert!(built.ctx.ledger.is_empty());
        assert!(
            built
                .chat
                .sent_to(channel)
                .last()
                .unwrap()
                .body
                .contains("unavailable")
        );
    }
}

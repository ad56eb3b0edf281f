//! Ticket Service
//!
//! Drives the ticket lifecycle: open a channel and register the ticket,
//! close both again, and sweep expired tickets on behalf of the cleanup
//! loop. The registry enforces the one-ticket-per-user rule; this service
//! owns the channel side effects around it.

use std::sync::Arc;

use chrono::Utc;
use hyperdeploy_core::TicketRecord;

use crate::chat::OutboundMessage;
use crate::context::AppContext;

pub struct TicketService {
    ctx: Arc<AppContext>,
}

impl TicketService {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Open a ticket for `user_id`.
    ///
    /// Returns `None` when the user already holds one. The channel is
    /// created first because it is named after the ticket number; if the
    /// registry insert then loses a concurrent race, the channel is deleted
    /// again.
    pub async fn open(&self, user_id: u64, guild_id: u64) -> anyhow::Result<Option<TicketRecord>> {
        if self.ctx.tickets.has_ticket(user_id) {
            tracing::debug!(user_id, "Ticket open refused, user already has one");
            return Ok(None);
        }

        let number = self.ctx.tickets.next_ticket_number()?;
        let name = format!("ticket-{number:03}");
        let channel_id = self
            .ctx
            .chat
            .create_ticket_channel(guild_id, &name, user_id)
            .await?;

        let Some(ticket) = self
            .ctx
            .tickets
            .register(user_id, guild_id, channel_id, number)?
        else {
            // Lost the race after the channel went up
            self.ctx
                .chat
                .delete_channel(channel_id, "duplicate ticket")
                .await?;
            return Ok(None);
        };

        self.ctx
            .chat
            .send(channel_id, &self.welcome_message())
            .await?;
        Ok(Some(ticket))
    }

    /// Close the ticket held by `user_id`, deleting its channel.
    ///
    /// Idempotent: returns `false` when there is nothing to close. A failed
    /// channel deletion does not keep the record alive.
    pub async fn close(&self, user_id: u64, reason: &str) -> anyhow::Result<bool> {
        let Some(ticket) = self.ctx.tickets.get(user_id) else {
            return Ok(false);
        };

        if let Err(e) = self
            .ctx
            .chat
            .delete_channel(ticket.channel_id, reason)
            .await
        {
            tracing::warn!(
                user_id,
                channel_id = ticket.channel_id,
                error = %e,
                "Channel deletion failed, removing ticket record anyway"
            );
        }

        let removed = self.ctx.tickets.remove(user_id)?;
        tracing::info!(user_id, reason, "Ticket closed");
        Ok(removed)
    }

    /// Close every ticket older than the configured timeout.
    pub async fn expire_sweep(&self) -> anyhow::Result<usize> {
        let timeout = self.ctx.config.ticket_timeout();
        let expired = self.ctx.tickets.expired(Utc::now(), timeout);
        let mut closed = 0;

        for user_id in expired {
            if self.close(user_id, "ticket expired").await? {
                closed += 1;
                let notice = OutboundMessage::new(
                    "Ticket expired",
                    format!(
                        "Your deploy ticket was closed after {} minutes of inactivity. \
                         Open a new one whenever you are ready.",
                        timeout.num_minutes()
                    ),
                );
                if let Err(e) = self.ctx.chat.send_dm(user_id, &notice).await {
                    tracing::warn!(user_id, error = %e, "Expiry notice not delivered");
                }
            }
        }

        if closed > 0 {
            tracing::info!(closed, "Expired tickets swept");
        }
        Ok(closed)
    }

    fn welcome_message(&self) -> OutboundMessage {
        let price = self.ctx.config.deploy_price();
        OutboundMessage::new(
            "Deploy ticket",
            "Upload your project as a single ZIP archive to get started. \
             A PIX charge is generated after the upload; the deploy runs \
             automatically once the payment is confirmed.",
        )
        .field("Price", format!("R$ {price:.2}"))
        .field(
            "Payment window",
            format!("{} minutes", self.ctx.config.payment_timeout().num_minutes()),
        )
        .field(
            "Max archive size",
            format!("{} MB", self.ctx.config.max_file_size_mb()),
        )
    }
}

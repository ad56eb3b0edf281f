//! Operator Console
//!
//! Line-based admin surface over stdin. Stands in for the chat front-end's
//! command handlers: opens and closes tickets, feeds archives into the
//! upload path, stores user API keys, settles payments by hand when the
//! gateway confirmation arrives out of band, releases blocked deploys, and
//! manages deployed applications through the hosting provider.

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use hyperdeploy_core::PaymentStatus;

use crate::context::AppContext;
use crate::tickets::TicketService;
use crate::upload::{IncomingAttachment, UploadHandler};

const USAGE: &str = "commands:
  open <user_id> <guild_id>          open a ticket
  close <user_id>                    close a ticket
  upload <user_id> <channel_id> <path>  feed an archive into the ticket
  key <user_id> <api_key>            store a hosting API key
  paid <payment_id>                  settle a pending payment
  unblock <payment_id>               put a blocked payment back in the deploy queue
  price <amount>                     set the deploy price
  stats                              ledger summary
  stop <user_id> <app_id>            stop an application
  restart <user_id> <app_id>         restart an application
  delete <user_id> <app_id>          delete an application
  logs <user_id> <app_id>            fetch recent application logs
  backup <user_id> <app_id>          request a backup
  domain <user_id> <app_id> <domain>    point a custom domain at an application
  undomain <user_id> <app_id> <domain>  remove a custom domain";

pub struct OperatorConsole {
    ctx: Arc<AppContext>,
    tickets: TicketService,
    uploads: UploadHandler,
}

impl OperatorConsole {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let tickets = TicketService::new(ctx.clone());
        let uploads = UploadHandler::new(ctx.clone());
        Self {
            ctx,
            tickets,
            uploads,
        }
    }

    /// Read commands from stdin until it closes.
    pub async fn run(self) {
        self.run_from(BufReader::new(tokio::io::stdin())).await;
    }

    async fn run_from<R>(self, reader: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            println!("{}", self.dispatch(line).await);
        }
        tracing::info!("Operator console input closed");
    }

    /// Execute one command line and describe the outcome.
    pub async fn dispatch(&self, line: &str) -> String {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let result = match parts.as_slice() {
            ["open", user, guild] => self.open(user, guild).await,
            ["close", user] => self.close(user).await,
            ["upload", user, channel, path] => self.upload(user, channel, path).await,
            ["key", user, key] => self.store_key(user, key),
            ["paid", payment_id] => self.settle(payment_id),
            ["unblock", payment_id] => self.unblock(payment_id),
            ["price", amount] => self.set_price(amount),
            ["stats"] => Ok(self.stats()),
            ["stop", user, app] => self.stop(user, app).await,
            ["restart", user, app] => self.restart(user, app).await,
            ["delete", user, app] => self.delete(user, app).await,
            ["logs", user, app] => self.show_logs(user, app).await,
            ["backup", user, app] => self.backup(user, app).await,
            ["domain", user, app, domain] => self.set_domain(user, app, domain).await,
            ["undomain", user, app, domain] => self.remove_domain(user, app, domain).await,
            _ => Ok(USAGE.to_string()),
        };
        result.unwrap_or_else(|e| format!("error: {e}"))
    }

    async fn open(&self, user: &str, guild: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        let guild_id = parse_id(guild)?;
        Ok(match self.tickets.open(user_id, guild_id).await? {
            Some(ticket) => format!(
                "ticket #{} opened (channel {})",
                ticket.ticket_number, ticket.channel_id
            ),
            None => "user already has an open ticket".into(),
        })
    }

    async fn close(&self, user: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        Ok(if self.tickets.close(user_id, "closed by operator").await? {
            "ticket closed".into()
        } else {
            "no open ticket for that user".into()
        })
    }

    async fn upload(&self, user: &str, channel: &str, path: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        let channel_id = parse_id(channel)?;

        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let data = tokio::fs::read(path).await?;

        let attachment = IncomingAttachment { filename, data };
        Ok(
            match self
                .uploads
                .handle(user_id, channel_id, vec![attachment])
                .await?
            {
                Some(file) => format!("archive stored as {}", file.filename),
                None => "archive rejected, see the ticket channel".into(),
            },
        )
    }

    fn store_key(&self, user: &str, key: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        self.ctx.keys.set(user_id, key)?;
        Ok("API key stored".into())
    }

    fn settle(&self, payment_id: &str) -> anyhow::Result<String> {
        Ok(
            if self
                .ctx
                .ledger
                .update_status(payment_id, PaymentStatus::Paid, None)?
            {
                "payment settled, deploy will start on the next tick".into()
            } else {
                "payment not found or not pending".into()
            },
        )
    }

    fn unblock(&self, payment_id: &str) -> anyhow::Result<String> {
        Ok(if self.ctx.ledger.release_block(payment_id)? {
            "payment released, deploy will retry on the next tick".into()
        } else {
            "payment not found or not blocked".into()
        })
    }

    fn set_price(&self, amount: &str) -> anyhow::Result<String> {
        let price: Decimal = amount.parse()?;
        self.ctx.config.set_deploy_price(price)?;
        Ok(format!("deploy price set to R$ {price:.2}"))
    }

    fn stats(&self) -> String {
        let stats = self.ctx.ledger.statistics();
        format!(
            "{} payments: {} pending, {} paid, {} deployed, {} failed, {} blocked, {} expired | \
             R$ {:.2} settled | {:.0}% success",
            stats.total,
            stats.pending,
            stats.paid,
            stats.deployed,
            stats.failed,
            stats.blocked,
            stats.expired,
            stats.total_paid_amount,
            stats.success_rate_percent
        )
    }

    async fn stop(&self, user: &str, app: &str) -> anyhow::Result<String> {
        let key = self.require_key(parse_id(user)?)?;
        self.ctx.host.stop(&key, app).await?;
        Ok(format!("application {app} stopped"))
    }

    async fn restart(&self, user: &str, app: &str) -> anyhow::Result<String> {
        let key = self.require_key(parse_id(user)?)?;
        self.ctx.host.restart(&key, app).await?;
        Ok(format!("application {app} restarted"))
    }

    async fn delete(&self, user: &str, app: &str) -> anyhow::Result<String> {
        let key = self.require_key(parse_id(user)?)?;
        self.ctx.host.delete(&key, app).await?;
        Ok(format!("application {app} deleted"))
    }

    async fn show_logs(&self, user: &str, app: &str) -> anyhow::Result<String> {
        let key = self.require_key(parse_id(user)?)?;
        let logs = self.ctx.host.logs(&key, app).await?;
        Ok(if logs.is_empty() {
            "no logs available".into()
        } else {
            logs
        })
    }

    async fn backup(&self, user: &str, app: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        let key = self.require_key(user_id)?;
        let record = self
            .ctx
            .backups
            .create(&key, app, &self.app_name(user_id, app))
            .await?;
        Ok(match record.url {
            Some(url) => format!("backup created: {url}"),
            None => format!(
                "backup created ({})",
                record.backup_id.as_deref().unwrap_or("id pending")
            ),
        })
    }

    async fn set_domain(&self, user: &str, app: &str, domain: &str) -> anyhow::Result<String> {
        let user_id = parse_id(user)?;
        let key = self.require_key(user_id)?;
        self.ctx
            .domains
            .set(&key, app, domain, &self.app_name(user_id, app))
            .await?;
        Ok(format!("domain {domain} configured for {app}"))
    }

    async fn remove_domain(&self, user: &str, app: &str, domain: &str) -> anyhow::Result<String> {
        let key = self.require_key(parse_id(user)?)?;
        Ok(if self.ctx.domains.remove(&key, app, domain).await? {
            format!("domain {domain} removed")
        } else {
            "domain was not configured".into()
        })
    }

    fn require_key(&self, user_id: u64) -> anyhow::Result<String> {
        self.ctx
            .keys
            .get(user_id)
            .ok_or_else(|| anyhow::anyhow!("no API key on file for user {user_id}"))
    }

    /// Name recorded at deploy time, when the ledger has one for this app.
    fn app_name(&self, user_id: u64, app_id: &str) -> String {
        self.ctx
            .ledger
            .by_user(user_id)
            .into_iter()
            .filter(|p| p.app_id.as_deref() == Some(app_id))
            .find_map(|p| p.app_name)
            .unwrap_or_else(|| app_id.to_string())
    }
}

fn parse_id(raw: &str) -> anyhow::Result<u64> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("invalid id: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testutil;

    #[tokio::test]
    async fn test_open_close_cycle() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let reply = console.dispatch("open 42 1").await;
        assert_eq!(reply, "ticket #1 opened (channel 1)");
        assert_eq!(
            console.dispatch("open 42 1").await,
            "user already has an open ticket"
        );

        assert_eq!(console.dispatch("close 42").await, "ticket closed");
        assert_eq!(
            console.dispatch("close 42").await,
            "no open ticket for that user"
        );
    }

    #[tokio::test]
    async fn test_settle_transitions_pending_payment() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let id = built
            .ctx
            .ledger
            .create(
                42,
                rust_decimal_macros::dec!(10.00),
                "HyperDeploy - app.zip",
                chrono::Duration::minutes(30),
            )
            .unwrap();

        let reply = console.dispatch(&format!("paid {id}")).await;
        assert!(reply.contains("settled"));
        assert_eq!(
            built.ctx.ledger.get(&id).unwrap().status,
            PaymentStatus::Paid
        );

        assert_eq!(
            console.dispatch("paid pix_nope").await,
            "payment not found or not pending"
        );
    }

    #[tokio::test]
    async fn test_price_and_key_validation_errors_are_reported() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        assert!(console.dispatch("price -5").await.starts_with("error:"));
        assert!(console.dispatch("key 42 short").await.starts_with("error:"));
        assert_eq!(
            console.dispatch("price 15.50").await,
            "deploy price set to R$ 15.50"
        );
        assert_eq!(console.dispatch("key 42 squarecloud-key-0123456789").await, "API key stored");
    }

    #[tokio::test]
    async fn test_unknown_command_prints_usage() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());
        assert!(console.dispatch("frobnicate").await.contains("commands:"));
    }

    #[tokio::test]
    async fn test_run_drains_input_and_returns_on_eof() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let input: &[u8] = b"open 42 1\n\n";
        console.run_from(BufReader::new(input)).await;

        assert!(built.ctx.tickets.get(42).is_some());
    }

    #[tokio::test]
    async fn test_unblock_returns_payment_to_deploy_queue() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let id = built
            .ctx
            .ledger
            .create(
                42,
                rust_decimal_macros::dec!(10.00),
                "HyperDeploy - app.zip",
                chrono::Duration::minutes(30),
            )
            .unwrap();
        built
            .ctx
            .ledger
            .attach_deploy_file(&id, built.dir.path().join("app.zip"))
            .unwrap();
        built.ctx.ledger.mark_ready_for_deploy(&id).unwrap();
        built
            .ctx
            .ledger
            .update_status(&id, PaymentStatus::Paid, None)
            .unwrap();
        for _ in 0..hyperdeploy_core::MAX_DEPLOY_ATTEMPTS {
            built
                .ctx
                .ledger
                .note_precondition_failure(&id, "no api key")
                .unwrap();
        }
        assert_eq!(
            built.ctx.ledger.get(&id).unwrap().status,
            PaymentStatus::Blocked
        );

        let reply = console.dispatch(&format!("unblock {id}")).await;
        assert!(reply.contains("released"));
        let record = built.ctx.ledger.get(&id).unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.deploy_attempts, 0);

        assert_eq!(
            console.dispatch("unblock pix_nope").await,
            "payment not found or not blocked"
        );
    }

    #[tokio::test]
    async fn test_stats_reports_failed_and_blocked_counts() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let id = built
            .ctx
            .ledger
            .create(
                42,
                rust_decimal_macros::dec!(10.00),
                "HyperDeploy - app.zip",
                chrono::Duration::minutes(30),
            )
            .unwrap();
        built
            .ctx
            .ledger
            .update_status(&id, PaymentStatus::Failed, None)
            .unwrap();

        let reply = console.dispatch("stats").await;
        assert!(reply.contains("1 failed"));
        assert!(reply.contains("0 blocked"));
    }

    #[tokio::test]
    async fn test_app_commands_require_stored_key() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());

        let reply = console.dispatch("stop 42 app-1").await;
        assert!(reply.starts_with("error: no API key"));

        console.dispatch("key 42 squarecloud-key-0123456789").await;
        assert_eq!(
            console.dispatch("stop 42 app-1").await,
            "application app-1 stopped"
        );
        assert_eq!(
            console.dispatch("restart 42 app-1").await,
            "application app-1 restarted"
        );
        assert_eq!(console.dispatch("logs 42 app-1").await, "no logs available");
    }

    #[tokio::test]
    async fn test_backup_and_domain_commands_record_locally() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());
        console.dispatch("key 42 squarecloud-key-0123456789").await;

        let reply = console.dispatch("backup 42 app-1").await;
        assert!(reply.starts_with("backup created"));
        assert_eq!(built.ctx.backups.for_app("app-1").len(), 1);

        assert_eq!(
            console.dispatch("domain 42 app-1 bot.example.com").await,
            "domain bot.example.com configured for app-1"
        );
        assert!(built.ctx.domains.get("app-1", "bot.example.com").is_some());

        assert_eq!(
            console.dispatch("undomain 42 app-1 bot.example.com").await,
            "domain bot.example.com removed"
        );
        assert_eq!(
            console.dispatch("undomain 42 app-1 bot.example.com").await,
            "domain was not configured"
        );

        assert!(
            console
                .dispatch("domain 42 app-1 nodots")
                .await
                .starts_with("error:")
        );
    }

    #[tokio::test]
    async fn test_upload_command_feeds_the_upload_path() {
        let built = testutil::context();
        let console = OperatorConsole::new(built.ctx.clone());
        console.dispatch("open 42 1").await;
        let channel = built.ctx.tickets.get(42).unwrap().channel_id;

        let archive = built.dir.path().join("app.zip");
        std::fs::write(&archive, b"PK\x03\x04").unwrap();

        let reply = console
            .dispatch(&format!("upload 42 {channel} {}", archive.display()))
            .await;
        assert!(reply.starts_with("archive stored as 42_"));
        assert_eq!(built.ctx.tickets.get(42).unwrap().files.len(), 1);
    }
}

//! HyperDeploy Daemon
//!
//! Ticket, upload and deploy reconciliation daemon. Owns the flat JSON
//! stores, mints PIX charges for uploaded archives, and pushes paid
//! deploys to Square Cloud in a background loop.

mod chat;
mod cleanup;
mod console;
mod context;
mod reconcile;
mod tickets;
mod upload;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hyperdeploy_cloud::SquareClient;
use hyperdeploy_payments::MercadoPagoClient;

use crate::chat::ConsoleChat;
use crate::cleanup::CleanupSweeper;
use crate::console::OperatorConsole;
use crate::context::{AppContext, Settings};
use crate::reconcile::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let settings = Settings::from_env();

    // PIX gateway (degraded mode without credentials)
    let gateway = match MercadoPagoClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Mercado Pago configured");
            Some(Arc::new(client) as Arc<dyn hyperdeploy_payments::PixGateway>)
        }
        Err(_) => {
            tracing::warn!("⚠ Mercado Pago not configured - PIX charges disabled");
            tracing::warn!("  Set MERCADOPAGO_ACCESS_TOKEN in .env");
            None
        }
    };

    let host = Arc::new(SquareClient::new());
    let chat = Arc::new(ConsoleChat::new());

    let ctx = Arc::new(AppContext::initialize(&settings, gateway, host, chat)?);

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 HyperDeploy daemon running");
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("  Data dir:    {}", settings.data_dir.display());
    tracing::info!("  Uploads dir: {}", settings.uploads_dir.display());
    tracing::info!("  QR dir:      {}", settings.qrcodes_dir.display());
    tracing::info!("  Deploy price: R$ {:.2}", ctx.config.deploy_price());
    tracing::info!("  Payments: {}", ctx.ledger.len());
    tracing::info!("  Tickets:  {}", ctx.tickets.count());
    tracing::info!("");

    // Background loops
    tokio::spawn(Reconciler::new(ctx.clone()).run());
    tokio::spawn(CleanupSweeper::new(ctx.clone()).run());

    // Operator commands on stdin
    let console = tokio::spawn(OperatorConsole::new(ctx.clone()).run());

    // Stdin may be /dev/null under a supervisor; the background loops keep
    // running until an external interrupt arrives.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = console => {
            tracing::warn!("Operator console closed, running headless until interrupted");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    tracing::info!("Shutting down");

    Ok(())
}

//! Application Context
//!
//! Every store and external client the daemon needs, built once at startup
//! and passed around as `Arc<AppContext>`. Collaborators with a network
//! edge sit behind trait objects so tests can substitute mocks.

use std::path::PathBuf;
use std::sync::Arc;

use hyperdeploy_cloud::{BackupRegistry, DomainRegistry, HostingProvider};
use hyperdeploy_core::{ConfigStore, PaymentLedger, TicketRegistry, UserKeyStore};
use hyperdeploy_payments::PixGateway;

use crate::chat::ChatGateway;

/// Filesystem layout, resolved from the environment
pub struct Settings {
    /// Directory for the flat JSON stores
    pub data_dir: PathBuf,

    /// Directory for uploaded deploy archives
    pub uploads_dir: PathBuf,

    /// Directory for rendered PIX QR images
    pub qrcodes_dir: PathBuf,
}

impl Settings {
    /// Read the layout from `HYPERDEPLOY_*` variables, with defaults
    /// relative to the working directory.
    pub fn from_env() -> Self {
        let dir = |var: &str, default: &str| {
            PathBuf::from(std::env::var(var).unwrap_or_else(|_| default.into()))
        };
        Self {
            data_dir: dir("HYPERDEPLOY_DATA_DIR", "data"),
            uploads_dir: dir("HYPERDEPLOY_UPLOADS_DIR", "uploads"),
            qrcodes_dir: dir("HYPERDEPLOY_QRCODES_DIR", "qrcodes"),
        }
    }
}

/// Shared application context
pub struct AppContext {
    /// Admin-tunable settings (`admin_config.json`)
    pub config: ConfigStore,

    /// Payment ledger (`payments.json`)
    pub ledger: PaymentLedger,

    /// Ticket registry (`tickets.json` + `ticket_counter.json`)
    pub tickets: TicketRegistry,

    /// Per-user hosting API keys (`user_keys.json`)
    pub keys: UserKeyStore,

    /// Configured custom domains (`domains.json`)
    pub domains: DomainRegistry,

    /// Requested backups (`backups.json`)
    pub backups: BackupRegistry,

    /// PIX gateway (None when no credentials are configured)
    pub gateway: Option<Arc<dyn PixGateway>>,

    /// Hosting provider the deploys go to
    pub host: Arc<dyn HostingProvider>,

    /// Chat front-end carrying the ticket conversation
    pub chat: Arc<dyn ChatGateway>,

    /// Directory for uploaded deploy archives
    pub uploads_dir: PathBuf,

    /// Directory for rendered PIX QR images
    pub qrcodes_dir: PathBuf,
}

impl AppContext {
    /// Open every store under `settings.data_dir` and assemble the context.
    pub fn initialize(
        settings: &Settings,
        gateway: Option<Arc<dyn PixGateway>>,
        host: Arc<dyn HostingProvider>,
        chat: Arc<dyn ChatGateway>,
    ) -> anyhow::Result<Self> {
        let data = &settings.data_dir;
        std::fs::create_dir_all(data)?;
        std::fs::create_dir_all(&settings.uploads_dir)?;
        std::fs::create_dir_all(&settings.qrcodes_dir)?;

        Ok(Self {
            config: ConfigStore::open(data.join("admin_config.json"))?,
            ledger: PaymentLedger::open(data.join("payments.json"))?,
            tickets: TicketRegistry::open(
                data.join("tickets.json"),
                data.join("ticket_counter.json"),
            )?,
            keys: UserKeyStore::open(data.join("user_keys.json"))?,
            domains: DomainRegistry::open(data.join("domains.json"), host.clone())?,
            backups: BackupRegistry::open(data.join("backups.json"), host.clone())?,
            gateway,
            host,
            chat,
            uploads_dir: settings.uploads_dir.clone(),
            qrcodes_dir: settings.qrcodes_dir.clone(),
        })
    }
}

#[cfg(test)]
pub mod testutil {
    use super::*;
    use hyperdeploy_cloud::MockHostingProvider;
    use hyperdeploy_payments::MockPixGateway;

    use crate::chat::RecordingChat;

    /// Context wired with mocks and rooted in a temp directory.
    pub struct TestContext {
        pub ctx: Arc<AppContext>,
        pub chat: Arc<RecordingChat>,
        pub host: Arc<MockHostingProvider>,
        pub dir: tempfile::TempDir,
    }

    pub fn context() -> TestContext {
        context_with(
            MockPixGateway::new(),
            MockHostingProvider::new(),
            RecordingChat::new(),
        )
    }

    pub fn context_with(
        gateway: MockPixGateway,
        host: MockHostingProvider,
        chat: RecordingChat,
    ) -> TestContext {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            data_dir: dir.path().join("data"),
            uploads_dir: dir.path().join("uploads"),
            qrcodes_dir: dir.path().join("qrcodes"),
        };
        let chat = Arc::new(chat);
        let host = Arc::new(host);
        let ctx = AppContext::initialize(
            &settings,
            Some(Arc::new(gateway)),
            host.clone(),
            chat.clone(),
        )
        .unwrap();
        TestContext {
            ctx: Arc::new(ctx),
            chat,
            host,
            dir,
        }
    }
}

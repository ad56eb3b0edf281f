//! # hyperdeploy-core
//!
//! Data model and flat-file stores for HyperDeploy: the payment ledger and
//! its status machine, the ticket registry, the admin config store, and the
//! per-user provider credential store.
//!
//! Every store is a process-local JSON document store ([`store::JsonStore`]):
//! an in-memory map behind one lock, persisted wholesale on each mutation
//! with an atomic temp-file rename. There is no cross-file atomicity and no
//! cross-process locking; each store must be owned by exactly one manager
//! instance, and all mutation goes through it.

pub mod config;
pub mod error;
pub mod keys;
pub mod payment;
pub mod store;
pub mod ticket;

pub use config::{AdminConfig, ConfigStore, DEFAULT_DEPLOY_PRICE};
pub use error::{CoreError, Result};
pub use keys::UserKeyStore;
pub use payment::{
    LedgerStats, MAX_DEPLOY_ATTEMPTS, PaymentLedger, PaymentRecord, PaymentStatus, StatusUpdate,
};
pub use store::JsonStore;
pub use ticket::{TicketFile, TicketRecord, TicketRegistry, TicketStatus};

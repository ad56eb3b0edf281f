//! # hyperdeploy-cloud
//!
//! Square Cloud integration for HyperDeploy: the [`HostingProvider`] trait
//! and its REST client, plus the local domain and backup registries that
//! mirror what was configured through the panel.
//!
//! The reconciliation loop consumes this crate through `Arc<dyn
//! HostingProvider>`, so tests substitute [`MockHostingProvider`] and never
//! touch the network.

mod backups;
mod client;
mod domains;
mod error;
mod mock;

pub use backups::{BackupRecord, BackupRegistry};
pub use client::{AppInfo, BackupInfo, HostingProvider, SquareClient};
pub use domains::{DomainRecord, DomainRegistry, is_valid_domain};
pub use error::{CloudError, Result};
pub use mock::MockHostingProvider;

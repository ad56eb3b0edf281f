//! # hyperdeploy-payments
//!
//! PIX charge creation and QR rendering for HyperDeploy.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────────┐
//! │  Upload  │───▶│  Mercado Pago │───▶│  QR image in │
//! │  handler │    │  /v1/payments │    │  the ticket  │
//! └──────────┘    └───────────────┘    └──────────────┘
//! ```
//!
//! The gateway returns a redeemable copy-paste code; [`qr::render_code_svg`]
//! turns it into a scannable image. Payment confirmation does not come back
//! through this crate; the reconciliation loop watches the ledger for
//! records marked `paid`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hyperdeploy_payments::{ChargeRequest, MercadoPagoClient, PixGateway};
//!
//! let gateway = MercadoPagoClient::from_env()?;
//! let charge = gateway
//!     .create_charge(ChargeRequest::new(amount, "Deploy HyperDeploy"))
//!     .await?;
//! // charge.code is the PIX payload to render and show to the user
//! ```

mod error;
mod pix;
pub mod qr;

pub use error::{PaymentError, Result};
pub use pix::{ChargeRequest, MercadoPagoClient, MockPixGateway, PixCharge, PixGateway};

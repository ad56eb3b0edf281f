//! PIX Charge Creation
//!
//! `PixGateway` is the seam to the payment rail: given an amount and a
//! description it mints a redeemable PIX copy-paste code. The production
//! implementation talks to the Mercado Pago payments API.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Payer e-mail used when the buyer's address is unknown
const DEFAULT_PAYER_EMAIL: &str = "comprador@email.com";

/// Request to mint a PIX charge
#[derive(Clone, Debug, Serialize)]
pub struct ChargeRequest {
    /// Charge amount
    pub amount: Decimal,

    /// Human-readable description shown to the payer
    pub description: String,

    /// Payer e-mail
    pub payer_email: String,
}

impl ChargeRequest {
    pub fn new(amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            amount,
            description: description.into(),
            payer_email: DEFAULT_PAYER_EMAIL.into(),
        }
    }
}

/// A minted PIX charge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PixCharge {
    /// Gateway-side charge id
    pub charge_id: Option<String>,

    /// Copy-paste PIX code; also the QR payload
    pub code: String,
}

/// Payment gateway trait
///
/// Implement this for each rail; tests use [`MockPixGateway`].
#[async_trait]
pub trait PixGateway: Send + Sync {
    /// Mint a PIX charge and return its redeemable code
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge>;

    /// Gateway name
    fn name(&self) -> &str;
}

/// Mercado Pago gateway client
pub struct MercadoPagoClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl MercadoPagoClient {
    /// Create a client with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            base_url: "https://api.mercadopago.com".into(),
        }
    }

    /// Create from the `MERCADOPAGO_ACCESS_TOKEN` environment variable
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("MERCADOPAGO_ACCESS_TOKEN")
            .map_err(|_| PaymentError::Config("MERCADOPAGO_ACCESS_TOKEN not set".into()))?;
        Ok(Self::new(token))
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    transaction_amount: Decimal,
    description: &'a str,
    payment_method_id: &'a str,
    payer: PayerBody<'a>,
}

#[derive(Serialize)]
struct PayerBody<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct CreatePaymentResponse {
    id: Option<serde_json::Value>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
}

#[async_trait]
impl PixGateway for MercadoPagoClient {
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(request.amount));
        }

        let body = CreatePaymentBody {
            transaction_amount: request.amount,
            description: &request.description,
            payment_method_id: "pix",
            payer: PayerBody {
                email: &request.payer_email,
            },
        };

        // The idempotency key is mandatory on this endpoint; a fresh one per
        // call means retries mint separate charges.
        let response = self
            .http
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 201 {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "Mercado Pago charge failed");
            return Err(PaymentError::Gateway {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreatePaymentResponse = response.json().await?;
        let code = parsed
            .point_of_interaction
            .and_then(|p| p.transaction_data)
            .and_then(|t| t.qr_code)
            .ok_or_else(|| {
                PaymentError::MalformedResponse(
                    "missing point_of_interaction.transaction_data.qr_code".into(),
                )
            })?;

        let charge_id = parsed.id.map(|v| v.to_string());
        tracing::info!(
            amount = %request.amount,
            charge_id = charge_id.as_deref().unwrap_or("unknown"),
            "PIX charge created"
        );

        Ok(PixCharge { charge_id, code })
    }

    fn name(&self) -> &str {
        "mercadopago"
    }
}

/// Deterministic in-memory gateway (for development and tests)
pub struct MockPixGateway {
    fail: bool,
}

impl Default for MockPixGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPixGateway {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// A gateway whose charges always fail
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl PixGateway for MockPixGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<PixCharge> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(request.amount));
        }
        if self.fail {
            return Err(PaymentError::Gateway {
                status: 500,
                body: "mock gateway failure".into(),
            });
        }

        Ok(PixCharge {
            charge_id: Some("mock-charge-1".into()),
            code: format!("00020126MOCKPIX{}5802BR", request.amount),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

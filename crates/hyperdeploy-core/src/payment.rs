//! Payment Ledger
//!
//! Payment records and their status machine, persisted to
//! `data/payments.json`. The ledger owns the backing store; all mutation
//! goes through it, and the transitions that guard against double-processing
//! run as compare-and-set operations under the store's write lock.
//!
//! Status machine:
//!
//! ```text
//! pending -> paid -> processing -> { deployed, failed }
//! pending -> expired            (timeout, never paid)
//! pending -> failed             (charge creation failed)
//! paid    -> blocked            (precondition kept failing)
//! blocked -> paid               (operator releases the block)
//! ```
//!
//! `deployed`, `failed` and `expired` are terminal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::store::JsonStore;

/// Precondition failures tolerated before a paid record is blocked.
///
/// At the 10-second reconciliation interval this is roughly five minutes.
/// The source system retried a permanently missing credential forever; the
/// bounded counter plus the `blocked` status make the stall visible to
/// operators instead.
pub const MAX_DEPLOY_ATTEMPTS: u32 = 30;

/// Payment lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Processing,
    Deployed,
    Failed,
    Expired,
    Blocked,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Deployed => "deployed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Blocked => "blocked",
        }
    }

    /// Whether this state admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Deployed | PaymentStatus::Failed | PaymentStatus::Expired
        )
    }

    /// Whether a transition into `next` is allowed
    pub fn can_transition(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::{Blocked, Deployed, Expired, Failed, Paid, Pending, Processing};
        matches!(
            (self, next),
            (Pending, Paid | Expired | Failed)
                | (Paid, Processing | Blocked)
                | (Processing, Deployed | Failed)
                | (Blocked, Paid)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Ledger id, `pix_<user_id>_<unix_ts>`
    pub id: String,

    /// Owning user
    pub user_id: u64,

    /// Charged amount
    pub amount: Decimal,

    /// Human-readable charge description
    pub description: String,

    /// Lifecycle state
    pub status: PaymentStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Expiry deadline for unpaid records
    pub expires_at: DateTime<Utc>,

    /// Set when the record first enters `paid`
    pub paid_at: Option<DateTime<Utc>>,

    /// PIX copy-paste code minted by the gateway
    #[serde(default)]
    pub pix_code: Option<String>,

    /// Rendered QR image, deleted on expiry
    #[serde(default)]
    pub qr_code_path: Option<PathBuf>,

    /// Uploaded archive to deploy once paid
    #[serde(default)]
    pub deploy_file: Option<PathBuf>,

    /// Archive attached and payment flow completed on the upload side
    #[serde(default)]
    pub deploy_ready: bool,

    /// When the record became ready for deploy
    #[serde(default)]
    pub deploy_ready_at: Option<DateTime<Utc>>,

    /// Guard against double-processing; set by `claim_for_processing`
    #[serde(default)]
    pub deploy_processed: bool,

    /// Precondition failures observed by the reconciliation loop
    #[serde(default)]
    pub deploy_attempts: u32,

    /// Provider application id after a successful deploy
    #[serde(default)]
    pub app_id: Option<String>,

    /// Provider application name after a successful deploy
    #[serde(default)]
    pub app_name: Option<String>,

    /// Error text for `failed` and `blocked` records
    #[serde(default)]
    pub error: Option<String>,
}

/// Extra fields merged into a record on a status transition
#[derive(Clone, Debug, Default)]
pub struct StatusUpdate {
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn deployed_app(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_id: Some(id.into()),
            app_name: Some(name.into()),
            error: None,
        }
    }
}

/// Aggregate ledger statistics
#[derive(Clone, Debug, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub pending: usize,
    pub paid: usize,
    pub deployed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub expired: usize,
    pub total_paid_amount: Decimal,
    pub success_rate_percent: f64,
}

/// Flat-file payment ledger
pub struct PaymentLedger {
    store: JsonStore<PaymentRecord>,
}

impl PaymentLedger {
    /// Open the ledger at `path` (`data/payments.json`)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = JsonStore::open(path)?;
        tracing::info!(payments = store.len(), "Payment ledger loaded");
        Ok(Self { store })
    }

    /// Create a new pending payment and persist it.
    ///
    /// Rejects non-positive amounts without touching the ledger. The expiry
    /// deadline is `created_at + timeout`.
    pub fn create(
        &self,
        user_id: u64,
        amount: Decimal,
        description: impl Into<String>,
        timeout: Duration,
    ) -> Result<String> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation(format!(
                "payment amount must be greater than zero, got {amount}"
            )));
        }

        let now = Utc::now();
        let description = description.into();

        let id = self.store.mutate(|records| {
            // Ids embed the unix second; bump until free so two uploads in
            // the same second for one user both get a record.
            let mut ts = now.timestamp();
            let mut id = format!("pix_{user_id}_{ts}");
            while records.contains_key(&id) {
                ts += 1;
                id = format!("pix_{user_id}_{ts}");
            }

            let record = PaymentRecord {
                id: id.clone(),
                user_id,
                amount,
                description,
                status: PaymentStatus::Pending,
                created_at: now,
                expires_at: now + timeout,
                paid_at: None,
                pix_code: None,
                qr_code_path: None,
                deploy_file: None,
                deploy_ready: false,
                deploy_ready_at: None,
                deploy_processed: false,
                deploy_attempts: 0,
                app_id: None,
                app_name: None,
                error: None,
            };
            records.insert(id.clone(), record);
            id
        })?;

        tracing::info!(
            payment_id = %id,
            user_id,
            amount = %amount,
            "Payment created"
        );
        Ok(id)
    }

    /// Get a payment by id
    pub fn get(&self, id: &str) -> Option<PaymentRecord> {
        self.store.get(id)
    }

    /// Transition a payment to `status`, merging `extra` fields.
    ///
    /// Returns `false` when the id is absent or the transition is not
    /// allowed by the status machine. `paid_at` is stamped on entry into
    /// `paid`.
    pub fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        extra: Option<StatusUpdate>,
    ) -> Result<bool> {
        let applied = self.store.mutate(|records| {
            let Some(record) = records.get_mut(id) else {
                tracing::warn!(payment_id = %id, "Status update for unknown payment");
                return false;
            };

            if !record.status.can_transition(status) {
                tracing::warn!(
                    payment_id = %id,
                    from = %record.status,
                    to = %status,
                    "Rejected status transition"
                );
                return false;
            }

            record.status = status;
            if status == PaymentStatus::Paid {
                record.paid_at = Some(Utc::now());
            }

            if let Some(extra) = extra {
                if extra.app_id.is_some() {
                    record.app_id = extra.app_id;
                }
                if extra.app_name.is_some() {
                    record.app_name = extra.app_name;
                }
                if extra.error.is_some() {
                    record.error = extra.error;
                }
            }
            true
        })?;

        if applied {
            tracing::info!(payment_id = %id, status = %status, "Payment status updated");
        }
        Ok(applied)
    }

    /// Payments belonging to `user_id`
    pub fn by_user(&self, user_id: u64) -> Vec<PaymentRecord> {
        self.store.filter(|p| p.user_id == user_id)
    }

    /// Payments currently in `status`
    pub fn by_status(&self, status: PaymentStatus) -> Vec<PaymentRecord> {
        self.store.filter(|p| p.status == status)
    }

    /// Pending payments whose expiry deadline has passed
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<PaymentRecord> {
        self.store
            .filter(|p| p.status == PaymentStatus::Pending && p.expires_at < now)
    }

    /// Paid payments with an attached archive, flagged ready and not yet
    /// claimed by the reconciliation loop
    pub fn ready_for_deploy(&self) -> Vec<PaymentRecord> {
        self.store.filter(|p| {
            p.status == PaymentStatus::Paid
                && p.deploy_ready
                && p.deploy_file.is_some()
                && !p.deploy_processed
        })
    }

    /// Payments created within the last `hours`
    pub fn recent(&self, hours: i64) -> Vec<PaymentRecord> {
        let cutoff = Utc::now() - Duration::hours(hours);
        self.store.filter(|p| p.created_at > cutoff)
    }

    /// Attach the uploaded archive to a payment
    pub fn attach_deploy_file(&self, id: &str, path: impl Into<PathBuf>) -> Result<bool> {
        let path = path.into();
        self.store.update(id, |p| p.deploy_file = Some(path))
    }

    /// Record the PIX code and rendered QR image for a payment
    pub fn set_pix_details(
        &self,
        id: &str,
        code: impl Into<String>,
        qr_path: Option<PathBuf>,
    ) -> Result<bool> {
        let code = code.into();
        self.store.update(id, |p| {
            p.pix_code = Some(code);
            p.qr_code_path = qr_path;
        })
    }

    /// Flag a payment as ready for deploy once the upload side is done
    pub fn mark_ready_for_deploy(&self, id: &str) -> Result<bool> {
        self.store.update(id, |p| {
            p.deploy_ready = true;
            p.deploy_ready_at = Some(Utc::now());
        })
    }

    /// Claim a paid payment for processing (compare-and-set).
    ///
    /// Only a `paid`, unprocessed record wins the claim; it transitions to
    /// `processing` with the `deploy_processed` guard set in the same
    /// critical section, so no two loop iterations can deploy the same
    /// record.
    pub fn claim_for_processing(&self, id: &str) -> Result<bool> {
        let claimed = self.store.mutate(|records| {
            let Some(record) = records.get_mut(id) else {
                return false;
            };
            if record.status != PaymentStatus::Paid || record.deploy_processed {
                return false;
            }
            record.status = PaymentStatus::Processing;
            record.deploy_processed = true;
            true
        })?;

        if claimed {
            tracing::info!(payment_id = %id, "Payment claimed for processing");
        }
        Ok(claimed)
    }

    /// Record a deploy precondition failure (missing archive or credential).
    ///
    /// Increments the bounded attempt counter; when the limit is reached the
    /// record transitions `paid -> blocked` with the reason recorded, and
    /// `true` is returned.
    pub fn note_precondition_failure(&self, id: &str, reason: &str) -> Result<bool> {
        let blocked = self.store.mutate(|records| {
            let Some(record) = records.get_mut(id) else {
                return false;
            };
            if record.status != PaymentStatus::Paid {
                return false;
            }

            record.deploy_attempts += 1;
            if record.deploy_attempts >= MAX_DEPLOY_ATTEMPTS {
                record.status = PaymentStatus::Blocked;
                record.error = Some(reason.to_string());
                return true;
            }
            false
        })?;

        if blocked {
            tracing::warn!(payment_id = %id, reason, "Payment blocked after repeated precondition failures");
        }
        Ok(blocked)
    }

    /// Release a blocked payment back into the deploy scan (compare-and-set).
    ///
    /// Resets the attempt counter and clears the recorded reason; the record
    /// returns to `paid` and the reconciliation loop picks it up on the next
    /// tick. Returns `false` unless the record is currently `blocked`.
    pub fn release_block(&self, id: &str) -> Result<bool> {
        let released = self.store.mutate(|records| {
            let Some(record) = records.get_mut(id) else {
                return false;
            };
            if record.status != PaymentStatus::Blocked {
                return false;
            }
            record.status = PaymentStatus::Paid;
            record.deploy_attempts = 0;
            record.error = None;
            true
        })?;

        if released {
            tracing::info!(payment_id = %id, "Blocked payment released");
        }
        Ok(released)
    }

    /// Expire every pending payment past its deadline.
    ///
    /// Deletes the rendered QR image alongside the transition. Safe to call
    /// repeatedly; already-expired records are untouched.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let (expired, qr_paths) = self.store.mutate(|records| {
            let mut expired = Vec::new();
            let mut qr_paths = Vec::new();
            for record in records.values_mut() {
                if record.status == PaymentStatus::Pending && record.expires_at < now {
                    record.status = PaymentStatus::Expired;
                    expired.push(record.id.clone());
                    if let Some(path) = record.qr_code_path.take() {
                        qr_paths.push(path);
                    }
                }
            }
            (expired, qr_paths)
        })?;

        for path in qr_paths {
            remove_file_best_effort(&path, "QR image");
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired pending payments");
        }
        Ok(expired)
    }

    /// Aggregate counters over the whole ledger
    pub fn statistics(&self) -> LedgerStats {
        let all = self.store.values();
        let total = all.len();
        let count = |s: PaymentStatus| all.iter().filter(|p| p.status == s).count();

        let settled = all
            .iter()
            .filter(|p| p.paid_at.is_some())
            .collect::<Vec<_>>();
        let total_paid_amount = settled.iter().map(|p| p.amount).sum();

        LedgerStats {
            total,
            pending: count(PaymentStatus::Pending),
            paid: count(PaymentStatus::Paid),
            deployed: count(PaymentStatus::Deployed),
            failed: count(PaymentStatus::Failed),
            blocked: count(PaymentStatus::Blocked),
            expired: count(PaymentStatus::Expired),
            total_paid_amount,
            success_rate_percent: if total > 0 {
                settled.len() as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Exact on-disk JSON snapshot
    pub fn export_json(&self) -> Result<String> {
        self.store.export_json()
    }

    /// Number of records in the ledger
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the ledger holds no records
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

fn remove_file_best_effort(path: &Path, what: &str) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed {what}"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove {what}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_ledger(dir: &tempfile::TempDir) -> PaymentLedger {
        PaymentLedger::open(dir.path().join("payments.json")).unwrap()
    }

    #[test]
    fn test_create_appears_pending_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);

        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();

        assert!(id.starts_with("pix_42_"));
        let pending = ledger.by_status(PaymentStatus::Pending);
        assert!(pending.iter().any(|p| p.id == id));
    }

    #[test]
    fn test_create_rejects_non_positive_amount() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);

        assert!(
            ledger
                .create(42, Decimal::ZERO, "Deploy", Duration::minutes(30))
                .is_err()
        );
        assert!(
            ledger
                .create(42, dec!(-1.00), "Deploy", Duration::minutes(30))
                .is_err()
        );
        // No partial record survives a rejected create
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_same_second_creates_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);

        let a = ledger
            .create(7, dec!(10.00), "first", Duration::minutes(30))
            .unwrap();
        let b = ledger
            .create(7, dec!(10.00), "second", Duration::minutes(30))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_paid_transition_stamps_paid_at() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();

        assert!(ledger.update_status(&id, PaymentStatus::Paid, None).unwrap());

        let record = ledger.get(&id).unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert!(record.paid_at.is_some());
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();

        // pending cannot jump straight to deployed
        assert!(
            !ledger
                .update_status(&id, PaymentStatus::Deployed, None)
                .unwrap()
        );

        ledger.update_status(&id, PaymentStatus::Paid, None).unwrap();
        ledger
            .update_status(&id, PaymentStatus::Processing, None)
            .unwrap();
        ledger
            .update_status(&id, PaymentStatus::Deployed, None)
            .unwrap();

        // terminal states admit nothing further
        assert!(
            !ledger
                .update_status(&id, PaymentStatus::Failed, None)
                .unwrap()
        );
    }

    #[test]
    fn test_unknown_id_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        assert!(
            !ledger
                .update_status("pix_0_0", PaymentStatus::Paid, None)
                .unwrap()
        );
    }

    #[test]
    fn test_disk_round_trip_preserves_amount() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.json");

        let ledger = PaymentLedger::open(&path).unwrap();
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();
        let before = ledger.get(&id).unwrap();

        let reloaded = PaymentLedger::open(&path).unwrap();
        let after = reloaded.get(&id).unwrap();

        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.status, before.status);
        // Amounts must survive the float representation to 2 decimal places
        assert_eq!(after.amount.round_dp(2), dec!(10.00));
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_claim_for_processing_wins_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();
        ledger.attach_deploy_file(&id, "uploads/app.zip").unwrap();
        ledger.mark_ready_for_deploy(&id).unwrap();
        ledger.update_status(&id, PaymentStatus::Paid, None).unwrap();

        assert!(ledger.claim_for_processing(&id).unwrap());
        // Second claim loses: the record is already processing
        assert!(!ledger.claim_for_processing(&id).unwrap());

        let record = ledger.get(&id).unwrap();
        assert_eq!(record.status, PaymentStatus::Processing);
        assert!(record.deploy_processed);
    }

    #[test]
    fn test_ready_for_deploy_requires_all_conditions() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();

        assert!(ledger.ready_for_deploy().is_empty());

        ledger.update_status(&id, PaymentStatus::Paid, None).unwrap();
        assert!(ledger.ready_for_deploy().is_empty());

        ledger.attach_deploy_file(&id, "uploads/app.zip").unwrap();
        ledger.mark_ready_for_deploy(&id).unwrap();
        assert_eq!(ledger.ready_for_deploy().len(), 1);

        ledger.claim_for_processing(&id).unwrap();
        assert!(ledger.ready_for_deploy().is_empty());
    }

    #[test]
    fn test_blocked_after_bounded_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();
        ledger.update_status(&id, PaymentStatus::Paid, None).unwrap();

        for _ in 0..MAX_DEPLOY_ATTEMPTS - 1 {
            assert!(!ledger.note_precondition_failure(&id, "no api key").unwrap());
        }
        assert!(ledger.note_precondition_failure(&id, "no api key").unwrap());

        let record = ledger.get(&id).unwrap();
        assert_eq!(record.status, PaymentStatus::Blocked);
        assert_eq!(record.error.as_deref(), Some("no api key"));
    }

    #[test]
    fn test_release_block_returns_payment_to_scan_set() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let id = ledger
            .create(42, dec!(10.00), "Deploy", Duration::minutes(30))
            .unwrap();
        ledger.attach_deploy_file(&id, "uploads/app.zip").unwrap();
        ledger.mark_ready_for_deploy(&id).unwrap();
        ledger.update_status(&id, PaymentStatus::Paid, None).unwrap();
        for _ in 0..MAX_DEPLOY_ATTEMPTS {
            ledger.note_precondition_failure(&id, "no api key").unwrap();
        }

        // Blocked records stay out of the deploy path until released
        assert!(!ledger.claim_for_processing(&id).unwrap());
        assert!(ledger.ready_for_deploy().is_empty());

        assert!(ledger.release_block(&id).unwrap());
        let record = ledger.get(&id).unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.deploy_attempts, 0);
        assert!(record.error.is_none());
        assert_eq!(ledger.ready_for_deploy().len(), 1);

        // Only blocked records can be released
        assert!(!ledger.release_block(&id).unwrap());
    }

    #[test]
    fn test_expire_sweep_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);

        let stale = ledger
            .create(1, dec!(10.00), "old", Duration::minutes(-5))
            .unwrap();
        let fresh = ledger
            .create(2, dec!(10.00), "new", Duration::minutes(30))
            .unwrap();

        let now = Utc::now();
        let first = ledger.expire_sweep(now).unwrap();
        assert_eq!(first, vec![stale.clone()]);

        let second = ledger.expire_sweep(now).unwrap();
        assert!(second.is_empty());

        assert_eq!(ledger.get(&stale).unwrap().status, PaymentStatus::Expired);
        assert_eq!(ledger.get(&fresh).unwrap().status, PaymentStatus::Pending);
    }

    #[test]
    fn test_expire_sweep_removes_qr_image() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);
        let qr = dir.path().join("qr.svg");
        std::fs::write(&qr, "<svg/>").unwrap();

        let id = ledger
            .create(1, dec!(10.00), "old", Duration::minutes(-5))
            .unwrap();
        ledger.set_pix_details(&id, "code", Some(qr.clone())).unwrap();

        ledger.expire_sweep(Utc::now()).unwrap();
        assert!(!qr.exists());
    }

    #[test]
    fn test_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&dir);

        let a = ledger
            .create(1, dec!(10.00), "a", Duration::minutes(30))
            .unwrap();
        ledger
            .create(2, dec!(15.50), "b", Duration::minutes(30))
            .unwrap();
        let c = ledger
            .create(3, dec!(12.00), "c", Duration::minutes(30))
            .unwrap();
        ledger.update_status(&a, PaymentStatus::Paid, None).unwrap();
        ledger.update_status(&c, PaymentStatus::Failed, None).unwrap();

        let stats = ledger.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.paid, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.blocked, 0);
        assert_eq!(stats.total_paid_amount, dec!(10.00));
        assert!((stats.success_rate_percent * 3.0 - 100.0).abs() < 1e-9);
    }
}

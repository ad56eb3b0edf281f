//! Ticket Registry
//!
//! One deploy ticket per user, persisted to `data/tickets.json`. Uniqueness
//! is enforced with an insert-if-absent under the store's write lock rather
//! than a separate presence check. Ticket numbers come from a monotonic
//! counter persisted in its own file (`data/ticket_counter.json`) behind a
//! mutex, so concurrent creations never share a number.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::payment::PaymentStatus;
use crate::store::{JsonStore, write_json_atomic};

/// Ticket lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

/// An attachment uploaded into a ticket
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketFile {
    /// Stored filename (`<user>_<timestamp>_<original>`)
    pub filename: String,

    /// Filename as uploaded by the user
    pub original_filename: String,

    /// Location on disk
    pub path: PathBuf,

    /// Size of the stored file
    pub size_bytes: u64,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// A deploy ticket
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Owning user; at most one open ticket per user
    pub user_id: u64,

    /// Guild the ticket channel lives in
    pub guild_id: u64,

    /// Dedicated communication channel
    pub channel_id: u64,

    /// Creation timestamp; expiry is measured from here
    pub created_at: DateTime<Utc>,

    /// Lifecycle state
    pub status: TicketStatus,

    /// Number allocated from the persistent counter
    pub ticket_number: u64,

    /// Status of the payment scoped to this ticket
    #[serde(default = "default_payment_status")]
    pub payment_status: PaymentStatus,

    /// Files uploaded into the ticket
    #[serde(default)]
    pub files: Vec<TicketFile>,
}

fn default_payment_status() -> PaymentStatus {
    PaymentStatus::Pending
}

#[derive(Serialize, Deserialize)]
struct CounterFile {
    counter: u64,
}

/// Flat-file ticket registry with a persistent ticket counter
pub struct TicketRegistry {
    store: JsonStore<TicketRecord>,
    counter_path: PathBuf,
    counter: Mutex<u64>,
}

impl TicketRegistry {
    /// Open the registry (`data/tickets.json` + `data/ticket_counter.json`)
    pub fn open(
        tickets_path: impl Into<PathBuf>,
        counter_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let store = JsonStore::open(tickets_path)?;
        let counter_path = counter_path.into();

        let counter = if counter_path.exists() {
            let raw = fs::read_to_string(&counter_path)?;
            let file: CounterFile = serde_json::from_str(&raw)
                .map_err(|e| CoreError::Storage(format!("{}: {}", counter_path.display(), e)))?;
            file.counter
        } else {
            write_json_atomic(&counter_path, &CounterFile { counter: 1 })?;
            1
        };

        tracing::info!(tickets = store.len(), next_number = counter, "Ticket registry loaded");
        Ok(Self {
            store,
            counter_path,
            counter: Mutex::new(counter),
        })
    }

    /// Allocate the next ticket number.
    ///
    /// The counter is advanced and persisted under the mutex; a number is
    /// never handed out twice, even if the ticket it was meant for loses the
    /// creation race.
    pub fn next_ticket_number(&self) -> Result<u64> {
        let mut counter = self.counter.lock().unwrap();
        let number = *counter;
        *counter += 1;
        write_json_atomic(&self.counter_path, &CounterFile { counter: *counter })?;
        Ok(number)
    }

    /// Register a new open ticket for `user_id`, allocating its number.
    ///
    /// Returns `None` when the user already holds a ticket; the insert is
    /// atomic, so two concurrent creations cannot both win.
    pub fn create(
        &self,
        user_id: u64,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Option<TicketRecord>> {
        if self.store.contains(&user_id.to_string()) {
            return Ok(None);
        }
        let number = self.next_ticket_number()?;
        self.register(user_id, guild_id, channel_id, number)
    }

    /// Register a ticket with a pre-allocated number.
    ///
    /// Used when the channel has to be named after the number before the
    /// record can exist. Same uniqueness guarantee as [`Self::create`].
    pub fn register(
        &self,
        user_id: u64,
        guild_id: u64,
        channel_id: u64,
        ticket_number: u64,
    ) -> Result<Option<TicketRecord>> {
        let record = TicketRecord {
            user_id,
            guild_id,
            channel_id,
            created_at: Utc::now(),
            status: TicketStatus::Open,
            ticket_number,
            payment_status: PaymentStatus::Pending,
            files: Vec::new(),
        };

        if !self.store.insert_if_absent(user_id.to_string(), record.clone())? {
            // Lost the race after the number was allocated; the gap in the
            // sequence is harmless.
            return Ok(None);
        }

        tracing::info!(
            user_id,
            ticket_number = record.ticket_number,
            channel_id,
            "Ticket created"
        );
        Ok(Some(record))
    }

    /// Get the ticket held by `user_id`, if any
    pub fn get(&self, user_id: u64) -> Option<TicketRecord> {
        self.store.get(&user_id.to_string())
    }

    /// Whether `user_id` currently holds a ticket
    pub fn has_ticket(&self, user_id: u64) -> bool {
        self.store.contains(&user_id.to_string())
    }

    /// Whether `user_id` owns the ticket bound to `channel_id`
    pub fn owns_channel(&self, user_id: u64, channel_id: u64) -> bool {
        self.get(user_id)
            .is_some_and(|t| t.channel_id == channel_id)
    }

    /// Delete the ticket record for `user_id`.
    ///
    /// Idempotent: returns `false` when no record exists.
    pub fn remove(&self, user_id: u64) -> Result<bool> {
        let removed = self.store.remove(&user_id.to_string())?;
        Ok(removed.is_some())
    }

    /// Append an uploaded file to the user's ticket
    pub fn add_file(&self, user_id: u64, file: TicketFile) -> Result<bool> {
        self.store
            .update(&user_id.to_string(), |t| t.files.push(file))
    }

    /// Update the payment status tracked on the ticket
    pub fn set_payment_status(&self, user_id: u64, status: PaymentStatus) -> Result<bool> {
        self.store
            .update(&user_id.to_string(), |t| t.payment_status = status)
    }

    /// Snapshot of all tickets
    pub fn active(&self) -> Vec<TicketRecord> {
        self.store.values()
    }

    /// Number of registered tickets
    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Users whose open tickets are older than `timeout` at `now`
    pub fn expired(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<u64> {
        self.store
            .filter(|t| t.status == TicketStatus::Open && now - t.created_at > timeout)
            .into_iter()
            .map(|t| t.user_id)
            .collect()
    }

    /// Exact on-disk JSON snapshot
    pub fn export_json(&self) -> Result<String> {
        self.store.export_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn open_registry(dir: &tempfile::TempDir) -> TicketRegistry {
        TicketRegistry::open(
            dir.path().join("tickets.json"),
            dir.path().join("ticket_counter.json"),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        let ticket = registry.create(42, 1, 100).unwrap().unwrap();
        assert_eq!(ticket.ticket_number, 1);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(registry.has_ticket(42));
        assert!(registry.owns_channel(42, 100));
        assert!(!registry.owns_channel(42, 999));
    }

    #[test]
    fn test_one_open_ticket_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        assert!(registry.create(42, 1, 100).unwrap().is_some());
        assert!(registry.create(42, 1, 101).unwrap().is_none());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_uniqueness_under_concurrent_creation() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(open_registry(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.create(42, 1, 100 + i).unwrap().is_some()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        // Exactly one creation may win
        assert_eq!(wins, 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_ticket_numbers_are_monotonic_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = open_registry(&dir);
            assert_eq!(registry.create(1, 1, 10).unwrap().unwrap().ticket_number, 1);
            assert_eq!(registry.create(2, 1, 11).unwrap().unwrap().ticket_number, 2);
        }

        // Counter survives a restart
        let registry = open_registry(&dir);
        assert_eq!(registry.create(3, 1, 12).unwrap().unwrap().ticket_number, 3);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);

        registry.create(42, 1, 100).unwrap();
        assert!(registry.remove(42).unwrap());
        assert!(!registry.remove(42).unwrap());
        assert!(!registry.has_ticket(42));
    }

    #[test]
    fn test_expiry_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);
        registry.create(42, 1, 100).unwrap();

        let created = registry.get(42).unwrap().created_at;
        let timeout = Duration::minutes(30);

        // 29 minutes in: still open
        assert!(
            registry
                .expired(created + Duration::minutes(29), timeout)
                .is_empty()
        );
        // 31 minutes in: expired
        assert_eq!(
            registry.expired(created + Duration::minutes(31), timeout),
            vec![42]
        );
    }

    #[test]
    fn test_add_file_to_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let registry = open_registry(&dir);
        registry.create(42, 1, 100).unwrap();

        let file = TicketFile {
            filename: "42_20250101_000000_app.zip".into(),
            original_filename: "app.zip".into(),
            path: PathBuf::from("uploads/42_20250101_000000_app.zip"),
            size_bytes: 1024,
            uploaded_at: Utc::now(),
        };
        assert!(registry.add_file(42, file).unwrap());
        assert_eq!(registry.get(42).unwrap().files.len(), 1);

        // No ticket, no file
        let orphan = TicketFile {
            filename: "x".into(),
            original_filename: "x".into(),
            path: PathBuf::from("x"),
            size_bytes: 0,
            uploaded_at: Utc::now(),
        };
        assert!(!registry.add_file(99, orphan).unwrap());
    }
}

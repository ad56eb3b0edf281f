//! Chat Gateway
//!
//! Seam between the daemon and whatever chat front-end carries the ticket
//! conversation. The loops only ever need five operations: create a ticket
//! channel, delete it, post a message, edit a posted message, and fall back
//! to a direct message. Everything else about the chat platform stays on
//! the other side of this trait.
//!
//! [`ConsoleChat`] is the headless implementation used when the daemon runs
//! without a front-end attached; [`RecordingChat`] backs the tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The message or channel operation could not be delivered
    #[error("chat delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// A message posted into a channel or DM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Short headline
    pub title: String,

    /// Main text
    pub body: String,

    /// Labelled detail lines rendered under the body
    pub fields: Vec<(String, String)>,
}

impl OutboundMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            fields: Vec::new(),
        }
    }

    /// Append a labelled detail line
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Handle to a posted message, used for later edits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Chat platform operations the daemon depends on
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Create a private ticket channel for `user_id`, returning its id
    async fn create_ticket_channel(&self, guild_id: u64, name: &str, user_id: u64) -> Result<u64>;

    /// Delete a ticket channel
    async fn delete_channel(&self, channel_id: u64, reason: &str) -> Result<()>;

    /// Post a message into a channel
    async fn send(&self, channel_id: u64, message: &OutboundMessage) -> Result<MessageRef>;

    /// Replace the content of a previously posted message
    async fn edit(&self, message: MessageRef, content: &OutboundMessage) -> Result<()>;

    /// Direct-message a user, used when their ticket channel is gone
    async fn send_dm(&self, user_id: u64, message: &OutboundMessage) -> Result<()>;
}

/// Headless gateway that logs every operation and hands out synthetic ids.
///
/// Lets the daemon run end to end with no front-end attached.
pub struct ConsoleChat {
    next_id: AtomicU64,
}

impl Default for ConsoleChat {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatGateway for ConsoleChat {
    async fn create_ticket_channel(&self, guild_id: u64, name: &str, user_id: u64) -> Result<u64> {
        let channel_id = self.allocate_id();
        tracing::info!(guild_id, user_id, name, channel_id, "Channel created");
        Ok(channel_id)
    }

    async fn delete_channel(&self, channel_id: u64, reason: &str) -> Result<()> {
        tracing::info!(channel_id, reason, "Channel deleted");
        Ok(())
    }

    async fn send(&self, channel_id: u64, message: &OutboundMessage) -> Result<MessageRef> {
        tracing::info!(channel_id, title = %message.title, body = %message.body, "Message posted");
        Ok(MessageRef {
            channel_id,
            message_id: self.allocate_id(),
        })
    }

    async fn edit(&self, message: MessageRef, content: &OutboundMessage) -> Result<()> {
        tracing::info!(
            channel_id = message.channel_id,
            message_id = message.message_id,
            title = %content.title,
            "Message edited"
        );
        Ok(())
    }

    async fn send_dm(&self, user_id: u64, message: &OutboundMessage) -> Result<()> {
        tracing::info!(user_id, title = %message.title, "Direct message sent");
        Ok(())
    }
}

/// Gateway that records every operation for assertions.
pub struct RecordingChat {
    fail_channel_sends: bool,
    next_id: AtomicU64,

    pub channels_created: Mutex<Vec<(u64, String)>>,
    pub channels_deleted: Mutex<Vec<u64>>,
    pub sent: Mutex<Vec<(u64, OutboundMessage)>>,
    pub edits: Mutex<Vec<(MessageRef, OutboundMessage)>>,
    pub dms: Mutex<Vec<(u64, OutboundMessage)>>,
}

impl Default for RecordingChat {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChat {
    pub fn new() -> Self {
        Self {
            fail_channel_sends: false,
            next_id: AtomicU64::new(1),
            channels_created: Mutex::new(Vec::new()),
            channels_deleted: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            dms: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose channel sends fail, forcing the DM fallback
    pub fn without_channels() -> Self {
        Self {
            fail_channel_sends: true,
            ..Self::new()
        }
    }

    /// Messages posted into `channel_id` so far
    pub fn sent_to(&self, channel_id: u64) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatGateway for RecordingChat {
    async fn create_ticket_channel(&self, _guild_id: u64, name: &str, _user_id: u64) -> Result<u64> {
        let channel_id = self.allocate_id();
        self.channels_created
            .lock()
            .unwrap()
            .push((channel_id, name.to_string()));
        Ok(channel_id)
    }

    async fn delete_channel(&self, channel_id: u64, _reason: &str) -> Result<()> {
        self.channels_deleted.lock().unwrap().push(channel_id);
        Ok(())
    }

    async fn send(&self, channel_id: u64, message: &OutboundMessage) -> Result<MessageRef> {
        if self.fail_channel_sends {
            return Err(ChatError::Delivery("channel unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id, message.clone()));
        Ok(MessageRef {
            channel_id,
            message_id: self.allocate_id(),
        })
    }

    async fn edit(&self, message: MessageRef, content: &OutboundMessage) -> Result<()> {
        self.edits.lock().unwrap().push((message, content.clone()));
        Ok(())
    }

    async fn send_dm(&self, user_id: u64, message: &OutboundMessage) -> Result<()> {
        self.dms.lock().unwrap().push((user_id, message.clone()));
        Ok(())
    }
}

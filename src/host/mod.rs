//! Host framework contracts.
//!
//! The extension never talks to a chat gateway directly. Everything it needs
//! from the running bot (sending and editing messages, reactions, the owner
//! check and runtime diagnostics) goes through [`ChatHost`].

mod memory;
mod metrics;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

pub use memory::{MemoryHost, StoredMessage};
pub use metrics::{MetricsProvider, ProcStatusMetrics, ProcessStats};

use crate::config::DEFAULT_FILESIZE_LIMIT;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Identity of a user (or the bot itself).
    UserId
);
snowflake!(
    /// Identity of a posted message.
    MessageId
);
snowflake!(
    /// Identity of a channel messages are sent to.
    ChannelId
);

/// Errors reported by the host transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Message not found")]
    NotFound,

    #[error("Missing permissions")]
    Forbidden,

    #[error("Host connection is closed")]
    Closed,

    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    /// Whether the target no longer needs managing (deleted or inaccessible).
    #[must_use]
    pub const fn is_gone(&self) -> bool {
        matches!(self, Self::NotFound | Self::Forbidden)
    }
}

/// A structured embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
}

/// A file sent alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

/// What a send or edit call carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl MessagePayload {
    /// Plain text message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Embed-only message.
    #[must_use]
    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    /// File-only message.
    #[must_use]
    pub fn file(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            attachment: Some(Attachment {
                filename: filename.into(),
                data,
            }),
            ..Self::default()
        }
    }

    /// Adds text content to the payload.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Whether a reaction was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Add,
    Remove,
}

/// A raw reaction event from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub kind: ReactionKind,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: String,
}

/// How the host client distributes its gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShardingMode {
    #[default]
    NotSharded,
    ManuallySharded,
    AutoSharded,
}

/// Runtime facts the host reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostDiagnostics {
    /// Display name of the bot account.
    pub bot_user: String,
    /// Host framework name and version, if known.
    pub framework: Option<String>,
    pub guild_count: usize,
    pub user_count: usize,
    pub sharding: ShardingMode,
    /// Average gateway latency.
    pub latency: Duration,
}

/// The running bot, as seen by the extension.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// The bot's own identity.
    fn bot_user(&self) -> UserId;

    /// Whether the host is shutting down.
    fn is_closed(&self) -> bool;

    /// Permission hook run before every command.
    async fn is_owner(&self, user: UserId) -> bool;

    async fn send(
        &self,
        channel: ChannelId,
        payload: MessagePayload,
    ) -> Result<MessageId, TransportError>;

    async fn edit(&self, message: MessageId, payload: MessagePayload)
    -> Result<(), TransportError>;

    async fn delete(&self, message: MessageId) -> Result<(), TransportError>;

    async fn add_reaction(&self, message: MessageId, emoji: &str) -> Result<(), TransportError>;

    async fn remove_reaction(
        &self,
        message: MessageId,
        emoji: &str,
        user: UserId,
    ) -> Result<(), TransportError>;

    /// Subscribes to raw reaction add/remove events for all messages.
    fn subscribe_reactions(&self) -> broadcast::Receiver<ReactionEvent>;

    fn diagnostics(&self) -> HostDiagnostics;

    /// Largest attachment accepted in `channel`.
    fn filesize_limit(&self, _channel: ChannelId) -> u64 {
        DEFAULT_FILESIZE_LIMIT
    }
}

/// Waits for the next reaction event of `kind` satisfying `check`.
///
/// Returns `None` once the event stream is closed. Lagged receivers skip the
/// events they missed and keep waiting.
pub async fn wait_for_reaction<F>(
    rx: &mut broadcast::Receiver<ReactionEvent>,
    kind: ReactionKind,
    check: F,
) -> Option<ReactionEvent>
where
    F: Fn(&ReactionEvent) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(event) if event.kind == kind && check(&event) => return Some(event),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Reaction stream lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

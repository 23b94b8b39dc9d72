//! In-process host.
//!
//! Keeps every message in memory and delivers reactions through a broadcast
//! channel. Used by the console harness and as the host in tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::DEFAULT_FILESIZE_LIMIT;

use super::{
    ChannelId, ChatHost, HostDiagnostics, MessageId, MessagePayload, ReactionEvent, ReactionKind,
    TransportError, UserId,
};

/// A message as stored by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    pub author: UserId,
    pub payload: MessagePayload,
    /// Reactions in insertion order as `(emoji, user)`.
    pub reactions: Vec<(String, UserId)>,
    /// Number of successful edits.
    pub edits: usize,
}

impl StoredMessage {
    /// Current text content, or an empty string.
    #[must_use]
    pub fn content(&self) -> &str {
        self.payload.content.as_deref().unwrap_or_default()
    }

    /// Emojis reacted by `user`, in order.
    #[must_use]
    pub fn reactions_by(&self, user: UserId) -> Vec<&str> {
        self.reactions
            .iter()
            .filter(|(_, u)| *u == user)
            .map(|(e, _)| e.as_str())
            .collect()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    messages: BTreeMap<MessageId, StoredMessage>,
}

/// Host that lives entirely in memory.
pub struct MemoryHost {
    bot_user: UserId,
    owner: Option<UserId>,
    state: Mutex<MemoryState>,
    reactions: broadcast::Sender<ReactionEvent>,
    closed: AtomicBool,
    diagnostics: HostDiagnostics,
    filesize_limit: u64,
    echo: bool,
}

impl MemoryHost {
    /// Creates a host for the given bot identity and owner.
    #[must_use]
    pub fn new(bot_user: UserId, owner: Option<UserId>) -> Self {
        let (reactions, _) = broadcast::channel(256);
        Self {
            bot_user,
            owner,
            state: Mutex::new(MemoryState {
                next_id: 1000,
                messages: BTreeMap::new(),
            }),
            reactions,
            closed: AtomicBool::new(false),
            diagnostics: HostDiagnostics {
                bot_user: format!("CodeToast#{bot_user}"),
                framework: Some(format!("memory-host {}", env!("CARGO_PKG_VERSION"))),
                ..HostDiagnostics::default()
            },
            filesize_limit: DEFAULT_FILESIZE_LIMIT,
            echo: false,
        }
    }

    /// Prints every sent or edited message to stdout.
    #[must_use]
    pub const fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Replaces the diagnostics reported to the extension.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: HostDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Caps the attachment size accepted in every channel.
    #[must_use]
    pub const fn with_filesize_limit(mut self, limit: u64) -> Self {
        self.filesize_limit = limit;
        self
    }

    /// Marks the host as shutting down.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Snapshot of a message, if it still exists.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<StoredMessage> {
        self.lock().messages.get(&id).cloned()
    }

    /// All live messages in `channel`, oldest first.
    #[must_use]
    pub fn messages_in(&self, channel: ChannelId) -> Vec<StoredMessage> {
        self.lock()
            .messages
            .values()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }

    /// The most recently posted live message.
    #[must_use]
    pub fn last_message(&self) -> Option<StoredMessage> {
        self.lock().messages.values().next_back().cloned()
    }

    /// Adds a reaction as `user` and publishes the event.
    pub fn react(&self, message: MessageId, emoji: &str, user: UserId) {
        {
            let mut state = self.lock();
            if let Some(stored) = state.messages.get_mut(&message) {
                stored.reactions.push((emoji.to_owned(), user));
            }
        }
        self.publish(ReactionKind::Add, message, emoji, user);
    }

    /// Removes a reaction as `user` and publishes the event.
    pub fn unreact(&self, message: MessageId, emoji: &str, user: UserId) {
        {
            let mut state = self.lock();
            if let Some(stored) = state.messages.get_mut(&message) {
                stored.reactions.retain(|(e, u)| !(e == emoji && *u == user));
            }
        }
        self.publish(ReactionKind::Remove, message, emoji, user);
    }

    fn publish(&self, kind: ReactionKind, message_id: MessageId, emoji: &str, user_id: UserId) {
        // No subscribers just means nobody is paginating right now.
        let _ = self.reactions.send(ReactionEvent {
            kind,
            message_id,
            user_id,
            emoji: emoji.to_owned(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn print(&self, verb: &str, id: MessageId, payload: &MessagePayload) {
        if !self.echo {
            return;
        }
        println!("── {verb} message {id} ──");
        if let Some(content) = &payload.content {
            println!("{content}");
        }
        if let Some(embed) = &payload.embed {
            println!("{}", serde_json::to_string_pretty(embed).unwrap_or_default());
        }
        if let Some(file) = &payload.attachment {
            println!("[attachment {} ({} bytes)]", file.filename, file.data.len());
        }
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost")
            .field("bot_user", &self.bot_user)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatHost for MemoryHost {
    fn bot_user(&self) -> UserId {
        self.bot_user
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn is_owner(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }

    async fn send(
        &self,
        channel: ChannelId,
        payload: MessagePayload,
    ) -> Result<MessageId, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = MessageId(state.next_id);
            state.messages.insert(
                id,
                StoredMessage {
                    id,
                    channel,
                    author: self.bot_user,
                    payload: payload.clone(),
                    reactions: Vec::new(),
                    edits: 0,
                },
            );
            id
        };
        debug!("Sent message {} to channel {}", id, channel);
        self.print("sent", id, &payload);
        Ok(id)
    }

    async fn edit(
        &self,
        message: MessageId,
        payload: MessagePayload,
    ) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            let stored = state
                .messages
                .get_mut(&message)
                .ok_or(TransportError::NotFound)?;
            stored.payload = payload.clone();
            stored.edits += 1;
        }
        self.print("edited", message, &payload);
        Ok(())
    }

    async fn delete(&self, message: MessageId) -> Result<(), TransportError> {
        self.lock()
            .messages
            .remove(&message)
            .map(|_| debug!("Deleted message {}", message))
            .ok_or(TransportError::NotFound)
    }

    async fn add_reaction(&self, message: MessageId, emoji: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let stored = state
            .messages
            .get_mut(&message)
            .ok_or(TransportError::NotFound)?;
        if !stored
            .reactions
            .iter()
            .any(|(e, u)| e == emoji && *u == self.bot_user)
        {
            stored.reactions.push((emoji.to_owned(), self.bot_user));
        }
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: MessageId,
        emoji: &str,
        user: UserId,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let stored = state
            .messages
            .get_mut(&message)
            .ok_or(TransportError::NotFound)?;
        stored.reactions.retain(|(e, u)| !(e == emoji && *u == user));
        Ok(())
    }

    fn subscribe_reactions(&self) -> broadcast::Receiver<ReactionEvent> {
        self.reactions.subscribe()
    }

    fn diagnostics(&self) -> HostDiagnostics {
        self.diagnostics.clone()
    }

    fn filesize_limit(&self, _channel: ChannelId) -> u64 {
        self.filesize_limit
    }
}

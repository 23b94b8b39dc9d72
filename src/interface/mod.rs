//! Reaction-driven paginator sessions.
//!
//! A [`PaginatorInterface`] owns one posted message. Once sent, a background
//! task turns reactions on that message into page navigation and re-renders
//! the message when pages change, until the session is closed.

mod emoji;
mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use emoji::{EmojiSettings, Navigation};

use crate::host::{ChannelId, ChatHost, Embed, MessageId, MessagePayload, TransportError, UserId};
use crate::paginator::{PageSource, PaginatorError, char_len};

/// Largest text message the host accepts.
pub const MAX_TEXT_PAGE_SIZE: usize = 2000;

/// Largest embed description the host accepts.
pub const MAX_EMBED_PAGE_SIZE: usize = 2048;

/// Delay that coalesces bursts of `add_line` calls into one edit.
pub const UPDATE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Errors raised by [`PaginatorInterface`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error(
        "Paginator passed has too large of a page size for this interface. ({page_size} > {max})"
    )]
    PageSizeTooLarge { page_size: usize, max: usize },

    #[error("Interface is already bound to a message")]
    AlreadyBound,

    #[error("Interface cannot show more than {limit} pages")]
    PageLimit { limit: usize },

    #[error(transparent)]
    Paginator(#[from] PaginatorError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Where a session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unsent,
    Sent,
    Active,
    Closed,
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The close reaction was used.
    UserClosed,
    /// Nothing happened within the timeout.
    Timeout,
    /// [`PaginatorInterface::close`] was called.
    Cancelled,
    /// The host is shutting down.
    HostClosed,
    /// The message was deleted by someone else.
    MessageGone,
    /// An edit failed for another reason.
    Transport(TransportError),
}

/// How pages are presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceStyle {
    /// Page text with a trailing `Page X/Y` line.
    Text,
    /// Page text as the embed description, indicator in the footer.
    Embed(Embed),
}

/// Session behaviour.
#[derive(Debug, Clone)]
pub struct InterfaceOptions {
    /// Only this user may navigate; anyone may if `None`.
    pub owner: Option<UserId>,
    pub emojis: EmojiSettings,
    pub timeout: Duration,
    /// Delete the message on timeout instead of stripping reactions.
    pub delete_on_close: bool,
}

impl Default for InterfaceOptions {
    fn default() -> Self {
        Self {
            owner: None,
            emojis: EmojiSettings::default(),
            timeout: Duration::from_secs(7200),
            delete_on_close: false,
        }
    }
}

impl InterfaceOptions {
    /// Default options restricted to `owner`.
    #[must_use]
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }
}

struct Session {
    paginator: Box<dyn PageSource>,
    display_page: usize,
    message: Option<MessageId>,
    state: SessionState,
    sent_page_reactions: bool,
    close_reason: Option<CloseReason>,
}

impl Session {
    fn page_count(&self) -> usize {
        self.paginator.page_count()
    }

    /// Clamps the stored index into range and returns it.
    fn clamp_display(&mut self) -> usize {
        let last = self.page_count().saturating_sub(1);
        self.display_page = self.display_page.min(last);
        self.display_page
    }

    fn navigate(&mut self, navigation: Navigation) {
        match navigation {
            Navigation::Start => self.display_page = 0,
            Navigation::End => self.display_page = self.page_count().saturating_sub(1),
            Navigation::Back => self.display_page = self.display_page.saturating_sub(1),
            Navigation::Forward => self.display_page += 1,
            Navigation::Close => {}
        }
    }

    /// Claims the one-time reaction bootstrap if it is due.
    fn claim_page_reactions(&mut self) -> bool {
        if self.sent_page_reactions || self.page_count() <= 1 {
            return false;
        }
        self.sent_page_reactions = true;
        true
    }
}

/// State shared between the interface handle and its background task.
pub(crate) struct Shared {
    host: Arc<dyn ChatHost>,
    style: InterfaceStyle,
    options: InterfaceOptions,
    /// Most pages whose indicator still fits beside a full page.
    page_limit: usize,
    session: Mutex<Session>,
    update: Notify,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self) -> MessagePayload {
        let mut session = self.session();
        let display = session.clamp_display();
        let count = session.page_count().max(1);
        let page = session.paginator.page(display).unwrap_or_default();

        match &self.style {
            InterfaceStyle::Text => {
                MessagePayload::text(format!("{page}\nPage {}/{count}", display + 1))
            }
            InterfaceStyle::Embed(template) => MessagePayload::embed(Embed {
                description: Some(page),
                footer: Some(format!("Page {}/{count}", display + 1)),
                ..template.clone()
            }),
        }
    }

    /// Posts every navigation reaction, stopping if the message vanished.
    async fn send_all_reactions(&self, message: MessageId) {
        for emoji in self.options.emojis.all().into_iter().filter(|e| !e.is_empty()) {
            match self.host.add_reaction(message, emoji).await {
                Ok(()) => {}
                Err(TransportError::NotFound) => break,
                Err(e) => debug!("Could not add reaction {} to {}: {}", emoji, message, e),
            }
        }
        self.session().sent_page_reactions = true;
    }
}

/// An interactive, reaction-navigated view over a paginator.
pub struct PaginatorInterface {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PaginatorInterface {
    /// Creates a text interface.
    pub fn new(
        host: Arc<dyn ChatHost>,
        paginator: impl PageSource + 'static,
        options: InterfaceOptions,
    ) -> Result<Self, InterfaceError> {
        Self::with_style(host, Box::new(paginator), options, InterfaceStyle::Text)
    }

    /// Creates an embed interface using `embed` as the template.
    pub fn embed(
        host: Arc<dyn ChatHost>,
        paginator: impl PageSource + 'static,
        options: InterfaceOptions,
        embed: Embed,
    ) -> Result<Self, InterfaceError> {
        Self::with_style(host, Box::new(paginator), options, InterfaceStyle::Embed(embed))
    }

    fn with_style(
        host: Arc<dyn ChatHost>,
        paginator: Box<dyn PageSource>,
        options: InterfaceOptions,
        style: InterfaceStyle,
    ) -> Result<Self, InterfaceError> {
        let page_size = page_size(&style, paginator.as_ref());
        let max = max_page_size(&style);
        if page_size > max {
            return Err(InterfaceError::PageSizeTooLarge { page_size, max });
        }
        let page_limit = page_limit(&style, paginator.max_size());

        Ok(Self {
            shared: Arc::new(Shared {
                host,
                style,
                options,
                page_limit,
                session: Mutex::new(Session {
                    paginator,
                    display_page: 0,
                    message: None,
                    state: SessionState::Unsent,
                    sent_page_reactions: false,
                    close_reason: None,
                }),
                update: Notify::new(),
            }),
            task: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    pub fn pages(&self) -> Vec<String> {
        self.shared.session().paginator.pages()
    }

    pub fn page_count(&self) -> usize {
        self.shared.session().page_count()
    }

    /// Index of the shown page, clamped into range.
    pub fn display_page(&self) -> usize {
        self.shared.session().clamp_display()
    }

    pub fn set_display_page(&self, page: usize) {
        let mut session = self.shared.session();
        session.display_page = page;
        session.clamp_display();
    }

    /// The payload the message currently shows (or would show).
    pub fn render(&self) -> MessagePayload {
        self.shared.render()
    }

    pub fn message(&self) -> Option<MessageId> {
        self.shared.session().message
    }

    pub fn state(&self) -> SessionState {
        self.shared.session().state
    }

    pub fn closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Why the session closed, once it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.session().close_reason.clone()
    }

    /// Appends a line and schedules a re-render.
    ///
    /// A viewer on the last page follows the content onto new pages. A line
    /// that fails, or that would need more pages than the indicator has room
    /// for, leaves the pages unchanged.
    pub fn add_line(&self, line: &str, empty: bool) -> Result<(), InterfaceError> {
        {
            let mut session = self.shared.session();
            let display = session.clamp_display();
            let page_count = session.page_count();

            let checkpoint = session.paginator.checkpoint();
            let added = session.paginator.add_line(line, empty);
            let limit = self.shared.page_limit;
            if let Err(e) = added {
                session.paginator.rollback(checkpoint);
                return Err(e.into());
            }
            if session.page_count() > limit {
                session.paginator.rollback(checkpoint);
                return Err(InterfaceError::PageLimit { limit });
            }

            if display + 1 == page_count {
                session.display_page = session.page_count();
            }
        }
        self.shared.update.notify_one();
        Ok(())
    }

    /// Posts the first page to `channel` and starts listening for reactions.
    pub async fn send_to(&self, channel: ChannelId) -> Result<MessageId, InterfaceError> {
        {
            let mut session = self.shared.session();
            if session.state != SessionState::Unsent {
                return Err(InterfaceError::AlreadyBound);
            }
            session.state = SessionState::Sent;
        }

        let payload = self.shared.render();
        let message = match self.shared.host.send(channel, payload.clone()).await {
            Ok(message) => message,
            Err(e) => {
                self.shared.session().state = SessionState::Unsent;
                return Err(e.into());
            }
        };
        self.shared.session().message = Some(message);

        let close = self.shared.options.emojis.close.as_str();
        if !close.is_empty() {
            self.shared.host.add_reaction(message, close).await?;
        }

        self.shared.update.notify_one();
        self.start_loop(message, payload);

        let bootstrap = self.shared.session().claim_page_reactions();
        if bootstrap {
            self.shared.send_all_reactions(message).await;
        }

        Ok(message)
    }

    /// Replaces any running loop with a fresh one.
    fn start_loop(&self, message: MessageId, last_payload: MessagePayload) {
        let subscriptions = session::Subscriptions::new(self.shared.host.as_ref());
        let handle = tokio::spawn(session::run(
            Arc::clone(&self.shared),
            message,
            last_payload,
            subscriptions,
            self.cancel.clone(),
        ));

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Closes the session from outside, cleaning up like a timeout.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Waits for the background loop to finish.
    pub async fn wait_closed(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            debug!("Paginator loop ended abnormally: {}", e);
        }
    }
}

impl std::fmt::Debug for PaginatorInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.shared.session();
        f.debug_struct("PaginatorInterface")
            .field("style", &self.shared.style)
            .field("state", &session.state)
            .field("message", &session.message)
            .field("display_page", &session.display_page)
            .finish_non_exhaustive()
    }
}

fn max_page_size(style: &InterfaceStyle) -> usize {
    match style {
        InterfaceStyle::Text => MAX_TEXT_PAGE_SIZE,
        InterfaceStyle::Embed(_) => MAX_EMBED_PAGE_SIZE,
    }
}

/// Rendered size of a full page from `paginator` at its current page count.
fn page_size(style: &InterfaceStyle, paginator: &dyn PageSource) -> usize {
    match style {
        InterfaceStyle::Text => paginator.max_size() + indicator_len(paginator.page_count()),
        InterfaceStyle::Embed(_) => paginator.max_size(),
    }
}

/// Length of the `\nPage N/N` line for `count` pages.
pub fn indicator_len(count: usize) -> usize {
    let count = count.max(1);
    char_len(&format!("\nPage {count}/{count}"))
}

/// Largest page count whose indicator fits beside a full page of `max_size`.
fn page_limit(style: &InterfaceStyle, max_size: usize) -> usize {
    match style {
        InterfaceStyle::Text => {
            let room = MAX_TEXT_PAGE_SIZE.saturating_sub(max_size);
            let mut limit: usize = 0;
            while let Some(next) = limit.checked_mul(10).and_then(|n| n.checked_add(9))
                && indicator_len(next) <= room
            {
                limit = next;
            }
            limit
        }
        InterfaceStyle::Embed(_) => usize::MAX,
    }
}

#[cfg(test)]
mod tests;

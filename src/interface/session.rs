//! The background loop behind a sent [`PaginatorInterface`](super::PaginatorInterface).

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CloseReason, EmojiSettings, Navigation, SessionState, Shared, UPDATE_DEBOUNCE};
use crate::host::{
    ChatHost, MessageId, MessagePayload, ReactionEvent, ReactionKind, TransportError, UserId,
    wait_for_reaction,
};

type Subscription = broadcast::Receiver<ReactionEvent>;

/// A pending wait that hands its receiver back when it resolves.
type ReactionWait = BoxFuture<'static, (Option<ReactionEvent>, Subscription)>;

/// Reaction receivers, subscribed before the loop is spawned so no early
/// event is missed.
pub(super) struct Subscriptions {
    add: Subscription,
    remove: Subscription,
}

impl Subscriptions {
    pub(super) fn new(host: &dyn ChatHost) -> Self {
        Self {
            add: host.subscribe_reactions(),
            remove: host.subscribe_reactions(),
        }
    }
}

/// Decides which reaction events concern a session.
#[derive(Debug, Clone)]
struct ReactionFilter {
    message: MessageId,
    owner: Option<UserId>,
    bot: UserId,
    emojis: EmojiSettings,
}

impl ReactionFilter {
    fn accepts(&self, event: &ReactionEvent) -> bool {
        self.owner.is_none_or(|owner| event.user_id == owner)
            && event.message_id == self.message
            && event.user_id != self.bot
            && self.emojis.action(&event.emoji).is_some()
    }
}

fn next_reaction(mut rx: Subscription, kind: ReactionKind, filter: ReactionFilter) -> ReactionWait {
    Box::pin(async move {
        let event = wait_for_reaction(&mut rx, kind, |e| filter.accepts(e)).await;
        (event, rx)
    })
}

fn debounced_update(shared: Arc<Shared>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        shared.update.notified().await;
        tokio::time::sleep(UPDATE_DEBOUNCE).await;
    })
}

enum Wake {
    Reaction(ReactionEvent),
    Update,
}

/// Runs a session until it closes, then records why.
pub(super) async fn run(
    shared: Arc<Shared>,
    message: MessageId,
    last_payload: MessagePayload,
    subscriptions: Subscriptions,
    cancel: CancellationToken,
) {
    shared.session().state = SessionState::Active;
    debug!("Paginator session started on message {}", message);

    let reason = wait_loop(&shared, message, last_payload, subscriptions, &cancel).await;

    if matches!(reason, CloseReason::Timeout | CloseReason::Cancelled) {
        clean_up(&shared, message).await;
    }

    info!("Paginator session on message {} closed: {:?}", message, reason);
    let mut session = shared.session();
    session.close_reason = Some(reason);
    session.state = SessionState::Closed;
}

async fn wait_loop(
    shared: &Arc<Shared>,
    message: MessageId,
    last_payload: MessagePayload,
    subscriptions: Subscriptions,
    cancel: &CancellationToken,
) -> CloseReason {
    let host = &shared.host;
    let filter = ReactionFilter {
        message,
        owner: shared.options.owner,
        bot: host.bot_user(),
        emojis: shared.options.emojis.clone(),
    };

    let mut add_wait = next_reaction(subscriptions.add, ReactionKind::Add, filter.clone());
    let mut remove_wait = next_reaction(subscriptions.remove, ReactionKind::Remove, filter.clone());
    let mut update_wait = debounced_update(Arc::clone(shared));
    let mut last_payload = last_payload;

    // Pending waits are dropped, and so cancelled, on every return below.
    loop {
        if host.is_closed() {
            return CloseReason::HostClosed;
        }

        let wake = tokio::select! {
            (event, rx) = &mut add_wait => {
                add_wait = next_reaction(rx, ReactionKind::Add, filter.clone());
                event.map(Wake::Reaction)
            }
            (event, rx) = &mut remove_wait => {
                remove_wait = next_reaction(rx, ReactionKind::Remove, filter.clone());
                event.map(Wake::Reaction)
            }
            () = &mut update_wait => {
                update_wait = debounced_update(Arc::clone(shared));
                Some(Wake::Update)
            }
            () = tokio::time::sleep(shared.options.timeout) => return CloseReason::Timeout,
            () = cancel.cancelled() => return CloseReason::Cancelled,
        };

        // A closed reaction stream means the host went away.
        let Some(wake) = wake else {
            return CloseReason::HostClosed;
        };
        if host.is_closed() {
            return CloseReason::HostClosed;
        }

        if let Wake::Reaction(event) = wake {
            let Some(navigation) = shared.options.emojis.action(&event.emoji) else {
                continue;
            };
            if navigation == Navigation::Close {
                match host.delete(message).await {
                    Ok(()) => {}
                    Err(e) if e.is_gone() => debug!("Message {} already gone: {}", message, e),
                    Err(e) => warn!("Failed to delete message {}: {}", message, e),
                }
                return CloseReason::UserClosed;
            }
            shared.session().navigate(navigation);
        }

        let bootstrap = shared.session().claim_page_reactions();
        if bootstrap {
            let shared = Arc::clone(shared);
            tokio::spawn(async move { shared.send_all_reactions(message).await });
        }

        let payload = shared.render();
        if payload != last_payload {
            match host.edit(message, payload.clone()).await {
                Ok(()) => last_payload = payload,
                Err(TransportError::NotFound) => return CloseReason::MessageGone,
                Err(e) => {
                    warn!("Failed to edit paginator message {}: {}", message, e);
                    return CloseReason::Transport(e);
                }
            }
        }
    }
}

/// Tidies the message after a timeout or cancellation.
async fn clean_up(shared: &Shared, message: MessageId) {
    let host = &shared.host;
    if host.is_closed() {
        return;
    }

    if shared.options.delete_on_close {
        if let Err(e) = host.delete(message).await {
            debug!("Could not delete message {}: {}", message, e);
        }
        return;
    }

    let bot = host.bot_user();
    for emoji in shared.options.emojis.all().into_iter().filter(|e| !e.is_empty()) {
        match host.remove_reaction(message, emoji, bot).await {
            Ok(()) => {}
            Err(e) if e.is_gone() => debug!("Skipping reaction cleanup on {}: {}", message, e),
            Err(e) => {
                warn!("Failed to remove reaction {} from {}: {}", emoji, message, e);
                break;
            }
        }
    }
}

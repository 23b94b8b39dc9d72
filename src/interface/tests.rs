use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::host::{ChannelId, ChatHost, Embed, MemoryHost, UserId};
use crate::paginator::{PageSource, Paginator, PaginatorError, WrapOptions, WrappedPaginator};

const BOT: UserId = UserId(1);
const OWNER: UserId = UserId(2);
const STRANGER: UserId = UserId(3);
const CHANNEL: ChannelId = ChannelId(10);

fn host() -> Arc<MemoryHost> {
    Arc::new(MemoryHost::new(BOT, Some(OWNER)))
}

/// One ten-character line per page.
fn three_pages() -> Paginator {
    let mut paginator = Paginator::new(Some("```"), Some("```"), 20);
    for i in 0..3 {
        paginator.add_line(&format!("line-{i:05}"), false).unwrap();
    }
    paginator
}

fn one_page() -> Paginator {
    let mut paginator = Paginator::new(Some("```"), Some("```"), 20);
    paginator.add_line("only", false).unwrap();
    paginator
}

/// Lets the background loop drain pending events without reaching any timeout.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn interface(host: &Arc<MemoryHost>, paginator: Paginator, options: InterfaceOptions) -> PaginatorInterface {
    let host: Arc<dyn ChatHost> = host.clone();
    PaginatorInterface::new(host, paginator, options).unwrap()
}

#[test]
fn test_page_size_too_large_for_text() {
    let host: Arc<dyn ChatHost> = host();
    let err = PaginatorInterface::new(
        host,
        Paginator::new(None, None, 1995),
        InterfaceOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        InterfaceError::PageSizeTooLarge {
            page_size: 2004,
            max: 2000
        }
    );
}

#[test]
fn test_embed_has_no_indicator_overhead() {
    let host: Arc<dyn ChatHost> = host();
    assert!(
        PaginatorInterface::embed(
            host.clone(),
            Paginator::new(None, None, 2048),
            InterfaceOptions::default(),
            Embed::default(),
        )
        .is_ok()
    );
    assert!(
        PaginatorInterface::embed(
            host,
            Paginator::new(None, None, 2049),
            InterfaceOptions::default(),
            Embed::default(),
        )
        .is_err()
    );
}

#[test]
fn test_text_render() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::default());
    assert_eq!(
        interface.render().content.as_deref(),
        Some("```\nline-00000\n```\nPage 1/3")
    );
    interface.set_display_page(10);
    assert_eq!(interface.display_page(), 2);
}

#[test]
fn test_embed_render_keeps_template() {
    let host: Arc<dyn ChatHost> = host();
    let template = Embed {
        title: Some("Output".to_owned()),
        ..Embed::default()
    };
    let interface =
        PaginatorInterface::embed(host, three_pages(), InterfaceOptions::default(), template)
            .unwrap();
    interface.set_display_page(1);

    let embed = interface.render().embed.unwrap();
    assert_eq!(embed.title.as_deref(), Some("Output"));
    assert_eq!(embed.description.as_deref(), Some("```\nline-00001\n```"));
    assert_eq!(embed.footer.as_deref(), Some("Page 2/3"));
}

#[tokio::test(start_paused = true)]
async fn test_single_page_only_gets_close_reaction() {
    let host = host();
    let interface = interface(&host, one_page(), InterfaceOptions::for_owner(OWNER));

    let id = interface.send_to(CHANNEL).await.unwrap();
    settle().await;

    let message = host.message(id).unwrap();
    assert_eq!(message.content(), "```\nonly\n```\nPage 1/1");
    assert_eq!(message.reactions_by(BOT), vec!["\u{23F9}"]);
    assert_eq!(interface.state(), SessionState::Active);
    assert_eq!(interface.message(), Some(id));
}

#[tokio::test(start_paused = true)]
async fn test_send_to_twice_is_rejected() {
    let host = host();
    let interface = interface(&host, one_page(), InterfaceOptions::default());
    interface.send_to(CHANNEL).await.unwrap();
    assert_eq!(
        interface.send_to(CHANNEL).await.unwrap_err(),
        InterfaceError::AlreadyBound
    );
}

#[tokio::test(start_paused = true)]
async fn test_navigation_is_clamped() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let emojis = EmojiSettings::default();

    let id = interface.send_to(CHANNEL).await.unwrap();
    assert_eq!(host.message(id).unwrap().reactions_by(BOT).len(), 5);

    host.react(id, &emojis.back, OWNER);
    settle().await;
    assert_eq!(interface.display_page(), 0);

    host.react(id, &emojis.forward, OWNER);
    settle().await;
    assert_eq!(interface.display_page(), 1);
    assert!(host.message(id).unwrap().content().ends_with("Page 2/3"));

    host.react(id, &emojis.end, OWNER);
    settle().await;
    host.react(id, &emojis.forward, OWNER);
    settle().await;
    host.react(id, &emojis.forward, OWNER);
    settle().await;
    assert_eq!(interface.display_page(), 2);
    assert!(host.message(id).unwrap().content().ends_with("Page 3/3"));

    // Removing a reaction navigates too.
    host.unreact(id, &emojis.back, OWNER);
    settle().await;
    assert_eq!(interface.display_page(), 1);

    host.react(id, &emojis.start, OWNER);
    settle().await;
    assert_eq!(interface.display_page(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_render_does_not_edit() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let emojis = EmojiSettings::default();
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.react(id, &emojis.start, OWNER);
    settle().await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(host.message(id).unwrap().edits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ignores_strangers_bots_and_other_messages() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let emojis = EmojiSettings::default();
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.react(id, &emojis.forward, STRANGER);
    host.react(id, &emojis.forward, BOT);
    host.react(MessageId(id.0 + 1), &emojis.forward, OWNER);
    host.react(id, "👍", OWNER);
    settle().await;

    assert_eq!(interface.display_page(), 0);
    assert_eq!(host.message(id).unwrap().edits, 0);
}

#[tokio::test(start_paused = true)]
async fn test_anyone_may_navigate_without_owner() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::default());
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.react(id, &EmojiSettings::default().forward, STRANGER);
    settle().await;
    assert_eq!(interface.display_page(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_from_stranger_is_ignored() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.react(id, &EmojiSettings::default().close, STRANGER);
    settle().await;

    assert!(host.message(id).is_some());
    assert_eq!(interface.state(), SessionState::Active);
    assert!(interface.close_reason().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_from_owner_deletes_message() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.react(id, &EmojiSettings::default().close, OWNER);
    interface.wait_closed().await;

    assert!(host.message(id).is_none());
    assert!(interface.closed());
    assert_eq!(interface.close_reason(), Some(CloseReason::UserClosed));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_strips_reactions() {
    let host = host();
    let options = InterfaceOptions {
        timeout: Duration::from_secs(1),
        ..InterfaceOptions::for_owner(OWNER)
    };
    let interface = interface(&host, three_pages(), options);
    let id = interface.send_to(CHANNEL).await.unwrap();
    host.react(id, "👍", OWNER);

    tokio::time::sleep(Duration::from_secs(5)).await;

    let message = host.message(id).unwrap();
    assert!(message.reactions_by(BOT).is_empty());
    assert_eq!(message.reactions_by(OWNER), vec!["👍"]);
    assert_eq!(interface.state(), SessionState::Closed);
    assert_eq!(interface.close_reason(), Some(CloseReason::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_deletes_when_configured() {
    let host = host();
    let options = InterfaceOptions {
        timeout: Duration::from_secs(1),
        delete_on_close: true,
        ..InterfaceOptions::default()
    };
    let interface = interface(&host, one_page(), options);
    let id = interface.send_to(CHANNEL).await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(host.message(id).is_none());
    assert_eq!(interface.close_reason(), Some(CloseReason::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_add_line_is_debounced_and_follows_last_page() {
    let host = host();
    let interface = interface(&host, one_page(), InterfaceOptions::for_owner(OWNER));
    let id = interface.send_to(CHANNEL).await.unwrap();

    for i in 0..3 {
        interface.add_line(&format!("more-{i:05}"), false).unwrap();
    }
    assert_eq!(interface.page_count(), 4);
    assert_eq!(interface.display_page(), 3);

    tokio::time::sleep(Duration::from_secs(3)).await;

    let message = host.message(id).unwrap();
    assert_eq!(message.edits, 1);
    assert!(message.content().ends_with("Page 4/4"));
    // Navigation reactions appear once there is more than one page.
    assert_eq!(message.reactions_by(BOT).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_add_line_keeps_position_when_not_on_last_page() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::default());
    interface.add_line("extra-line", false).unwrap();
    assert_eq!(interface.display_page(), 0);
    assert_eq!(interface.page_count(), 4);
}

#[test]
fn test_add_line_stops_when_indicator_would_overflow() {
    let host = host();
    let line = "x".repeat(1989);
    let mut paginator = Paginator::new(None, None, 1991);
    paginator.add_line(&line, false).unwrap();
    let interface = interface(&host, paginator, InterfaceOptions::default());

    for _ in 0..8 {
        interface.add_line(&line, false).unwrap();
    }
    assert_eq!(interface.page_count(), 9);
    assert_eq!(
        interface.add_line(&line, false).unwrap_err(),
        InterfaceError::PageLimit { limit: 9 }
    );
    assert_eq!(interface.page_count(), 9);

    interface.set_display_page(8);
    let content = interface.render().content.unwrap();
    assert!(content.chars().count() <= MAX_TEXT_PAGE_SIZE);
    assert!(content.ends_with("\nPage 9/9"));
}

#[test]
fn test_failed_add_line_leaves_pages_unchanged() {
    let host: Arc<dyn ChatHost> = host();
    let mut paginator = WrappedPaginator::new(Paginator::new(None, None, 20), WrapOptions::default());
    paginator.add_line("start", false).unwrap();
    let interface =
        PaginatorInterface::new(host, paginator, InterfaceOptions::default()).unwrap();

    let err = interface
        .add_line(&format!("aaaa {}", "b".repeat(30)), false)
        .unwrap_err();
    assert!(matches!(
        err,
        InterfaceError::Paginator(PaginatorError::Unwrappable { .. })
    ));
    assert_eq!(interface.render().content.as_deref(), Some("start\nPage 1/1"));
}

#[tokio::test(start_paused = true)]
async fn test_external_close_cleans_up() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::default());
    let id = interface.send_to(CHANNEL).await.unwrap();

    interface.close();
    interface.wait_closed().await;

    assert_eq!(interface.close_reason(), Some(CloseReason::Cancelled));
    assert!(host.message(id).unwrap().reactions_by(BOT).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_during_host_shutdown_leaves_message_alone() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::default());
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.shutdown();
    interface.close();
    interface.wait_closed().await;

    assert_eq!(host.message(id).unwrap().reactions_by(BOT).len(), 5);
    assert!(interface.closed());
}

#[tokio::test(start_paused = true)]
async fn test_reaction_after_shutdown_does_not_edit() {
    let host = host();
    let interface = interface(&host, three_pages(), InterfaceOptions::for_owner(OWNER));
    let id = interface.send_to(CHANNEL).await.unwrap();
    settle().await;
    let edits = host.message(id).unwrap().edits;

    host.shutdown();
    host.react(id, &EmojiSettings::default().forward, OWNER);
    interface.wait_closed().await;

    let message = host.message(id).unwrap();
    assert_eq!(message.edits, edits);
    assert!(message.content().ends_with("Page 1/3"));
    assert_eq!(interface.close_reason(), Some(CloseReason::HostClosed));
}

#[tokio::test(start_paused = true)]
async fn test_externally_deleted_message_ends_loop() {
    let host = host();
    let interface = interface(&host, one_page(), InterfaceOptions::default());
    let id = interface.send_to(CHANNEL).await.unwrap();

    host.delete(id).await.unwrap();
    interface.add_line("changed", false).unwrap();
    interface.wait_closed().await;

    assert_eq!(interface.close_reason(), Some(CloseReason::MessageGone));
}

//! CodeToast - Console Harness
//!
//! Runs the CodeToast extension against an in-memory host. Every line typed
//! on stdin is a message from the owner; lines starting with `:` drive the
//! host directly (reactions, task control).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use codetoast::cog::humanize::truncate;
use codetoast::cog::{CodeToast, LoadTime};
use codetoast::config::ToastSettings;
use codetoast::host::{
    ChannelId, ChatHost, MemoryHost, MessageId, MetricsProvider, ProcStatusMetrics, UserId,
};

/// Identity of the bot inside the console host.
const BOT_USER: UserId = UserId(1);

/// Owner used when none is configured.
const CONSOLE_USER: UserId = UserId(2);

/// The single channel console messages are posted to.
const CONSOLE_CHANNEL: ChannelId = ChannelId(1);

/// Owner-only debugging commands for chat bots, driven from a terminal.
#[derive(Parser, Debug)]
#[command(name = "codetoast")]
#[command(about = "Drive the CodeToast extension from a terminal")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// User id of the bot owner (overrides `TOAST_OWNER_ID`).
    #[arg(long)]
    owner: Option<u64>,

    /// Command prefix (overrides `TOAST_PREFIX`).
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let load_time = LoadTime::now();
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings =
        ToastSettings::from_env().context("Failed to load settings from environment")?;
    if let Some(owner) = args.owner {
        settings.owner_id = Some(owner);
    }
    if let Some(prefix) = args.prefix {
        settings.command_prefix = prefix;
    }
    settings.validate().context("Settings validation failed")?;

    let user = settings.owner().unwrap_or(CONSOLE_USER);
    let prefix = settings.command_prefix.clone();

    let host = Arc::new(MemoryHost::new(BOT_USER, Some(user)).with_echo(true));
    let metrics: Arc<dyn MetricsProvider> = Arc::new(ProcStatusMetrics::current());
    let dyn_host: Arc<dyn ChatHost> = host.clone();
    let cog = CodeToast::load(dyn_host, settings, load_time, Some(metrics))
        .context("Failed to load CodeToast")?;

    info!("Console ready as user {}. Try {}ct, or :help", user, prefix);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if !handle_line(&cog, &host, user, line.trim()) {
                    break;
                }
            }
        }
    }

    info!("Shutting down...");
    host.shutdown();
    for record in cog.tasks().running() {
        cog.tasks().cancel(record.sequence);
    }

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Handles one console line. Returns `false` to stop.
fn handle_line(cog: &Arc<CodeToast>, host: &MemoryHost, user: UserId, line: &str) -> bool {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some(":quit") => return false,
        Some(":help") => print_help(cog),
        Some(":tasks") => print_tasks(cog),
        Some(":cancel") => match words.next().and_then(|s| s.parse().ok()) {
            Some(sequence) if cog.tasks().cancel(sequence) => println!("Cancelled #{sequence}"),
            Some(sequence) => println!("No running task #{sequence}"),
            None => println!("Usage: :cancel <task>"),
        },
        Some(verb @ (":react" | ":unreact")) => {
            let message = words.next().and_then(|s| s.parse().ok()).map(MessageId);
            match (message, words.next()) {
                (Some(message), Some(emoji)) if verb == ":react" => host.react(message, emoji, user),
                (Some(message), Some(emoji)) => host.unreact(message, emoji, user),
                _ => println!("Usage: {verb} <message> <emoji>"),
            }
        }
        Some(_) => {
            if cog.handle_message(user, CONSOLE_CHANNEL, line).is_none() {
                println!("(not a command; try :help)");
            }
        }
    }
    true
}

fn print_help(cog: &CodeToast) {
    let prefix = &cog.settings().command_prefix;
    println!("Commands:");
    for entry in cog.commands().walk() {
        let indent = "  ".repeat(entry.depth + 1);
        let help = entry.help.as_deref().unwrap_or_default();
        println!("{indent}{prefix}{:<20} {help}", entry.qualified_name);
    }
    println!("Console:");
    println!("  :react <message> <emoji>    add a reaction as the owner");
    println!("  :unreact <message> <emoji>  remove a reaction");
    println!("  :tasks                      list running commands");
    println!("  :cancel <task>              cancel a running command");
    println!("  :quit                       exit");

    let emojis = codetoast::interface::EmojiSettings::default();
    println!(
        "Paginator: {} first, {} back, {} forward, {} last, {} close",
        emojis.start, emojis.back, emojis.forward, emojis.end, emojis.close
    );
}

fn print_tasks(cog: &CodeToast) {
    let running = cog.tasks().running();
    if running.is_empty() {
        println!("No running commands");
        return;
    }
    for record in running {
        println!(
            "#{} {} (since {})",
            record.sequence,
            truncate(&record.invocation.content, 40),
            record.started_at.format("%H:%M:%S")
        );
    }
}

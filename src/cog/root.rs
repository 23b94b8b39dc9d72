//! The root `codetoast` command: runtime diagnostics.

use std::sync::Arc;

use chrono::{DateTime, Local};

use super::CodeToast;
use super::humanize::{natural_size, natural_time};
use crate::commands::{CommandDescriptor, CommandOptions, CommandResult, Invocation, handler};
use crate::host::{MessagePayload, ShardingMode};

pub(super) fn descriptors() -> Vec<CommandDescriptor<CodeToast>> {
    vec![
        CommandDescriptor::new(
            "toast",
            CommandOptions::new("codetoast")
                .alias("ct")
                .help("Shows runtime diagnostics for the bot")
                .invoke_without_command()
                .strict()
                .hidden(),
        )
        .handler(handler(toast)),
    ]
}

async fn toast(cog: Arc<CodeToast>, invocation: Invocation) -> CommandResult {
    let summary = summary(&cog, Local::now());
    cog.host()
        .send(invocation.channel, MessagePayload::text(summary))
        .await?;
    Ok(())
}

/// Builds the diagnostics text as of `now`.
pub(super) fn summary(cog: &CodeToast, now: DateTime<Local>) -> String {
    let host = cog.host().diagnostics();
    let mut lines = vec![
        format!(
            "🍞 CodeToast `v{}`, 🛠️ debugging module for 🤖 chat bots\n",
            env!("CARGO_PKG_VERSION")
        ),
        format!(
            "{} `{}` bot, running on `{}/{}`",
            host.framework.as_deref().unwrap_or("Unknown framework"),
            host.bot_user,
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
        format!(
            "🗃️ {} command(s) were loaded {}, 🔌 {} cog(s) loaded {}.",
            cog.commands().len(),
            natural_time(cog.load_time().0, now),
            cog.commands().cog_count(),
            natural_time(cog.start_time(), now)
        ),
    ];

    if let Some(metrics) = &cog.metrics {
        match metrics.process_stats() {
            Some(stats) => {
                if let (Some(rss), Some(vms)) = (stats.rss, stats.vms) {
                    let mut memory = format!(
                        "Using `{}` physical memory and `{}` virtual memory",
                        natural_size(rss),
                        natural_size(vms)
                    );
                    if let Some(uss) = stats.uss {
                        memory.push_str(&format!(
                            ", `{}` of which unique to this process",
                            natural_size(uss)
                        ));
                    }
                    memory.push('.');
                    lines.push(memory);
                }

                let name = stats.name.as_deref().unwrap_or("unknown");
                match stats.threads {
                    Some(threads) => lines.push(format!(
                        "💽 Running on PID {} (`{}`) with {} thread(s).",
                        stats.pid, name, threads
                    )),
                    None => lines.push(format!("💽 Running on PID {} (`{}`).", stats.pid, name)),
                }
            }
            None => lines.push("❌ System information could not be loaded.".to_owned()),
        }
        lines.push(String::new());
    }

    let sharding = match host.sharding {
        ShardingMode::AutoSharded => "is automatically sharded",
        ShardingMode::ManuallySharded => "is manually sharded",
        ShardingMode::NotSharded => "is not sharded",
    };
    lines.push(format!(
        "`💡 {}` {} and can see 🚪 {} guild(s) and 😁 {} user(s).",
        host.bot_user, sharding, host.guild_count, host.user_count
    ));
    lines.push(format!(
        "🎚️ Average websocket latency: {:.2}ms",
        host.latency.as_secs_f64() * 1000.0
    ));

    lines.join("\n")
}

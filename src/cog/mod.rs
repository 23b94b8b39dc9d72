//! The CodeToast extension.
//!
//! [`CodeToast::load`] merges the descriptor lists of every feature,
//! registers them into a [`CommandTree`], and from then on
//! [`CodeToast::handle_message`] turns chat messages into tracked,
//! owner-checked command runs.

mod filesystem;
pub mod humanize;
mod root;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands::{
    CommandError, CommandRegistry, CommandResult, CommandTree, Invocation, ParsedCommand,
    RegistryError, compose,
};
use crate::config::ToastSettings;
use crate::host::{ChannelId, ChatHost, MessagePayload, MetricsProvider, UserId};
use crate::interface::InterfaceOptions;
use crate::tasks::TaskTracker;

use self::humanize::truncate;

/// Name the extension publishes its commands under.
pub const COG_NAME: &str = "CodeToast";

/// Timeout for requests made by `curl`.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// When the process first loaded the extension machinery.
///
/// Captured once at startup and handed to every [`CodeToast`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTime(pub DateTime<Local>);

impl LoadTime {
    #[must_use]
    pub fn now() -> Self {
        Self(Local::now())
    }
}

/// Errors that stop the extension from loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to create HTTP client: {0}")]
    Http(String),
}

/// A loaded CodeToast extension bound to one host.
pub struct CodeToast {
    host: Arc<dyn ChatHost>,
    settings: ToastSettings,
    load_time: LoadTime,
    start_time: DateTime<Local>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    http: reqwest::Client,
    commands: CommandTree<Self>,
    registry: CommandRegistry,
    tasks: TaskTracker,
}

impl CodeToast {
    /// Builds the command hierarchy and binds the extension to `host`.
    pub fn load(
        host: Arc<dyn ChatHost>,
        settings: ToastSettings,
        load_time: LoadTime,
        metrics: Option<Arc<dyn MetricsProvider>>,
    ) -> Result<Arc<Self>, LoadError> {
        let descriptors = compose([root::descriptors(), filesystem::descriptors()]);
        let mut commands = CommandTree::new();
        let registry = CommandRegistry::build(COG_NAME, descriptors, &mut commands)?;

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| LoadError::Http(e.to_string()))?;

        info!(
            "{} loaded with prefix {:?}, {} commands",
            COG_NAME,
            settings.command_prefix,
            commands.len()
        );

        Ok(Arc::new(Self {
            host,
            settings,
            load_time,
            start_time: Local::now(),
            metrics,
            http,
            commands,
            registry,
            tasks: TaskTracker::new(),
        }))
    }

    pub fn host(&self) -> &Arc<dyn ChatHost> {
        &self.host
    }

    pub const fn settings(&self) -> &ToastSettings {
        &self.settings
    }

    pub const fn load_time(&self) -> LoadTime {
        self.load_time
    }

    pub const fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub const fn commands(&self) -> &CommandTree<Self> {
        &self.commands
    }

    /// Registered commands by declaration key.
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub const fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Options for a paginator owned by `owner`.
    pub(crate) fn interface_options(&self, owner: UserId) -> InterfaceOptions {
        InterfaceOptions {
            timeout: self.settings.paginator_timeout(),
            delete_on_close: self.settings.delete_on_close,
            ..InterfaceOptions::for_owner(owner)
        }
    }

    /// Dispatches a chat message.
    ///
    /// Returns `None` if the message is not addressed to this extension;
    /// otherwise the command runs on its own task, which is returned.
    pub fn handle_message(
        self: &Arc<Self>,
        author: UserId,
        channel: ChannelId,
        text: &str,
    ) -> Option<JoinHandle<CommandResult>> {
        let parsed = match self.commands.parse(text, &self.settings.command_prefix)? {
            Err(CommandError::UnknownCommand(name)) => {
                debug!("Ignoring unknown command {:?}", name);
                return None;
            }
            parsed => parsed,
        };

        let invocation = Invocation::new(author, channel, text);
        let guard = self.tasks.submit(invocation.clone());
        let sequence = guard.sequence();

        let cog = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = Arc::clone(&cog).invoke(invocation.clone(), parsed).await;
            if let Err(e) = &result {
                cog.report(&invocation, e).await;
            }
            result
        });
        self.tasks.attach(sequence, handle.abort_handle());
        Some(handle)
    }

    async fn invoke(
        self: Arc<Self>,
        mut invocation: Invocation,
        parsed: Result<ParsedCommand, CommandError>,
    ) -> CommandResult {
        if !self.host.is_owner(invocation.author).await {
            info!("Rejected {} from non-owner {}", truncate(&invocation.content, 50), invocation.author);
            return Err(CommandError::NotOwner);
        }

        let parsed = parsed?;
        let handler = self
            .commands
            .handler(parsed.handle)
            .ok_or_else(|| CommandError::UnknownCommand(parsed.qualified_name.clone()))?;

        invocation.command = Some(parsed.qualified_name);
        invocation.args = parsed.args;
        debug!("Running {}", invocation);
        handler(self, invocation).await
    }

    /// Tells the user about errors meant for them and logs the rest.
    async fn report(&self, invocation: &Invocation, error: &CommandError) {
        if !error.is_user_facing() {
            match error {
                CommandError::Cancelled => debug!("{} was cancelled", invocation),
                e => warn!("{} failed: {}", invocation, e),
            }
            return;
        }

        if let Err(e) = self
            .host
            .send(invocation.channel, MessagePayload::text(error.to_string()))
            .await
        {
            warn!("Failed to report error to {}: {}", invocation.channel, e);
        }
    }
}

impl std::fmt::Debug for CodeToast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeToast")
            .field("settings", &self.settings)
            .field("load_time", &self.load_time)
            .field("start_time", &self.start_time)
            .field("commands", &self.commands)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::host::MemoryHost;

    pub(crate) const BOT: UserId = UserId(1);
    pub(crate) const OWNER: UserId = UserId(2);
    pub(crate) const STRANGER: UserId = UserId(3);
    pub(crate) const CHANNEL: ChannelId = ChannelId(10);

    pub(crate) fn load(host: &Arc<MemoryHost>) -> Arc<CodeToast> {
        let dyn_host: Arc<dyn ChatHost> = host.clone();
        CodeToast::load(dyn_host, ToastSettings::default(), LoadTime::now(), None).unwrap()
    }

    pub(crate) fn host() -> Arc<MemoryHost> {
        Arc::new(MemoryHost::new(BOT, Some(OWNER)))
    }

    #[tokio::test]
    async fn test_load_registers_feature_commands() {
        let cog = load(&host());
        let names: Vec<String> = cog
            .commands()
            .walk()
            .into_iter()
            .map(|e| e.qualified_name)
            .collect();
        assert_eq!(names, vec!["codetoast", "codetoast cat", "codetoast curl"]);
        assert_eq!(cog.commands().cog_names(), vec![COG_NAME]);
        assert!(cog.registry().get("toast").is_some());
        assert!(cog.commands().is_group(cog.registry().get("toast").unwrap()));
    }

    #[tokio::test]
    async fn test_non_owner_is_rejected() {
        let host = host();
        let cog = load(&host);

        let result = cog.handle_message(STRANGER, CHANNEL, "!ct").unwrap().await.unwrap();
        assert!(matches!(result, Err(CommandError::NotOwner)));
        assert_eq!(
            host.last_message().unwrap().content(),
            "You must own this bot to use CodeToast"
        );
        assert!(cog.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_messages_are_ignored() {
        let host = host();
        let cog = load(&host);
        assert!(cog.handle_message(OWNER, CHANNEL, "hello").is_none());
        assert!(cog.handle_message(OWNER, CHANNEL, "!help").is_none());
        assert!(host.last_message().is_none());
    }

    #[tokio::test]
    async fn test_unknown_subcommand_is_reported() {
        let host = host();
        let cog = load(&host);
        let result = cog
            .handle_message(OWNER, CHANNEL, "!ct nope")
            .unwrap()
            .await
            .unwrap();
        assert!(matches!(result, Err(CommandError::UnknownSubcommand(_))));
        assert_eq!(
            host.last_message().unwrap().content(),
            "Unknown subcommand \"nope\""
        );
    }

    #[tokio::test]
    async fn test_missing_argument_is_reported() {
        let host = host();
        let cog = load(&host);
        cog.handle_message(OWNER, CHANNEL, "!ct cat")
            .unwrap()
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(
            host.last_message().unwrap().content(),
            "Missing required argument: path"
        );
    }

    #[tokio::test]
    async fn test_interface_options_follow_settings() {
        let host: Arc<dyn ChatHost> = host();
        let settings = ToastSettings {
            paginator_timeout_secs: 5,
            delete_on_close: true,
            ..ToastSettings::default()
        };
        let cog = CodeToast::load(host, settings, LoadTime::now(), None).unwrap();
        let options = cog.interface_options(OWNER);
        assert_eq!(options.owner, Some(OWNER));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert!(options.delete_on_close);
    }
}

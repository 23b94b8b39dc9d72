//! Command types shared by the registry and the dispatcher.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::host::{ChannelId, TransportError, UserId};
use crate::interface::InterfaceError;
use crate::paginator::PaginatorError;

/// Result of running a command handler.
pub type CommandResult = Result<(), CommandError>;

/// A command callback, bound to the component `C` that owns it.
pub type Handler<C> = Arc<dyn Fn(Arc<C>, Invocation) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Wraps an async function as a [`Handler`].
pub fn handler<C, F, Fut>(f: F) -> Handler<C>
where
    F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Arc::new(move |component, invocation| Box::pin(f(component, invocation)))
}

/// Opaque handle to a command registered with a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandHandle(pub(crate) usize);

/// Registration options passed through to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub name: String,
    pub aliases: Vec<String>,
    pub help: Option<String>,
    /// Hidden from help listings.
    pub hidden: bool,
    /// A group runs its own handler when no subcommand is given.
    pub invoke_without_command: bool,
    /// Unmatched trailing words are passed on instead of rejected.
    pub ignore_extra: bool,
}

impl CommandOptions {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ignore_extra: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub const fn invoke_without_command(mut self) -> Self {
        self.invoke_without_command = true;
        self
    }

    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.ignore_extra = false;
        self
    }

    /// Whether `word` names this command, ignoring case.
    pub fn matches(&self, word: &str) -> bool {
        self.name.eq_ignore_ascii_case(word) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(word))
    }
}

/// Context of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub author: UserId,
    pub channel: ChannelId,
    /// Full message text as received.
    pub content: String,
    /// Qualified name of the resolved command, once dispatched.
    pub command: Option<String>,
    /// Words after the command name.
    pub args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(author: UserId, channel: ChannelId, content: impl Into<String>) -> Self {
        Self {
            author,
            channel,
            content: content.into(),
            command: None,
            args: Vec::new(),
        }
    }

    /// The first argument, or a user-facing error naming it.
    pub fn required_arg(&self, name: &'static str) -> Result<&str, CommandError> {
        self.args
            .first()
            .map(String::as_str)
            .ok_or(CommandError::MissingArgument(name))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "{command} by {}", self.author),
            None => write!(f, "{:?} by {}", self.content, self.author),
        }
    }
}

/// Errors raised while dispatching or running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("You must own this bot to use CodeToast")]
    NotOwner,

    #[error("Command \"{0}\" is not found")]
    UnknownCommand(String),

    #[error("Unknown subcommand \"{0}\"")]
    UnknownSubcommand(String),

    #[error("Too many arguments passed to {0}")]
    TooManyArguments(String),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("{0}")]
    User(String),

    #[error(transparent)]
    Paginator(#[from] PaginatorError),

    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Command was cancelled")]
    Cancelled,
}

impl CommandError {
    /// Creates a user-facing error with the given message.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Whether the invoking user should be told about this error.
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NotOwner
                | Self::UnknownSubcommand(_)
                | Self::TooManyArguments(_)
                | Self::MissingArgument(_)
                | Self::User(_)
                | Self::Paginator(_)
                | Self::Interface(
                    InterfaceError::PageSizeTooLarge { .. }
                        | InterfaceError::PageLimit { .. }
                        | InterfaceError::Paginator(_)
                )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_match_name_and_alias_case_insensitively() {
        let options = CommandOptions::new("codetoast").alias("ct");
        assert!(options.matches("CodeToast"));
        assert!(options.matches("CT"));
        assert!(!options.matches("cat"));
    }

    #[test]
    fn test_options_builders() {
        let options = CommandOptions::new("root")
            .hidden()
            .invoke_without_command()
            .strict()
            .help("Shows diagnostics");
        assert!(options.hidden);
        assert!(options.invoke_without_command);
        assert!(!options.ignore_extra);
        assert_eq!(options.help.as_deref(), Some("Shows diagnostics"));
    }

    #[test]
    fn test_required_arg() {
        let mut invocation = Invocation::new(UserId(1), ChannelId(2), "!ct cat");
        assert!(matches!(
            invocation.required_arg("path"),
            Err(CommandError::MissingArgument("path"))
        ));
        invocation.args.push("Cargo.toml".to_owned());
        assert_eq!(invocation.required_arg("path").unwrap(), "Cargo.toml");
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(CommandError::NotOwner.is_user_facing());
        assert!(CommandError::user("bad path").is_user_facing());
        assert!(!CommandError::UnknownCommand("x".to_owned()).is_user_facing());
        assert!(!CommandError::Transport(TransportError::NotFound).is_user_facing());
        assert!(
            CommandError::Interface(InterfaceError::PageSizeTooLarge {
                page_size: 2002,
                max: 2000
            })
            .is_user_facing()
        );
        assert!(!CommandError::Interface(InterfaceError::AlreadyBound).is_user_facing());
    }

    #[tokio::test]
    async fn test_handler_wraps_async_fn() {
        let h: Handler<u32> = handler(|value: Arc<u32>, _invocation| async move {
            if *value == 7 {
                Ok(())
            } else {
                Err(CommandError::user("wrong"))
            }
        });
        let invocation = Invocation::new(UserId(1), ChannelId(1), "");
        assert!(h(Arc::new(7), invocation.clone()).await.is_ok());
        assert!(h(Arc::new(8), invocation).await.is_err());
    }
}

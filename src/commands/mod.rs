//! Command declaration and dispatch.
//!
//! Commands are declared as [`CommandDescriptor`] lists, merged and
//! registered once at load time by [`CommandRegistry`], and resolved from
//! message text by a [`CommandTree`].

mod dispatcher;
mod registry;
mod types;

pub use dispatcher::{CommandEntry, CommandTree, Dispatcher, ParsedCommand};
pub use registry::{CommandDescriptor, CommandRegistry, RegistryError, ResolvedCommand, compose, resolve};
pub use types::{
    CommandError, CommandHandle, CommandOptions, CommandResult, Handler, Invocation, handler,
};

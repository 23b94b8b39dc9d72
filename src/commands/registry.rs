//! Declarative command descriptors and their one-shot registration.
//!
//! Components declare [`CommandDescriptor`]s as plain lists. At load time the
//! lists are merged with [`compose`], parents are resolved by key, and
//! [`CommandRegistry::build`] registers every descriptor with a
//! [`Dispatcher`], parents before children.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use super::dispatcher::Dispatcher;
use super::types::{CommandHandle, CommandOptions, Handler};

/// Fatal configuration errors raised while loading a component.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Couldn't associate command {key} with its parent {parent}")]
    UnresolvedParent { key: String, parent: String },

    #[error("Command {0} lacks a handler")]
    MissingHandler(String),

    #[error("Command {0} is its own ancestor")]
    ParentCycle(String),

    #[error("A command named {0} is already registered here")]
    DuplicateName(String),

    #[error("Unknown command handle")]
    UnknownHandle,

    #[error("Command {0} is not a group")]
    NotAGroup(String),
}

/// A command before registration.
pub struct CommandDescriptor<C> {
    key: String,
    parent: Option<String>,
    standalone_ok: bool,
    options: CommandOptions,
    handler: Option<Handler<C>>,
}

impl<C> Clone for CommandDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            parent: self.parent.clone(),
            standalone_ok: self.standalone_ok,
            options: self.options.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<C> fmt::Debug for CommandDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("standalone_ok", &self.standalone_ok)
            .field("options", &self.options)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl<C> CommandDescriptor<C> {
    /// Declares a command under `key`, the name other descriptors use as a parent.
    #[must_use]
    pub fn new(key: impl Into<String>, options: CommandOptions) -> Self {
        Self {
            key: key.into(),
            parent: None,
            standalone_ok: false,
            options,
            handler: None,
        }
    }

    /// Nests this command under the descriptor declared as `key`.
    #[must_use]
    pub fn parent(mut self, key: impl Into<String>) -> Self {
        self.parent = Some(key.into());
        self
    }

    /// Registers at the root instead of failing when the parent is absent.
    #[must_use]
    pub const fn standalone_ok(mut self) -> Self {
        self.standalone_ok = true;
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: Handler<C>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn options(&self) -> &CommandOptions {
        &self.options
    }
}

/// Merges descriptor lists; a later descriptor replaces an earlier one with
/// the same key, keeping the earlier position.
pub fn compose<C, I>(lists: I) -> Vec<CommandDescriptor<C>>
where
    I: IntoIterator<Item = Vec<CommandDescriptor<C>>>,
{
    let mut merged: Vec<CommandDescriptor<C>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for descriptor in lists.into_iter().flatten() {
        match positions.get(&descriptor.key) {
            Some(&index) => merged[index] = descriptor,
            None => {
                positions.insert(descriptor.key.clone(), merged.len());
                merged.push(descriptor);
            }
        }
    }
    merged
}

/// A descriptor with its parent resolved.
#[derive(Debug)]
pub struct ResolvedCommand<C> {
    pub descriptor: CommandDescriptor<C>,
    /// Index of the parent in the resolved list.
    pub parent: Option<usize>,
    pub depth: usize,
    pub has_children: bool,
}

/// Resolves parents, depths and child flags. Order is preserved.
pub fn resolve<C>(
    descriptors: Vec<CommandDescriptor<C>>,
) -> Result<Vec<ResolvedCommand<C>>, RegistryError> {
    let index: HashMap<&str, usize> = descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| (d.key.as_str(), i))
        .collect();

    let mut parents = Vec::with_capacity(descriptors.len());
    for descriptor in &descriptors {
        let parent = match &descriptor.parent {
            None => None,
            Some(key) => match index.get(key.as_str()) {
                Some(&i) => Some(i),
                None if descriptor.standalone_ok => None,
                None => {
                    return Err(RegistryError::UnresolvedParent {
                        key: descriptor.key.clone(),
                        parent: key.clone(),
                    });
                }
            },
        };
        if descriptor.handler.is_none() {
            return Err(RegistryError::MissingHandler(descriptor.key.clone()));
        }
        parents.push(parent);
    }

    let mut depths = vec![0; descriptors.len()];
    let mut has_children = vec![false; descriptors.len()];
    for (i, depth) in depths.iter_mut().enumerate() {
        let mut ancestor = parents[i];
        while let Some(a) = ancestor {
            has_children[a] = true;
            *depth += 1;
            if *depth > descriptors.len() {
                return Err(RegistryError::ParentCycle(descriptors[i].key.clone()));
            }
            ancestor = parents[a];
        }
    }

    Ok(descriptors
        .into_iter()
        .enumerate()
        .map(|(i, descriptor)| ResolvedCommand {
            descriptor,
            parent: parents[i],
            depth: depths[i],
            has_children: has_children[i],
        })
        .collect())
}

/// Registered commands of one component, by descriptor key.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandHandle>,
}

impl CommandRegistry {
    /// Resolves `descriptors` and registers them with `dispatcher` under `cog`.
    pub fn build<C, D>(
        cog: &str,
        descriptors: Vec<CommandDescriptor<C>>,
        dispatcher: &mut D,
    ) -> Result<Self, RegistryError>
    where
        D: Dispatcher<C> + ?Sized,
    {
        let mut resolved = resolve(descriptors)?;

        // Stable, so declaration order survives within a depth.
        let mut order: Vec<usize> = (0..resolved.len()).collect();
        order.sort_by_key(|&i| resolved[i].depth);

        let mut handles: Vec<Option<CommandHandle>> = vec![None; resolved.len()];
        let mut commands = BTreeMap::new();

        for i in order {
            let parent = match resolved[i].parent {
                Some(p) => Some(handles[p].ok_or(RegistryError::UnknownHandle)?),
                None => None,
            };
            let entry = &mut resolved[i];
            let handler = entry
                .descriptor
                .handler
                .take()
                .ok_or_else(|| RegistryError::MissingHandler(entry.descriptor.key.clone()))?;
            let options = entry.descriptor.options.clone();

            let handle = if entry.has_children {
                dispatcher.register_group(parent, options, handler)?
            } else {
                dispatcher.register_command(parent, options, handler)?
            };
            debug!(
                "Registered {} {} (depth {})",
                if entry.has_children { "group" } else { "command" },
                entry.descriptor.key,
                entry.depth
            );

            handles[i] = Some(handle);
            commands.insert(entry.descriptor.key.clone(), handle);
        }

        let published: Vec<CommandHandle> = commands.values().copied().collect();
        dispatcher.publish(cog, &published);
        info!("Loaded {} commands for {}", published.len(), cog);

        Ok(Self { commands })
    }

    /// Handle of the command declared as `key`.
    pub fn get(&self, key: &str) -> Option<CommandHandle> {
        self.commands.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CommandHandle)> {
        self.commands.iter().map(|(k, h)| (k.as_str(), *h))
    }
}

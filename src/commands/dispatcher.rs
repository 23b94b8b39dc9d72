//! The dispatcher commands are registered with, and the in-process command tree.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::registry::RegistryError;
use super::types::{CommandError, CommandHandle, CommandOptions, Handler};

/// Something commands can be registered with.
pub trait Dispatcher<C> {
    /// Registers a command that has subcommands.
    fn register_group(
        &mut self,
        parent: Option<CommandHandle>,
        options: CommandOptions,
        handler: Handler<C>,
    ) -> Result<CommandHandle, RegistryError>;

    /// Registers a plain command.
    fn register_command(
        &mut self,
        parent: Option<CommandHandle>,
        options: CommandOptions,
        handler: Handler<C>,
    ) -> Result<CommandHandle, RegistryError>;

    /// Makes a finished set of commands visible under the component name `cog`.
    fn publish(&mut self, cog: &str, commands: &[CommandHandle]);
}

struct Node<C> {
    options: CommandOptions,
    handler: Handler<C>,
    group: bool,
    parent: Option<CommandHandle>,
    children: Vec<CommandHandle>,
    cog: Option<String>,
}

/// A command resolved from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub handle: CommandHandle,
    pub qualified_name: String,
    pub args: Vec<String>,
}

/// One line of a help listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub handle: CommandHandle,
    pub qualified_name: String,
    pub help: Option<String>,
    pub hidden: bool,
    pub depth: usize,
}

/// Arena of registered commands, looked up by name or alias.
pub struct CommandTree<C> {
    nodes: Vec<Node<C>>,
    roots: Vec<CommandHandle>,
    cogs: BTreeMap<String, Vec<CommandHandle>>,
}

impl<C> Default for CommandTree<C> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            cogs: BTreeMap::new(),
        }
    }
}

impl<C> fmt::Debug for CommandTree<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("commands", &self.nodes.len())
            .field("roots", &self.roots)
            .field("cogs", &self.cogs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> CommandTree<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, handle: CommandHandle) -> Option<&Node<C>> {
        self.nodes.get(handle.0)
    }

    fn insert(
        &mut self,
        parent: Option<CommandHandle>,
        options: CommandOptions,
        handler: Handler<C>,
        group: bool,
    ) -> Result<CommandHandle, RegistryError> {
        let siblings = match parent {
            Some(p) => {
                let node = self.node(p).ok_or(RegistryError::UnknownHandle)?;
                if !node.group {
                    return Err(RegistryError::NotAGroup(node.options.name.clone()));
                }
                &node.children
            }
            None => &self.roots,
        };

        let clash = std::iter::once(&options.name)
            .chain(&options.aliases)
            .find(|word| self.find(siblings, word).is_some());
        if let Some(word) = clash {
            return Err(RegistryError::DuplicateName(word.clone()));
        }

        let handle = CommandHandle(self.nodes.len());
        match parent {
            Some(p) => self.nodes[p.0].children.push(handle),
            None => self.roots.push(handle),
        }
        self.nodes.push(Node {
            options,
            handler,
            group,
            parent,
            children: Vec::new(),
            cog: None,
        });
        Ok(handle)
    }

    fn find(&self, candidates: &[CommandHandle], word: &str) -> Option<CommandHandle> {
        candidates
            .iter()
            .copied()
            .find(|h| self.node(*h).is_some_and(|n| n.options.matches(word)))
    }

    /// Resolves prefixed message text to a command.
    ///
    /// Returns `None` when the text is not addressed to any command at all.
    pub fn parse(&self, text: &str, prefix: &str) -> Option<Result<ParsedCommand, CommandError>> {
        let rest = text.trim_start().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace().peekable();
        let first = words.next()?;

        let Some(mut current) = self.find(&self.roots, first) else {
            return Some(Err(CommandError::UnknownCommand(first.to_owned())));
        };

        while let Some(node) = self.node(current)
            && node.group
            && let Some(next) = words.peek()
            && let Some(child) = self.find(&node.children, next)
        {
            current = child;
            words.next();
        }

        let args: Vec<String> = words.map(str::to_owned).collect();
        let node = self.node(current)?;

        if node.group && (!node.options.invoke_without_command || (!args.is_empty() && !node.options.ignore_extra)) {
            let word = args.first().cloned().unwrap_or_default();
            return Some(Err(CommandError::UnknownSubcommand(word)));
        }
        if !node.options.ignore_extra && !args.is_empty() {
            return Some(Err(CommandError::TooManyArguments(node.options.name.clone())));
        }

        let qualified_name = self.qualified_name(current)?;
        debug!("Resolved {:?} to {}", text, qualified_name);
        Some(Ok(ParsedCommand {
            handle: current,
            qualified_name,
            args,
        }))
    }

    pub fn handler(&self, handle: CommandHandle) -> Option<Handler<C>> {
        self.node(handle).map(|n| n.handler.clone())
    }

    pub fn options(&self, handle: CommandHandle) -> Option<&CommandOptions> {
        self.node(handle).map(|n| &n.options)
    }

    pub fn is_group(&self, handle: CommandHandle) -> bool {
        self.node(handle).is_some_and(|n| n.group)
    }

    pub fn parent(&self, handle: CommandHandle) -> Option<CommandHandle> {
        self.node(handle).and_then(|n| n.parent)
    }

    pub fn children(&self, handle: CommandHandle) -> &[CommandHandle] {
        self.node(handle).map_or(&[], |n| n.children.as_slice())
    }

    pub fn roots(&self) -> &[CommandHandle] {
        &self.roots
    }

    /// Space-separated names from the root down to `handle`.
    pub fn qualified_name(&self, handle: CommandHandle) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = self.node(h)?;
            names.push(node.options.name.as_str());
            current = node.parent;
        }
        names.reverse();
        Some(names.join(" "))
    }

    /// Component that published `handle`, if any.
    pub fn cog_of(&self, handle: CommandHandle) -> Option<&str> {
        self.node(handle).and_then(|n| n.cog.as_deref())
    }

    pub fn cog_names(&self) -> Vec<&str> {
        self.cogs.keys().map(String::as_str).collect()
    }

    pub fn cog_count(&self) -> usize {
        self.cogs.len()
    }

    /// Total number of registered commands, subcommands included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every command, depth first in registration order.
    pub fn walk(&self) -> Vec<CommandEntry> {
        let mut entries = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(CommandHandle, usize)> = self.roots.iter().rev().map(|h| (*h, 0)).collect();

        while let Some((handle, depth)) = stack.pop() {
            let Some(node) = self.node(handle) else {
                continue;
            };
            entries.push(CommandEntry {
                handle,
                qualified_name: self.qualified_name(handle).unwrap_or_default(),
                help: node.options.help.clone(),
                hidden: node.options.hidden,
                depth,
            });
            stack.extend(node.children.iter().rev().map(|h| (*h, depth + 1)));
        }
        entries
    }
}

impl<C> Dispatcher<C> for CommandTree<C> {
    fn register_group(
        &mut self,
        parent: Option<CommandHandle>,
        options: CommandOptions,
        handler: Handler<C>,
    ) -> Result<CommandHandle, RegistryError> {
        self.insert(parent, options, handler, true)
    }

    fn register_command(
        &mut self,
        parent: Option<CommandHandle>,
        options: CommandOptions,
        handler: Handler<C>,
    ) -> Result<CommandHandle, RegistryError> {
        self.insert(parent, options, handler, false)
    }

    fn publish(&mut self, cog: &str, commands: &[CommandHandle]) {
        for handle in commands {
            if let Some(node) = self.nodes.get_mut(handle.0) {
                node.cog = Some(cog.to_owned());
            }
        }
        self.cogs
            .entry(cog.to_owned())
            .or_default()
            .extend_from_slice(commands);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::handler;

    fn noop() -> Handler<()> {
        handler(|_: Arc<()>, _| async { Ok(()) })
    }

    /// `ct` group with `cat` and a strict `ping`.
    fn tree() -> (CommandTree<()>, CommandHandle, CommandHandle) {
        let mut tree = CommandTree::new();
        let root = tree
            .register_group(
                None,
                CommandOptions::new("codetoast")
                    .alias("ct")
                    .invoke_without_command()
                    .strict(),
                noop(),
            )
            .unwrap();
        let cat = tree
            .register_command(Some(root), CommandOptions::new("cat"), noop())
            .unwrap();
        tree.register_command(Some(root), CommandOptions::new("ping").strict(), noop())
            .unwrap();
        tree.publish("CodeToast", &[root, cat]);
        (tree, root, cat)
    }

    #[test]
    fn test_parse_ignores_unprefixed_text() {
        let (tree, _, _) = tree();
        assert!(tree.parse("ct cat foo", "!").is_none());
        assert!(tree.parse("!", "!").is_none());
        assert!(tree.parse("hello", "!").is_none());
    }

    #[test]
    fn test_parse_root_and_alias() {
        let (tree, root, _) = tree();
        let parsed = tree.parse("!ct", "!").unwrap().unwrap();
        assert_eq!(parsed.handle, root);
        assert_eq!(parsed.qualified_name, "codetoast");
        assert!(parsed.args.is_empty());

        let parsed = tree.parse("  !CodeToast", "!").unwrap().unwrap();
        assert_eq!(parsed.handle, root);
    }

    #[test]
    fn test_parse_subcommand_with_args() {
        let (tree, _, cat) = tree();
        let parsed = tree.parse("!ct CAT src/lib.rs#L1-10", "!").unwrap().unwrap();
        assert_eq!(parsed.handle, cat);
        assert_eq!(parsed.qualified_name, "codetoast cat");
        assert_eq!(parsed.args, vec!["src/lib.rs#L1-10"]);
    }

    #[test]
    fn test_parse_errors() {
        let (tree, _, _) = tree();
        assert!(matches!(
            tree.parse("!nope", "!").unwrap(),
            Err(CommandError::UnknownCommand(name)) if name == "nope"
        ));
        assert!(matches!(
            tree.parse("!ct nope", "!").unwrap(),
            Err(CommandError::UnknownSubcommand(name)) if name == "nope"
        ));
        assert!(matches!(
            tree.parse("!ct ping now", "!").unwrap(),
            Err(CommandError::TooManyArguments(name)) if name == "ping"
        ));
    }

    #[test]
    fn test_group_without_invoke_requires_subcommand() {
        let mut tree = CommandTree::new();
        let group = tree
            .register_group(None, CommandOptions::new("debug"), noop())
            .unwrap();
        tree.register_command(Some(group), CommandOptions::new("sub"), noop())
            .unwrap();
        assert!(matches!(
            tree.parse("!debug", "!").unwrap(),
            Err(CommandError::UnknownSubcommand(word)) if word.is_empty()
        ));
        assert!(tree.parse("!debug sub", "!").unwrap().is_ok());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let (mut tree, root, _) = tree();
        assert_eq!(
            tree.register_command(Some(root), CommandOptions::new("other").alias("CAT"), noop())
                .unwrap_err(),
            RegistryError::DuplicateName("CAT".to_owned())
        );
        assert!(
            tree.register_command(None, CommandOptions::new("cat"), noop())
                .is_ok()
        );
    }

    #[test]
    fn test_only_groups_take_children() {
        let (mut tree, _, cat) = tree();
        assert_eq!(
            tree.register_command(Some(cat), CommandOptions::new("x"), noop())
                .unwrap_err(),
            RegistryError::NotAGroup("cat".to_owned())
        );
        assert_eq!(
            tree.register_command(Some(CommandHandle(99)), CommandOptions::new("x"), noop())
                .unwrap_err(),
            RegistryError::UnknownHandle
        );
    }

    #[test]
    fn test_walk_and_cogs() {
        let (tree, root, cat) = tree();
        let names: Vec<(String, usize)> = tree
            .walk()
            .into_iter()
            .map(|e| (e.qualified_name, e.depth))
            .collect();
        assert_eq!(
            names,
            vec![
                ("codetoast".to_owned(), 0),
                ("codetoast cat".to_owned(), 1),
                ("codetoast ping".to_owned(), 1),
            ]
        );
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.cog_count(), 1);
        assert_eq!(tree.cog_of(cat), Some("CodeToast"));
        assert_eq!(tree.parent(cat), Some(root));
    }
}

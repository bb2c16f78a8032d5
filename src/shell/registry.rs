//! Command registry.
//!
//! Maps a command name to its one-line help text and task entry point.
//! Registration order is preserved for help listings; registering a name
//! twice replaces the earlier descriptor in place.

use crate::shell::task::CommandFn;

/// One registered command. Immutable once registered.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub entry: CommandFn,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) {
        match self.commands.iter_mut().find(|d| d.name == descriptor.name) {
            Some(slot) => *slot = descriptor,
            None => self.commands.push(descriptor),
        }
    }

    /// Exact-name lookup against the typed command line.
    pub fn get(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|d| d.name == name)
    }

    /// Descriptors in registration order, for help display.
    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

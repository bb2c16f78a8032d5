//! Shell context and dispatch.
//!
//! `Shell` is the explicit scheduler context: it owns the command registry,
//! the storage collaborator, and the console transport, and turns typed
//! command lines into pipelines of cooperatively scheduled command tasks.
//! One instance per process entry point; tests build an isolated one each.

pub mod commands;
pub mod output;
pub mod registry;
pub mod task;

use std::rc::Rc;

use async_channel::Sender;
use futures_lite::future::{self, BoxedLocal};

use crate::chunk::Chunk;
use crate::shell::output::{OutputDevice, OutputSink};
use crate::shell::registry::{CommandDescriptor, CommandRegistry};
use crate::shell::task::{spawn_stage, Event, TaskContext};
use crate::storage::Storage;

pub struct Shell {
    registry: CommandRegistry,
    storage: Rc<dyn Storage>,
    console: Rc<dyn OutputDevice>,
}

impl Shell {
    /// Builds a shell with all built-in commands registered.
    pub fn new(storage: Rc<dyn Storage>, console: Rc<dyn OutputDevice>) -> Self {
        let mut registry = CommandRegistry::new();
        commands::register_builtins(&mut registry);
        Self {
            registry,
            storage,
            console,
        }
    }

    pub fn register(&mut self, descriptor: CommandDescriptor) {
        self.registry.register(descriptor);
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Dispatches a command line, starting one task per pipeline stage.
    ///
    /// Syntax: `<name> [arguments]`, stages separated by `|`. The argument
    /// string is handed to the command unparsed. Returns `None` for empty
    /// lines, for `help`, and for unknown commands; lookup failure is
    /// reported through the console sink and is never fatal.
    pub fn dispatch(&self, line: &str) -> Option<Pipeline> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let console_sink = OutputSink::console(self.console.clone());

        if line == "help" || line == "?" {
            self.show_help(&console_sink);
            return None;
        }

        // Resolve every stage before starting any task.
        let mut stages: Vec<(&CommandDescriptor, String)> = Vec::new();
        for stage in line.split('|') {
            let stage = stage.trim();
            let (name, args) = match stage.split_once(' ') {
                Some((name, rest)) => (name, rest.trim().to_string()),
                None => (stage, String::new()),
            };
            match self.registry.get(name) {
                Some(descriptor) => stages.push((descriptor, args)),
                None => {
                    console_sink.emit(name.as_bytes(), b": unknown command");
                    return None;
                }
            }
        }

        // Wire stages back to front so each sink can forward into the
        // next stage's mailbox.
        let mut downstream: Option<Sender<Event>> = None;
        let mut tasks: Vec<BoxedLocal<()>> = Vec::with_capacity(stages.len());
        for (descriptor, args) in stages.into_iter().rev() {
            let (tx, rx) = async_channel::unbounded();
            let output = match downstream.take() {
                Some(next) => OutputSink::piped(next, self.console.clone()),
                None => console_sink.clone(),
            };
            let ctx = TaskContext::new(rx, tx.clone(), output, self.storage.clone());
            tasks.push(spawn_stage(descriptor.entry, args, ctx));
            downstream = Some(tx);
        }
        tasks.reverse();

        downstream.map(|input| Pipeline { input, tasks })
    }

    fn show_help(&self, sink: &OutputSink) {
        sink.emit_str("Available commands:");
        for descriptor in self.registry.iter() {
            sink.emit_str(descriptor.help);
        }
        sink.emit_str("help: shows this help");
    }
}

/// Feeds chunks into the head stage of a running pipeline.
#[derive(Clone)]
pub struct PipelineInput {
    tx: Sender<Event>,
}

impl PipelineInput {
    pub fn send(&self, chunk: Chunk) {
        let _ = self.tx.try_send(Event::Input(chunk));
    }

    /// Delivers the sentinel: end of stream, and the only way to cancel.
    pub fn close(&self) {
        self.send(Chunk::sentinel());
    }
}

/// One dispatched command line: the head mailbox plus a future per stage.
pub struct Pipeline {
    input: Sender<Event>,
    tasks: Vec<BoxedLocal<()>>,
}

impl Pipeline {
    pub fn input_handle(&self) -> PipelineInput {
        PipelineInput {
            tx: self.input.clone(),
        }
    }

    /// Drives every stage to completion, cooperatively on one thread.
    pub async fn run(self) {
        let Pipeline { input, tasks } = self;
        drop(input);
        let mut iter = tasks.into_iter();
        let Some(mut chain) = iter.next() else {
            return;
        };
        for task in iter {
            chain = Box::pin(async move {
                future::zip(chain, task).await;
            });
        }
        chain.await;
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::shell::output::BufferDevice;
    use crate::storage::mem::MemStorage;

    pub(crate) fn shell_with(storage: Rc<MemStorage>) -> (Shell, Rc<BufferDevice>) {
        let console = Rc::new(BufferDevice::new());
        (Shell::new(storage, console.clone()), console)
    }

    /// Dispatches `line`, queues `chunks` plus the sentinel, and drives
    /// the pipeline to completion.
    pub(crate) fn run_with_input(shell: &Shell, line: &str, chunks: Vec<Chunk>) {
        let pipeline = shell.dispatch(line).expect("dispatch failed");
        let input = pipeline.input_handle();
        for chunk in chunks {
            input.send(chunk);
        }
        input.close();
        future::block_on(pipeline.run());
    }
}

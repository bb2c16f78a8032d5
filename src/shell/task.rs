//! Command task execution.
//!
//! Every invocation of a registered command runs as one future: the
//! cooperative unit of execution. A task suspends only by waiting on its
//! event mailbox and owns all of its state (decoder buffers, file guards)
//! for its lifetime. The end-of-stream sentinel chunk is the single
//! cancellation signal; the harness guarantees it is forwarded downstream
//! no matter how the task exits.

use std::rc::Rc;

use async_channel::{Receiver, Sender};
use futures_lite::future::BoxedLocal;

use crate::chunk::Chunk;
use crate::shell::output::OutputSink;
use crate::storage::Storage;

/// What a task's mailbox can deliver.
#[derive(Debug, Clone)]
pub enum Event {
    /// A stream chunk from the line input or the upstream stage.
    Input(Chunk),
    /// A self-posted pacing signal (see the `read` command).
    Continue,
}

/// Entry point of a registered command: argument string in, task future out.
///
/// The argument string is passed unparsed; each command tokenizes it itself.
pub type CommandFn = fn(String, TaskContext) -> BoxedLocal<()>;

/// Everything one command task instance owns: its mailbox, a sender for
/// posting events to itself, its output sink, and the storage collaborator.
pub struct TaskContext {
    events: Receiver<Event>,
    self_tx: Sender<Event>,
    pub output: OutputSink,
    pub storage: Rc<dyn Storage>,
}

impl TaskContext {
    pub(crate) fn new(
        events: Receiver<Event>,
        self_tx: Sender<Event>,
        output: OutputSink,
        storage: Rc<dyn Storage>,
    ) -> Self {
        Self {
            events,
            self_tx,
            output,
            storage,
        }
    }

    /// Suspends until the next event arrives.
    ///
    /// A closed mailbox reads as the sentinel, so a task whose producers
    /// are gone still terminates instead of waiting forever.
    pub async fn next_event(&self) -> Event {
        match self.events.recv().await {
            Ok(ev) => ev,
            Err(_) => Event::Input(Chunk::sentinel()),
        }
    }

    /// Suspends until the next input chunk, skipping stray continue signals.
    pub async fn next_chunk(&self) -> Chunk {
        loop {
            if let Event::Input(chunk) = self.next_event().await {
                return chunk;
            }
        }
    }

    /// Posts a continue signal to this task's own mailbox.
    pub fn post_continue(&self) {
        let _ = self.self_tx.try_send(Event::Continue);
    }
}

/// Closes the downstream stream when dropped.
///
/// Held across the command body so the sentinel reaches the next stage on
/// normal return and on external teardown alike.
struct StreamCloser(OutputSink);

impl Drop for StreamCloser {
    fn drop(&mut self) {
        self.0.close_downstream();
    }
}

/// Wraps a command entry into a stage future with the termination contract.
pub(crate) fn spawn_stage(entry: CommandFn, args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let _closer = StreamCloser(ctx.output.clone());
        entry(args, ctx).await;
    })
}

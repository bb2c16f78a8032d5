//! nodesh - streaming command shell for small networked nodes.
//!
//! A small set of named commands, each a cooperatively scheduled task,
//! consume and produce byte streams through an event-carried chunk
//! protocol: two-segment [`chunk::Chunk`]s delivered to per-task
//! mailboxes, with the empty chunk as the end-of-stream sentinel and the
//! only cancellation signal. File commands talk to an abstract
//! [`storage::Storage`] collaborator; results leave through the
//! [`shell::output::OutputSink`], which either prints to the console or
//! forwards derived chunks to the next stage of a pipeline.

pub mod chunk;
pub mod shell;
pub mod storage;

pub use chunk::{ByteRing, Chunk};
pub use shell::output::{BufferDevice, OutputDevice, StdoutDevice};
pub use shell::registry::{CommandDescriptor, CommandRegistry};
pub use shell::task::{CommandFn, Event, TaskContext};
pub use shell::{Pipeline, PipelineInput, Shell};
pub use storage::{DirEntry, OpenMode, Storage, StorageError};

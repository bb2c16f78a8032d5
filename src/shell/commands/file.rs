//! File commands: ls, write, append, read.
//!
//! All file access goes through the storage collaborator; every open
//! descriptor lives in a guard owned by the task, so it is released exactly
//! once on every exit path, including cancellation mid-stream.

use futures_lite::future::BoxedLocal;

use crate::shell::registry::{CommandDescriptor, CommandRegistry};
use crate::shell::task::{Event, TaskContext};
use crate::storage::{DirGuard, FileGuard, OpenMode};

const MAX_FILENAME_LEN: usize = 40;
const READ_BLOCK: usize = 40;

pub fn register(registry: &mut CommandRegistry) {
    registry.register(CommandDescriptor {
        name: "ls",
        help: "ls: list files",
        entry: cmd_ls,
    });
    registry.register(CommandDescriptor {
        name: "write",
        help: "write <filename>: write to file",
        entry: cmd_write,
    });
    registry.register(CommandDescriptor {
        name: "append",
        help: "append <filename>: append to file",
        entry: cmd_append,
    });
    registry.register(CommandDescriptor {
        name: "read",
        help: "read <filename> [offset]: read from file, with an optional offset",
        entry: cmd_read,
    });
}

fn cmd_ls(_args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let dir = match ctx.storage.open_dir("/") {
            Ok(dir) => DirGuard::new(ctx.storage.clone(), dir),
            Err(_) => {
                ctx.output.emit_str("Cannot open directory");
                return;
            }
        };
        let mut total: u64 = 0;
        while let Some(entry) = dir.next_entry() {
            total += entry.size;
            let size = format!("{:3} ", entry.size);
            ctx.output.emit(size.as_bytes(), entry.name.as_bytes());
        }
        dir.close();
        ctx.output
            .emit(b"Total size: ", total.to_string().as_bytes());
    })
}

fn cmd_write(args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(file_sink(args, ctx, OpenMode::Write, "write"))
}

fn cmd_append(args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(file_sink(args, ctx, OpenMode::Append, "append"))
}

/// Shared body of `write` and `append`: stream chunks into a file,
/// echoing each one back through the output sink.
async fn file_sink(args: String, ctx: TaskContext, mode: OpenMode, name: &'static str) {
    let filename = args.trim();
    if filename.is_empty() {
        let prefix = format!("{name}: filename too short: ");
        ctx.output.emit(prefix.as_bytes(), filename.as_bytes());
        return;
    }
    if filename.len() > MAX_FILENAME_LEN {
        let prefix = format!("{name}: filename too long: ");
        ctx.output.emit(prefix.as_bytes(), filename.as_bytes());
        return;
    }
    let file = match ctx.storage.open(filename, mode) {
        Ok(fd) => FileGuard::new(ctx.storage.clone(), fd),
        Err(_) => {
            let prefix = format!("{name}: could not open file for writing: ");
            ctx.output.emit(prefix.as_bytes(), filename.as_bytes());
            return;
        }
    };
    loop {
        let chunk = ctx.next_chunk().await;
        if chunk.is_sentinel() {
            file.close();
            return;
        }
        let (front, back) = chunk.segments();
        let _ = file.write(front);
        let _ = file.write(back);
        ctx.output.emit(front, back);
    }
}

fn cmd_read(args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let args = args.trim();
        let (filename, offset) = match args.split_once(' ') {
            Some((name, rest)) => (name, parse_offset(rest)),
            None => (args, 0),
        };
        if filename.is_empty() {
            ctx.output.emit(b"read: filename too short: ", args.as_bytes());
            return;
        }
        if filename.len() > MAX_FILENAME_LEN {
            ctx.output.emit(b"read: filename too long: ", args.as_bytes());
            return;
        }

        let file = match ctx.storage.open(filename, OpenMode::Read) {
            Ok(fd) => FileGuard::new(ctx.storage.clone(), fd),
            Err(_) => {
                ctx.output
                    .emit(b"read: could not open file for reading: ", filename.as_bytes());
                return;
            }
        };
        let _ = file.seek(offset);

        loop {
            let mut buf = [0u8; READ_BLOCK];
            let len = file.read(&mut buf).unwrap_or(0);
            if len == 0 {
                file.close();
                return;
            }
            ctx.output.emit(&buf[..len], b"");

            // Self-pacing: one block per scheduling step, and a chance
            // for downstream cancellation to land between blocks.
            ctx.post_continue();
            match ctx.next_event().await {
                Event::Continue => {}
                Event::Input(chunk) => {
                    if chunk.is_sentinel() {
                        file.close();
                        return;
                    }
                }
            }
        }
    })
}

/// Decimal prefix of `text`, ignoring leading whitespace; stops at the
/// first non-digit, so a malformed offset reads as 0.
fn parse_offset(text: &str) -> u64 {
    text.trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, d| {
            acc.saturating_mul(10).saturating_add(u64::from(d - b'0'))
        })
}

//! nodesh binary: interactive REPL or `-c` one-shot execution.
//!
//! The first line of input dispatches a pipeline. While a dispatched
//! pipeline has stream input, further lines are pushed through a fixed
//! byte ring and delivered as chunks; a lone `.` or end of input delivers
//! the end-of-stream sentinel.

use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;

use futures_lite::future;
use lexopt::prelude::*;

use nodesh::storage::host::HostStorage;
use nodesh::storage::mem::MemStorage;
use nodesh::storage::Storage;
use nodesh::{ByteRing, PipelineInput, Shell, StdoutDevice};

const USAGE: &str = "Usage: nodesh [-c COMMAND] [--host-fs DIR]

  -c COMMAND    run one command line and exit; standard input (when not
                a terminal) is streamed to it as chunks
  --host-fs DIR serve file commands from DIR instead of the in-memory
                node filesystem
  -h, --help    show this message

Inside the shell, type 'help' for the command list. End a command's
stream input with a lone '.' line.";

/// Capacity of the line-input ring; small on purpose so stream input
/// regularly produces genuine two-segment wraparound chunks.
const INPUT_RING: usize = 128;

fn main() -> Result<(), lexopt::Error> {
    let mut command: Option<String> = None;
    let mut host_fs: Option<PathBuf> = None;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('c') => command = Some(parser.value()?.string()?),
            Long("host-fs") => host_fs = Some(parser.value()?.into()),
            Short('h') | Long("help") => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => return Err(arg.unexpected()),
        }
    }

    let storage: Rc<dyn Storage> = match host_fs {
        Some(dir) => Rc::new(HostStorage::new(dir)),
        None => {
            let mem = MemStorage::new();
            mem.insert_file(
                "welcome.txt",
                &b"This node keeps its files in memory.\nTry: ls, read welcome.txt, write notes.txt\n"[..],
            );
            Rc::new(mem)
        }
    };
    let shell = Shell::new(storage, Rc::new(StdoutDevice));

    match command {
        Some(line) => run_command(&shell, &line),
        None => run_repl(&shell),
    }
    Ok(())
}

/// Pushes `bytes` through the ring and sends the resulting chunks.
fn feed(input: &PipelineInput, ring: &mut ByteRing, bytes: &[u8]) {
    let mut offset = 0;
    while offset < bytes.len() {
        offset += ring.push_slice(&bytes[offset..]);
        let chunk = ring.take_chunk();
        if !chunk.is_sentinel() {
            input.send(chunk);
        }
    }
}

fn run_command(shell: &Shell, line: &str) {
    let Some(pipeline) = shell.dispatch(line) else {
        return;
    };
    // Stream stdin through the pipeline only when something is piped in;
    // an early end-of-stream would cancel source commands mid-file.
    if !std::io::stdin().is_terminal() {
        let input = pipeline.input_handle();
        let mut data = Vec::new();
        let _ = std::io::stdin().lock().read_to_end(&mut data);
        let mut ring = ByteRing::new(INPUT_RING);
        feed(&input, &mut ring, &data);
        input.close();
    }
    future::block_on(pipeline.run());
}

fn run_repl(shell: &Shell) {
    println!("nodesh {}, type 'help' for commands", env!("CARGO_PKG_VERSION"));

    // A dedicated thread owns stdin; lines reach the cooperative side
    // through a channel so pipelines keep running while input is pending.
    let (line_tx, lines) = async_channel::unbounded::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send_blocking(line).is_err() {
                break;
            }
        }
        line_tx.close();
    });

    future::block_on(async {
        loop {
            prompt();
            let Ok(line) = lines.recv().await else { break };
            let Some(pipeline) = shell.dispatch(&line) else {
                continue;
            };
            let input = pipeline.input_handle();
            let feeder = async {
                let mut ring = ByteRing::new(INPUT_RING);
                loop {
                    match lines.recv().await {
                        Ok(line) if line == "." => {
                            input.close();
                            break;
                        }
                        Ok(line) => {
                            feed(&input, &mut ring, line.as_bytes());
                            feed(&input, &mut ring, b"\n");
                        }
                        Err(_) => {
                            input.close();
                            break;
                        }
                    }
                }
                // The pipeline decides when this race ends.
                future::pending::<()>().await
            };
            // Commands without stream input finish on the first poll,
            // before the feeder can swallow a line.
            future::or(pipeline.run(), feeder).await;
        }
    });
}

fn prompt() {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(b"> ");
    let _ = out.flush();
}

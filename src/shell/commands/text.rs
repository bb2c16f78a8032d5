//! Text and data commands: echo, dec64, hd, binprint, size.

use futures_lite::future::BoxedLocal;

use crate::shell::registry::{CommandDescriptor, CommandRegistry};
use crate::shell::task::TaskContext;

pub fn register(registry: &mut CommandRegistry) {
    registry.register(CommandDescriptor {
        name: "echo",
        help: "echo <text>: print <text>",
        entry: cmd_echo,
    });
    registry.register(CommandDescriptor {
        name: "dec64",
        help: "dec64: decode base64 input",
        entry: cmd_dec64,
    });
    registry.register(CommandDescriptor {
        name: "hd",
        help: "hd: print binary data in hexadecimal format",
        entry: cmd_hd,
    });
    registry.register(CommandDescriptor {
        name: "binprint",
        help: "binprint: print binary data in decimal format",
        entry: cmd_binprint,
    });
    registry.register(CommandDescriptor {
        name: "size",
        help: "size: print the size of the input",
        entry: cmd_size,
    });
}

/// echo emits its argument string and terminates; it has no stream input.
fn cmd_echo(args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        ctx.output.emit(args.as_bytes(), b"\n");
    })
}

const BASE64_MAX_LINELEN: usize = 76;
const DECODE_BUF: usize = 3 * BASE64_MAX_LINELEN / 4;

/// Resumable base64 decoder: lives for one invocation so partial sextet
/// groups survive chunk boundaries.
struct Base64Decoder {
    data: Vec<u8>,
    accumulator: u32,
    sextets: u8,
    padding: usize,
}

impl Base64Decoder {
    fn new() -> Self {
        Self {
            data: Vec::with_capacity(DECODE_BUF),
            accumulator: 0,
            sextets: 0,
            padding: 0,
        }
    }

    fn add_byte(&mut self, c: u8) {
        if c.is_ascii_whitespace() {
            return;
        }
        // Bounded buffer: once full, the rest of the input is dropped.
        if self.data.len() >= DECODE_BUF {
            return;
        }
        if c == b'=' {
            self.padding += 1;
        }
        self.accumulator = (self.accumulator << 6) | u32::from(decode_char(c));
        self.sextets += 1;
        if self.sextets == 4 {
            self.sextets = 0;
            self.data.push((self.accumulator >> 16) as u8);
            self.data.push((self.accumulator >> 8) as u8);
            self.data.push(self.accumulator as u8);
        }
    }

    /// Decoded output with the bytes claimed by `=` padding removed.
    fn decoded(&self) -> &[u8] {
        &self.data[..self.data.len().saturating_sub(self.padding)]
    }
}

/// Lenient alphabet: anything outside it decodes to 0, never an error.
fn decode_char(c: u8) -> u8 {
    match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => 0,
    }
}

fn cmd_dec64(_args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let mut decoder = Base64Decoder::new();
        loop {
            let chunk = ctx.next_chunk().await;
            if chunk.is_sentinel() {
                ctx.output.emit(decoder.decoded(), b"");
                return;
            }
            let (front, back) = chunk.segments();
            for &c in front.iter().chain(back) {
                decoder.add_byte(c);
            }
        }
    })
}

const HD_LINE: usize = 57;
const BINPRINT_LINE: usize = 2 * 64;

/// The 16-bit little-endian cells of a segment; an odd trailing byte is
/// dropped rather than carried into the next segment.
fn cells(segment: &[u8]) -> impl Iterator<Item = u16> + '_ {
    segment
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

fn cmd_hd(_args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let mut line = String::new();
        loop {
            let chunk = ctx.next_chunk().await;
            if chunk.is_sentinel() {
                if !line.is_empty() {
                    ctx.output.emit_str(&line);
                }
                return;
            }
            let (front, back) = chunk.segments();
            for segment in [front, back] {
                for cell in cells(segment) {
                    line.push_str(&format!("0x{cell:04x} "));
                    if line.len() >= HD_LINE - 7 {
                        ctx.output.emit_str(&line);
                        line.clear();
                    }
                }
            }
        }
    })
}

fn cmd_binprint(_args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let mut line = String::new();
        loop {
            let chunk = ctx.next_chunk().await;
            if chunk.is_sentinel() {
                if !line.is_empty() {
                    ctx.output.emit_str(&line);
                }
                return;
            }
            let (front, back) = chunk.segments();
            for segment in [front, back] {
                for cell in cells(segment) {
                    line.push_str(&format!("{cell} "));
                    if line.len() >= BINPRINT_LINE - 6 {
                        ctx.output.emit_str(&line);
                        line.clear();
                    }
                }
            }
        }
    })
}

fn cmd_size(_args: String, ctx: TaskContext) -> BoxedLocal<()> {
    Box::pin(async move {
        let mut total: u64 = 0;
        loop {
            let chunk = ctx.next_chunk().await;
            total += chunk.len() as u64;
            if chunk.is_sentinel() {
                ctx.output.emit_str(&total.to_string());
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::shell::testutil::{run_with_input, shell_with};
    use crate::storage::mem::MemStorage;
    use std::rc::Rc;

    fn fresh_shell() -> (crate::shell::Shell, Rc<crate::shell::output::BufferDevice>) {
        shell_with(Rc::new(MemStorage::new()))
    }

    #[test]
    fn echo_emits_argument_and_newline() {
        let (shell, console) = fresh_shell();
        run_with_input(&shell, "echo hello world", vec![]);
        assert_eq!(console.records(), vec![b"hello world\n".to_vec()]);
    }

    #[test]
    fn echo_without_argument_emits_bare_newline() {
        let (shell, console) = fresh_shell();
        run_with_input(&shell, "echo", vec![]);
        assert_eq!(console.records(), vec![b"\n".to_vec()]);
    }

    #[test]
    fn dec64_decodes_padded_input() {
        let (shell, console) = fresh_shell();
        run_with_input(
            &shell,
            "dec64",
            vec![Chunk::contiguous(b"SGVsbG8=".to_vec())],
        );
        assert_eq!(console.records(), vec![b"Hello".to_vec()]);
    }

    #[test]
    fn dec64_state_survives_chunk_boundaries() {
        let (shell, console) = fresh_shell();
        // Split inside a 4-sextet group.
        run_with_input(
            &shell,
            "dec64",
            vec![
                Chunk::contiguous(b"SG".to_vec()),
                Chunk::split(b"Vs".to_vec(), b"bG".to_vec()),
                Chunk::contiguous(b"8=".to_vec()),
            ],
        );
        assert_eq!(console.records(), vec![b"Hello".to_vec()]);
    }

    #[test]
    fn dec64_skips_whitespace() {
        let (shell, console) = fresh_shell();
        run_with_input(
            &shell,
            "dec64",
            vec![Chunk::contiguous(b"SGVs\r\n bG8=\n".to_vec())],
        );
        assert_eq!(console.records(), vec![b"Hello".to_vec()]);
    }

    #[test]
    fn dec64_maps_invalid_characters_to_zero() {
        let (shell, console) = fresh_shell();
        run_with_input(&shell, "dec64", vec![Chunk::contiguous(b"!!!!".to_vec())]);
        assert_eq!(console.records(), vec![vec![0u8, 0, 0]]);
    }

    #[test]
    fn dec64_double_padding_drops_two_bytes() {
        let (shell, console) = fresh_shell();
        // "QQ==" is the encoding of a single "A".
        run_with_input(&shell, "dec64", vec![Chunk::contiguous(b"QQ==".to_vec())]);
        assert_eq!(console.records(), vec![b"A".to_vec()]);
    }

    #[test]
    fn dec64_drops_input_past_buffer_bound() {
        let (shell, console) = fresh_shell();
        // 80 input characters would decode to 60 bytes; only the buffer's
        // 57 survive, the rest is dropped silently.
        run_with_input(&shell, "dec64", vec![Chunk::contiguous(vec![b'A'; 80])]);
        let records = console.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), DECODE_BUF);
        assert!(records[0].iter().all(|&b| b == 0));
    }

    #[test]
    fn hd_formats_little_endian_cells() {
        let (shell, console) = fresh_shell();
        run_with_input(&shell, "hd", vec![Chunk::contiguous(vec![0x34, 0x12])]);
        assert_eq!(console.strings(), vec!["0x1234 "]);
    }

    #[test]
    fn hd_drops_odd_trailing_byte_per_segment() {
        let (shell, console) = fresh_shell();
        // Three bytes in the front segment, three in the back: the odd
        // byte of each segment vanishes instead of pairing up.
        run_with_input(
            &shell,
            "hd",
            vec![Chunk::split(vec![0x11, 0x22, 0x33], vec![0x44, 0x55, 0x66])],
        );
        assert_eq!(console.strings(), vec!["0x2211 0x5544 "]);
    }

    #[test]
    fn hd_flushes_full_lines_and_remainder() {
        let (shell, console) = fresh_shell();
        // 18 bytes = 9 cells: eight tokens fill a line, one is pending
        // until the sentinel.
        run_with_input(&shell, "hd", vec![Chunk::contiguous(vec![0xab; 18])]);
        let lines = console.strings();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "0xabab ".repeat(8));
        assert_eq!(lines[1], "0xabab ");
    }

    #[test]
    fn hd_line_buffer_persists_across_chunks() {
        let (shell, console) = fresh_shell();
        run_with_input(
            &shell,
            "hd",
            vec![
                Chunk::contiguous(vec![0x01, 0x00]),
                Chunk::contiguous(vec![0x02, 0x00]),
            ],
        );
        // Both tokens arrive in one record, flushed at the sentinel.
        assert_eq!(console.strings(), vec!["0x0001 0x0002 "]);
    }

    #[test]
    fn binprint_formats_decimal_cells() {
        let (shell, console) = fresh_shell();
        run_with_input(
            &shell,
            "binprint",
            vec![Chunk::contiguous(vec![0x34, 0x12, 0xff, 0xff])],
        );
        assert_eq!(console.strings(), vec!["4660 65535 "]);
    }

    #[test]
    fn size_reports_total_only_at_sentinel() {
        let (shell, console) = fresh_shell();
        let pipeline = shell.dispatch("size").unwrap();
        let input = pipeline.input_handle();
        input.send(Chunk::split(b"abc".to_vec(), b"de".to_vec()));
        input.send(Chunk::contiguous(b"fg".to_vec()));
        let mut fut = Box::pin(pipeline.run());
        assert!(
            futures_lite::future::block_on(futures_lite::future::poll_once(&mut fut)).is_none()
        );
        // Both chunks consumed, nothing reported yet.
        assert!(console.records().is_empty());
        input.close();
        futures_lite::future::block_on(fut);
        assert_eq!(console.strings(), vec!["7"]);
    }

    #[test]
    fn size_of_empty_stream_is_zero() {
        let (shell, console) = fresh_shell();
        run_with_input(&shell, "size", vec![]);
        assert_eq!(console.strings(), vec!["0"]);
    }
}

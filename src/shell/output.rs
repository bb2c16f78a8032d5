//! Output sink.
//!
//! Commands emit results as two-segment records. A terminal stage hands the
//! concatenated record to the console transport ([`OutputDevice`]); a piped
//! stage forwards it to the downstream task as a derived chunk, which is the
//! inter-command wire protocol.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use async_channel::Sender;

use crate::chunk::Chunk;
use crate::shell::task::Event;

/// Console transport seam: delivers one finished output record.
pub trait OutputDevice {
    fn write_record(&self, record: &[u8]);
}

/// Writes each record to stdout as one line.
pub struct StdoutDevice;

impl OutputDevice for StdoutDevice {
    fn write_record(&self, record: &[u8]) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(record);
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}

/// Captures records for assertions in tests.
#[derive(Default)]
pub struct BufferDevice {
    records: RefCell<Vec<Vec<u8>>>,
}

impl BufferDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.borrow().clone()
    }

    /// Records decoded lossily, one string per emitted record.
    pub fn strings(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .map(|r| String::from_utf8_lossy(r).into_owned())
            .collect()
    }
}

impl OutputDevice for BufferDevice {
    fn write_record(&self, record: &[u8]) {
        self.records.borrow_mut().push(record.to_vec());
    }
}

/// The side-effecting call each command uses to emit formatted results.
#[derive(Clone)]
pub struct OutputSink {
    downstream: Option<Sender<Event>>,
    device: Rc<dyn OutputDevice>,
}

impl OutputSink {
    /// A sink that delivers records to the console transport.
    pub fn console(device: Rc<dyn OutputDevice>) -> Self {
        Self {
            downstream: None,
            device,
        }
    }

    /// A sink that forwards records to a downstream task's mailbox.
    pub(crate) fn piped(downstream: Sender<Event>, device: Rc<dyn OutputDevice>) -> Self {
        Self {
            downstream: Some(downstream),
            device,
        }
    }

    /// Emits both segments as one logical output record.
    pub fn emit(&self, first: &[u8], second: &[u8]) {
        match &self.downstream {
            Some(tx) => {
                let _ = tx.try_send(Event::Input(Chunk::split(first, second)));
            }
            None => {
                let mut record = Vec::with_capacity(first.len() + second.len());
                record.extend_from_slice(first);
                record.extend_from_slice(second);
                self.device.write_record(&record);
            }
        }
    }

    /// String convenience form of [`emit`](Self::emit).
    pub fn emit_str(&self, text: &str) {
        self.emit(text.as_bytes(), b"");
    }

    /// Delivers the sentinel downstream; the stream must not be written
    /// to afterwards.
    pub(crate) fn close_downstream(&self) {
        if let Some(tx) = &self.downstream {
            let _ = tx.try_send(Event::Input(Chunk::sentinel()));
            tx.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_sink_concatenates_segments() {
        let device = Rc::new(BufferDevice::new());
        let sink = OutputSink::console(device.clone());
        sink.emit(b"foo", b"bar");
        sink.emit_str("baz");
        assert_eq!(device.records(), vec![b"foobar".to_vec(), b"baz".to_vec()]);
    }

    #[test]
    fn piped_sink_forwards_records_as_chunks() {
        let device = Rc::new(BufferDevice::new());
        let (tx, rx) = async_channel::unbounded();
        let sink = OutputSink::piped(tx, device.clone());
        sink.emit(b"ab", b"cd");
        sink.close_downstream();

        let Ok(Event::Input(chunk)) = rx.try_recv() else {
            panic!("expected a data chunk");
        };
        assert_eq!(chunk.segments(), (&b"ab"[..], &b"cd"[..]));
        let Ok(Event::Input(end)) = rx.try_recv() else {
            panic!("expected the sentinel");
        };
        assert!(end.is_sentinel());
        assert!(device.records().is_empty());
    }
}

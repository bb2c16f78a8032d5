//! Stream chunk protocol.
//!
//! Data flows between the line input and a command task, and between chained
//! command tasks, as `Chunk` events. A chunk carries up to two byte segments
//! that are logically contiguous; the split mirrors the wraparound of the
//! fixed-capacity input ring (`ByteRing`). The empty chunk is the
//! end-of-stream sentinel and the only cancellation signal a task receives.

/// One event-delivered unit of stream data.
///
/// Consumers must treat the two segments as a single logical run,
/// `front ++ back`, and process them in that order within one resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    front: Vec<u8>,
    back: Vec<u8>,
}

impl Chunk {
    /// The end-of-stream sentinel: both segments empty.
    pub fn sentinel() -> Self {
        Self {
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    /// A chunk carried entirely in the first segment.
    pub fn contiguous(data: impl Into<Vec<u8>>) -> Self {
        Self {
            front: data.into(),
            back: Vec::new(),
        }
    }

    /// A chunk split across a ring wraparound boundary.
    pub fn split(front: impl Into<Vec<u8>>, back: impl Into<Vec<u8>>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }

    /// True for the unique non-data-bearing "stream closed" chunk.
    pub fn is_sentinel(&self) -> bool {
        self.front.is_empty() && self.back.is_empty()
    }

    /// Both segments, in processing order.
    pub fn segments(&self) -> (&[u8], &[u8]) {
        (&self.front, &self.back)
    }

    /// Total payload length across both segments.
    pub fn len(&self) -> usize {
        self.front.len() + self.back.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The segments joined into one owned run.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.front);
        out.extend_from_slice(&self.back);
        out
    }
}

/// A fixed-capacity byte ring buffer.
///
/// The line-input side pushes raw bytes here and drains them as `Chunk`s;
/// when the pending run wraps around the end of the backing array it is
/// exposed as two segments rather than copied back into one.
pub struct ByteRing {
    data: Vec<u8>,
    head: usize,
    len: usize,
}

impl ByteRing {
    /// Creates a ring with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ByteRing capacity must be greater than 0");
        Self {
            data: vec![0; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Appends as much of `bytes` as fits; excess is dropped.
    ///
    /// Returns the number of bytes accepted.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let capacity = self.data.len();
        let take = bytes.len().min(capacity - self.len);
        for &b in &bytes[..take] {
            let at = (self.head + self.len) % capacity;
            self.data[at] = b;
            self.len += 1;
        }
        take
    }

    /// The pending bytes as at most two wraparound slices, oldest first.
    pub fn segments(&self) -> (&[u8], &[u8]) {
        let capacity = self.data.len();
        let first = self.len.min(capacity - self.head);
        (
            &self.data[self.head..self.head + first],
            &self.data[..self.len - first],
        )
    }

    /// Drains all pending bytes into one chunk.
    ///
    /// An empty ring drains to the sentinel, so callers that forward the
    /// result must check `is_empty` first.
    pub fn take_chunk(&mut self) -> Chunk {
        let (front, back) = self.segments();
        let chunk = Chunk::split(front, back);
        self.head = (self.head + self.len) % self.data.len();
        self.len = 0;
        chunk
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_empty_both_segments() {
        let s = Chunk::sentinel();
        assert!(s.is_sentinel());
        assert_eq!(s.segments(), (&[][..], &[][..]));
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn split_chunk_is_logically_contiguous() {
        let c = Chunk::split(b"foo".to_vec(), b"bar".to_vec());
        assert!(!c.is_sentinel());
        assert_eq!(c.len(), 6);
        assert_eq!(c.to_vec(), b"foobar");
    }

    #[test]
    fn contiguous_chunk_has_empty_back_segment() {
        let c = Chunk::contiguous(b"abc".to_vec());
        let (front, back) = c.segments();
        assert_eq!(front, b"abc");
        assert!(back.is_empty());
    }

    #[test]
    fn ring_push_and_drain() {
        let mut ring = ByteRing::new(8);
        assert_eq!(ring.push_slice(b"hello"), 5);
        assert_eq!(ring.len(), 5);
        let c = ring.take_chunk();
        assert_eq!(c.to_vec(), b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn ring_wraparound_yields_two_segments() {
        let mut ring = ByteRing::new(8);
        ring.push_slice(b"abcdef");
        ring.take_chunk();
        // head is now at 6; this run wraps.
        ring.push_slice(b"wxyz");
        let (front, back) = ring.segments();
        assert_eq!(front, b"wx");
        assert_eq!(back, b"yz");
        let c = ring.take_chunk();
        assert_eq!(c.segments().0, b"wx");
        assert_eq!(c.segments().1, b"yz");
        assert_eq!(c.to_vec(), b"wxyz");
    }

    #[test]
    fn ring_drops_overflow() {
        let mut ring = ByteRing::new(4);
        assert_eq!(ring.push_slice(b"abcdef"), 4);
        assert_eq!(ring.take_chunk().to_vec(), b"abcd");
    }

    #[test]
    fn empty_ring_drains_to_sentinel() {
        let mut ring = ByteRing::new(4);
        assert!(ring.take_chunk().is_sentinel());
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn zero_capacity_panics() {
        let _ = ByteRing::new(0);
    }
}

use crate::invariants::{
    debug_assert_cursor_in_bounds, debug_assert_sentinel_kept, debug_assert_single_segment,
};
use crate::PipeError;

// =============================================================================
// CURSOR PROTOCOL
// =============================================================================
//
// Two wrapped cursors over a fixed byte buffer:
//
//   read_pos == write_pos                   -> empty
//   (write_pos + 1) % capacity == read_pos  -> full
//
// One slot is always left unused (the sentinel) so the two states stay
// distinguishable without a separate length field. Usable capacity is
// therefore `capacity - 1`.
//
// Every copy in or out covers a single contiguous run: from the cursor up to
// the other cursor or the physical end of the buffer, whichever comes first.
// Crossing the wrap boundary takes a second call.
//
// RingStore does no locking; the owning Channel serializes all access.
//
// =============================================================================

/// Fixed-capacity circular byte buffer with a sentinel slot.
#[derive(Debug)]
pub struct RingStore {
    /// Fixed at construction, never grows or shrinks.
    buffer: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl RingStore {
    /// Allocates a zeroed store of `capacity` bytes with both cursors at 0.
    ///
    /// Returns `ResourceExhausted` if the allocation fails rather than
    /// aborting the process.
    pub fn new(capacity: usize) -> Result<Self, PipeError> {
        if capacity < 2 {
            return Err(PipeError::InvalidArgument("capacity must be at least 2"));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| PipeError::ResourceExhausted { capacity })?;
        buffer.resize(capacity, 0u8);

        Ok(Self {
            buffer: buffer.into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        })
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    #[inline]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Returns the number of resident (unread) bytes.
    #[inline]
    pub fn len(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.capacity() - self.read_pos + self.write_pos
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.space_free() == 0
    }

    /// Returns the number of bytes that can be written before the buffer is full.
    #[inline]
    pub fn space_free(&self) -> usize {
        let capacity = self.capacity();
        if self.read_pos == self.write_pos {
            return capacity - 1;
        }
        ((self.read_pos + capacity - self.write_pos) % capacity) - 1
    }

    /// Length of the contiguous readable run starting at `read_pos`.
    #[inline]
    pub fn readable_len(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.capacity() - self.read_pos
        }
    }

    /// Length of the contiguous writable run starting at `write_pos`.
    ///
    /// Stops at the physical end of the buffer, or one byte short of
    /// `read_pos` so the sentinel slot is never filled.
    #[inline]
    pub fn writable_len(&self) -> usize {
        let free = self.space_free();
        let contiguous = if self.write_pos >= self.read_pos {
            self.capacity() - self.write_pos
        } else {
            self.read_pos - self.write_pos - 1
        };
        free.min(contiguous)
    }

    /// Returns the contiguous readable run without consuming it.
    #[inline]
    pub fn readable_run(&self) -> &[u8] {
        &self.buffer[self.read_pos..self.read_pos + self.readable_len()]
    }

    // ---------------------------------------------------------------------
    // DATA MOVEMENT
    // ---------------------------------------------------------------------

    /// Copies up to `out.len()` bytes of the current readable run into `out`.
    ///
    /// Returns the number of bytes copied, which is 0 only when the store is
    /// empty or `out` is empty.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.readable_len());
        if n == 0 {
            return 0;
        }

        debug_assert_single_segment!(self.read_pos, n, self.capacity());
        out[..n].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + n]);
        self.advance_read(n);
        n
    }

    /// Copies as much of `data` as fits in the current writable run.
    ///
    /// Returns the number of bytes accepted, which is 0 only when the store
    /// is full or `data` is empty.
    pub fn write_from(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.writable_len());
        if n == 0 {
            return 0;
        }

        debug_assert_single_segment!(self.write_pos, n, self.capacity());
        self.buffer[self.write_pos..self.write_pos + n].copy_from_slice(&data[..n]);
        self.advance_write(n);
        n
    }

    #[inline]
    fn advance_read(&mut self, n: usize) {
        self.read_pos = (self.read_pos + n) % self.capacity();
        debug_assert_cursor_in_bounds!("read", self.read_pos, self.capacity());
    }

    #[inline]
    fn advance_write(&mut self, n: usize) {
        self.write_pos = (self.write_pos + n) % self.capacity();
        debug_assert_cursor_in_bounds!("write", self.write_pos, self.capacity());
        debug_assert_sentinel_kept!(self.len(), self.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let ring = RingStore::new(8).unwrap();
        assert_eq!(ring.capacity(), 8);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.space_free(), 7);
        assert_eq!(ring.readable_len(), 0);
    }

    #[test]
    fn test_rejects_capacity_below_two() {
        assert!(matches!(
            RingStore::new(0),
            Err(PipeError::InvalidArgument(_))
        ));
        assert!(matches!(
            RingStore::new(1),
            Err(PipeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        assert_eq!(
            RingStore::new(usize::MAX).err(),
            Some(PipeError::ResourceExhausted {
                capacity: usize::MAX
            })
        );
    }

    #[test]
    fn test_fill_keeps_sentinel() {
        let mut ring = RingStore::new(8).unwrap();

        assert_eq!(ring.write_from(b"ABCDEFGH"), 7);
        assert!(ring.is_full());
        assert_eq!(ring.len(), 7);
        assert_eq!(ring.write_pos(), 7);
        assert_eq!(ring.write_from(b"Z"), 0);
    }

    #[test]
    fn test_read_then_write_single_segment() {
        let mut ring = RingStore::new(8).unwrap();
        ring.write_from(b"ABCDEFG");

        let mut out = [0u8; 3];
        assert_eq!(ring.read_into(&mut out), 3);
        assert_eq!(&out, b"ABC");
        assert_eq!(ring.space_free(), 3);

        // Only one byte fits before the physical end.
        assert_eq!(ring.writable_len(), 1);
        assert_eq!(ring.write_from(b"XYZ"), 1);
        assert_eq!(ring.write_pos(), 0);

        // The rest goes in after the wrap, stopping short of read_pos.
        assert_eq!(ring.writable_len(), 2);
        assert_eq!(ring.write_from(b"YZ"), 2);
        assert!(ring.is_full());
    }

    #[test]
    fn test_read_stops_at_physical_end() {
        let mut ring = RingStore::new(8).unwrap();
        ring.write_from(b"ABCDEF");
        let mut out = [0u8; 8];
        assert_eq!(ring.read_into(&mut out[..5]), 5);

        // write_pos runs 6 -> 0 -> 2
        assert_eq!(ring.write_from(b"GH"), 2);
        assert_eq!(ring.write_from(b"IJ"), 2);
        assert_eq!(ring.write_pos(), 2);
        assert_eq!(ring.len(), 5);

        // First read gets "FGH" up to the end, second gets "IJ".
        assert_eq!(ring.readable_run(), b"FGH");
        assert_eq!(ring.read_into(&mut out), 3);
        assert_eq!(&out[..3], b"FGH");
        assert_eq!(ring.read_into(&mut out), 2);
        assert_eq!(&out[..2], b"IJ");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_zero_length_transfers() {
        let mut ring = RingStore::new(4).unwrap();
        assert_eq!(ring.write_from(&[]), 0);
        assert_eq!(ring.read_into(&mut []), 0);
        ring.write_from(b"a");
        assert_eq!(ring.read_into(&mut []), 0);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_wrap_cycles_preserve_data() {
        let mut ring = RingStore::new(5).unwrap();
        let mut out = [0u8; 4];

        for round in 0u8..20 {
            let data = [round, round.wrapping_add(1), round.wrapping_add(2)];
            let mut written = 0;
            while written < data.len() {
                written += ring.write_from(&data[written..]);
            }

            let mut got = Vec::new();
            while !ring.is_empty() {
                let n = ring.read_into(&mut out);
                got.extend_from_slice(&out[..n]);
            }
            assert_eq!(got, data, "round {}", round);
        }
    }
}

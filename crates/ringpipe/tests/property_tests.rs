//! Property-based tests for the ring store and pipe invariants.
//!
//! Coverage:
//! - RingStore (cursor arithmetic, sentinel slot)
//! - Channel/Handle (FIFO, non-blocking behavior)

use proptest::prelude::*;
use ringpipe::{Access, Channel, Config, PipeError, RingStore, Wait};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Write(Vec<u8>),
    Read(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(Op::Write),
        (0usize..24).prop_map(Op::Read),
    ]
}

// =============================================================================
// Bounded Count
// "resident bytes never exceed capacity - 1"
// =============================================================================

proptest! {
    #[test]
    fn prop_resident_never_exceeds_usable_capacity(
        capacity in 2usize..32,
        ops in prop::collection::vec(op_strategy(), 1..100),
    ) {
        let mut ring = RingStore::new(capacity).unwrap();
        let mut out = vec![0u8; 32];

        for op in ops {
            match op {
                Op::Write(data) => { ring.write_from(&data); }
                Op::Read(n) => { ring.read_into(&mut out[..n]); }
            }
            prop_assert!(ring.len() <= capacity - 1,
                "len {} exceeds usable capacity {}", ring.len(), capacity - 1);
            prop_assert!(ring.read_pos() < capacity);
            prop_assert!(ring.write_pos() < capacity);
            prop_assert_eq!(ring.len() + ring.space_free(), capacity - 1);
        }
    }
}

// =============================================================================
// FIFO
// "bytes read are exactly the bytes written, in write order"
// =============================================================================

proptest! {
    #[test]
    fn prop_ring_matches_reference_queue(
        capacity in 2usize..32,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut ring = RingStore::new(capacity).unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();
        let mut out = vec![0u8; 32];

        for op in ops {
            match op {
                Op::Write(data) => {
                    let n = ring.write_from(&data);
                    prop_assert!(n <= data.len());
                    if !data.is_empty() && model.len() < capacity - 1 {
                        prop_assert!(n > 0, "write made no progress with space free");
                    }
                    model.extend(&data[..n]);
                }
                Op::Read(want) => {
                    let n = ring.read_into(&mut out[..want]);
                    if want > 0 && !model.is_empty() {
                        prop_assert!(n > 0, "read made no progress with data resident");
                    }
                    for &byte in &out[..n] {
                        prop_assert_eq!(Some(byte), model.pop_front());
                    }
                }
            }
            prop_assert_eq!(ring.len(), model.len());
        }
    }

    #[test]
    fn prop_pipe_round_trip(
        capacity in 2usize..64,
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let ch = Channel::new(Config::new(capacity, false)).unwrap();
        let rw = ch.open(Access::READ_WRITE).unwrap();
        let mut received = Vec::with_capacity(payload.len());
        let mut buf = [0u8; 64];
        let mut sent = 0;

        // Single thread: alternate filling and draining without ever blocking.
        while received.len() < payload.len() {
            if sent < payload.len() {
                sent += rw
                    .write_all(&payload[sent..], Wait::nonblocking())
                    .unwrap_or(0);
            }
            loop {
                match rw.read(&mut buf, Wait::nonblocking()) {
                    Ok(n) => received.extend_from_slice(&buf[..n]),
                    Err(PipeError::WouldBlock) => break,
                    Err(e) => return Err(TestCaseError::fail(format!("read failed: {e}"))),
                }
            }
        }

        prop_assert_eq!(received, payload);
    }
}

// =============================================================================
// Non-blocking correctness
// "WouldBlock leaves buffer state unchanged"
// =============================================================================

proptest! {
    #[test]
    fn prop_would_block_is_side_effect_free(
        capacity in 2usize..32,
        extra in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        let ch = Channel::new(Config::new(capacity, false)).unwrap();
        let rw = ch.open(Access::READ_WRITE).unwrap();

        let mut buf = [0u8; 8];
        prop_assert_eq!(
            rw.read(&mut buf, Wait::nonblocking()),
            Err(PipeError::WouldBlock)
        );

        let fill = vec![0xAB; capacity - 1];
        prop_assert_eq!(rw.write_all(&fill, Wait::nonblocking()), Ok(capacity - 1));

        let before = ch.status();
        prop_assert_eq!(
            rw.write(&extra, Wait::nonblocking()),
            Err(PipeError::WouldBlock)
        );
        prop_assert_eq!(ch.status(), before);
    }
}

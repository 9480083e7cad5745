//! Bounded inbound packet queue. The radio callback pushes; the tick loop pops a capped batch.

use std::collections::VecDeque;

use crate::identity::PeerId;

/// One received packet, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub source: PeerId,
    pub bytes: Vec<u8>,
    pub received_at: u64,
}

/// Fixed-capacity FIFO that drops the oldest packet on overflow.
#[derive(Debug)]
pub struct InboundQueue {
    buf: VecDeque<Inbound>,
    capacity: usize,
    dropped: u64,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Enqueue; returns the evicted packet when the queue was full.
    pub fn push(&mut self, source: PeerId, bytes: Vec<u8>, received_at: u64) -> Option<Inbound> {
        let evicted = if self.buf.len() >= self.capacity {
            self.dropped += 1;
            self.buf.pop_front()
        } else {
            None
        };
        if evicted.is_some() {
            tracing::warn!(dropped = self.dropped, "inbound queue full, dropped oldest packet");
        }
        self.buf.push_back(Inbound {
            source,
            bytes,
            received_at,
        });
        evicted
    }

    /// Pop up to `max` packets in arrival order.
    pub fn pop_batch(&mut self, max: usize) -> Vec<Inbound> {
        let n = max.min(self.buf.len());
        self.buf.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Packets lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

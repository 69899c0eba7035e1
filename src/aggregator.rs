//! Message aggregator
//!
//! Thread-safe buffer of recently received messages. The delivery task
//! appends to it as publishes arrive; the render loop periodically trims it
//! and takes a snapshot.
//!
//! A single mutex guards the buffer. It is held for O(1) work in
//! [`MessageAggregator::append`] and for the trim-and-copy in
//! [`MessageAggregator::snapshot_and_trim`], never across I/O or `.await`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One message as received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub payload: String,
    /// Arrival order, assigned under the buffer lock.
    pub sequence: u64,
}

impl ReceivedMessage {
    /// `"{topic}: {payload}"`, the form shown on the status page.
    pub fn display_line(&self) -> String {
        format!("{}: {}", self.topic, self.payload)
    }
}

#[derive(Debug, Default)]
struct Buffer {
    messages: VecDeque<ReceivedMessage>,
    next_sequence: u64,
}

/// Bounded buffer of received messages shared between the delivery task and
/// the render loop.
#[derive(Debug)]
pub struct MessageAggregator {
    buffer: Mutex<Buffer>,
    capacity: Option<usize>,
}

impl MessageAggregator {
    /// An aggregator that only trims when read.
    pub fn unbounded() -> Self {
        Self {
            buffer: Mutex::new(Buffer::default()),
            capacity: None,
        }
    }

    /// An aggregator that keeps at most `capacity` messages, dropping the
    /// oldest on append. A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Buffer::default()),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Append one message at the tail.
    pub fn append(&self, topic: impl Into<String>, payload: impl Into<String>) {
        let mut buffer = self.lock();
        let sequence = buffer.next_sequence;
        buffer.next_sequence += 1;
        buffer.messages.push_back(ReceivedMessage {
            topic: topic.into(),
            payload: payload.into(),
            sequence,
        });
        if let Some(capacity) = self.capacity {
            while buffer.messages.len() > capacity {
                buffer.messages.pop_front();
            }
        }
    }

    /// Discard all but the last `limit` messages, then return the remaining
    /// ones as display lines in arrival order. `None` keeps everything.
    pub fn snapshot_and_trim(&self, limit: Option<usize>) -> Vec<String> {
        self.trimmed(limit)
            .iter()
            .map(ReceivedMessage::display_line)
            .collect()
    }

    /// Same trim as [`snapshot_and_trim`](Self::snapshot_and_trim) but
    /// returns the messages themselves.
    pub fn trimmed(&self, limit: Option<usize>) -> Vec<ReceivedMessage> {
        let mut buffer = self.lock();
        if let Some(limit) = limit {
            let excess = buffer.messages.len().saturating_sub(limit);
            buffer.messages.drain(..excess);
        }
        buffer.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    /// Number of messages ever appended, including trimmed ones.
    pub fn total_received(&self) -> u64 {
        self.lock().next_sequence
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MessageAggregator {
    fn default() -> Self {
        Self::unbounded()
    }
}

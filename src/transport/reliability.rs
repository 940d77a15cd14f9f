//! Reliability queue: reliable envelopes awaiting acknowledgment.
//!
//! Envelopes are keyed by sequence number. The sender loop sweeps the queue
//! for retransmissions while the receiver loop removes acknowledged entries,
//! so every operation takes the queue lock briefly and never holds it across
//! an await.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::envelope::Envelope;

/// Outcome of one retransmission sweep.
#[derive(Debug, Default)]
pub struct Sweep {
    /// Envelopes to put back on the wire, already marked as resent.
    pub resend: Vec<Envelope>,
    /// Envelopes evicted after exhausting their retries.
    pub failed: Vec<Envelope>,
}

impl Sweep {
    /// Check if the sweep found nothing to do.
    pub fn is_empty(&self) -> bool {
        self.resend.is_empty() && self.failed.is_empty()
    }
}

/// Reliable envelopes in flight, keyed by sequence.
#[derive(Debug, Default)]
pub struct ReliabilityQueue {
    pending: Mutex<BTreeMap<u32, Envelope>>,
}

impl ReliabilityQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `envelope` under its sequence.
    ///
    /// Returns the envelope previously tracked under the same sequence, which
    /// only happens if sequence numbers wrap while packets are still in flight.
    pub fn track(&self, envelope: Envelope) -> Option<Envelope> {
        self.pending.lock().insert(envelope.sequence, envelope)
    }

    /// Remove and return the envelope acknowledged by `sequence`.
    ///
    /// `None` for duplicate or late acks.
    pub fn acknowledge(&self, sequence: u32) -> Option<Envelope> {
        self.pending.lock().remove(&sequence)
    }

    /// Restart the resend timer for `sequence` once its first copy is on
    /// the wire. Retransmissions are already stamped by [`Self::sweep`].
    pub fn mark_sent(&self, sequence: u32, now: Instant) {
        if let Some(envelope) = self.pending.lock().get_mut(&sequence) {
            if envelope.retries == 0 {
                envelope.sent_at = now;
            }
        }
    }

    /// Find envelopes due for retransmission and evict exhausted ones.
    ///
    /// An envelope unacknowledged for longer than `resend_interval` is
    /// resent with an incremented retry count and the current `session_id`.
    /// Once it has been resent `max_retries` times, the next due sweep evicts
    /// it instead.
    pub fn sweep(
        &self,
        now: Instant,
        resend_interval: Duration,
        max_retries: u32,
        session_id: u32,
    ) -> Sweep {
        let mut sweep = Sweep::default();
        self.pending.lock().retain(|_, envelope| {
            if !envelope.is_due(now, resend_interval) {
                return true;
            }
            if envelope.retries >= max_retries {
                sweep.failed.push(envelope.clone());
                return false;
            }
            envelope.mark_resent(now, session_id);
            sweep.resend.push(envelope.clone());
            true
        });
        sweep
    }

    /// Check whether `sequence` is awaiting acknowledgment.
    pub fn contains(&self, sequence: u32) -> bool {
        self.pending.lock().contains_key(&sequence)
    }

    /// Retry count for `sequence`, if tracked.
    pub fn retries(&self, sequence: u32) -> Option<u32> {
        self.pending.lock().get(&sequence).map(|envelope| envelope.retries)
    }

    /// Number of envelopes in flight.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Drop every tracked envelope, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        count
    }
}

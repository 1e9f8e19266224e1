//! Bounded outbound queue and the single-slot drain signal.
//!
//! The queue decouples `write` callers from network timing: enqueueing never
//! blocks, and a full queue rejects the envelope instead. It is shared by every
//! connection generation, so envelopes queued while disconnected are sent in
//! order once a new connection is up.
//!
//! `pending` counts envelopes that were accepted but have not yet left the
//! sink, either by being sent or by being lost to a failed send. A drain
//! completes when it reaches zero.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::sink::SinkError;

use super::envelope::Envelope;

pub(crate) struct OutboundQueue {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    pending: AtomicUsize,
    drain: DrainSlot,
}

impl OutboundQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            pending: AtomicUsize::new(0),
            drain: DrainSlot::default(),
        }
    }

    /// Queue `envelope` without blocking, handing it back when the queue is full.
    pub(crate) fn enqueue(&self, envelope: Envelope) -> Result<(), Envelope> {
        // Count before sending so a fast consumer never settles below zero.
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(envelope) | TrySendError::Disconnected(envelope)) => {
                self.settle(1);
                Err(envelope)
            }
        }
    }

    /// Receiver used by the write pump's `select!`.
    pub(crate) fn receiver(&self) -> &Receiver<Envelope> {
        &self.rx
    }

    pub(crate) fn try_dequeue(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Envelopes waiting in the channel.
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    /// Envelopes accepted but not yet settled.
    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Record that `count` dequeued envelopes have left the sink.
    pub(crate) fn settle(&self, count: usize) {
        if count == 0 {
            return;
        }
        let previous = self.pending.fetch_sub(count, Ordering::AcqRel);
        if previous == count {
            self.drain.resolve();
        }
    }

    /// Register a drain request, resolving it at once if nothing is pending.
    pub(crate) fn begin_drain(&self) -> Result<DrainWaiter, SinkError> {
        let waiter = self.drain.register()?;
        if self.pending() == 0 {
            self.drain.resolve();
        }
        Ok(waiter)
    }

    /// Withdraw a drain request whose waiter gave up.
    pub(crate) fn abandon_drain(&self) {
        self.drain.clear();
    }

    /// Drop everything still queued, returning how many envelopes were lost.
    pub(crate) fn discard_remaining(&self) -> usize {
        let discarded = self.rx.try_iter().count();
        self.settle(discarded);
        discarded
    }
}

/// Single-slot completion for "queue drained".
///
/// At most one request may be outstanding; a second concurrent request is
/// rejected rather than sharing the signal.
#[derive(Default)]
struct DrainSlot {
    slot: Mutex<Option<Sender<()>>>,
}

impl DrainSlot {
    fn register(&self) -> Result<DrainWaiter, SinkError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(SinkError::DrainInProgress);
        }
        let (tx, rx) = bounded(1);
        *slot = Some(tx);
        Ok(DrainWaiter { rx })
    }

    fn resolve(&self) {
        if let Some(tx) = self.slot.lock().take() {
            let _ = tx.send(());
        }
    }

    fn clear(&self) {
        self.slot.lock().take();
    }
}

/// Receiving half of a registered drain request.
pub(crate) struct DrainWaiter {
    rx: Receiver<()>,
}

impl DrainWaiter {
    /// Block until the drain completes. Returns `false` if `timeout` elapsed
    /// first; `None` waits indefinitely.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => self.rx.try_recv().is_ok(),
            },
            None => self.rx.recv().is_ok(),
        }
    }
}

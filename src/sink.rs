//! Byte-sink abstraction shared by every output target.
//!
//! The logger formats each record once and hands the resulting bytes to every
//! attached sink. Sinks never block the caller on I/O: implementations either
//! perform a cheap buffered write or enqueue the bytes for a worker thread.

use std::{any::Any, io, sync::Arc};

use thiserror::Error;

/// Errors reported by sink operations.
///
/// None of these are fatal to the logging core; at worst the affected record
/// is dropped.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The bounded queue had no room. `len` is the full size of the rejected
    /// write so callers can still report it as consumed.
    #[error("envelope buffer is full ({len} bytes dropped)")]
    QueueFull { len: usize },
    /// The sink was closed before the write was attempted.
    #[error("sink is closed")]
    Closed,
    /// `close` was called on a sink that is already closed.
    #[error("sink is already closed")]
    AlreadyClosed,
    /// Another caller is already waiting for the queue to drain.
    #[error("a drain request is already outstanding")]
    DrainInProgress,
    /// The queue did not drain before the configured deadline.
    #[error("timed out waiting for queued output to drain")]
    DrainTimeout,
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Trait implemented by all sinks.
///
/// Methods take `&self` so a single sink can be shared between loggers and
/// threads behind an `Arc`.
pub trait TetherSinkTrait: Send + Sync {
    /// Write `buf` to the sink, returning the number of bytes consumed.
    fn write(&self, buf: &[u8]) -> Result<usize, SinkError>;

    /// Block until previously written output has reached its destination.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Flush outstanding output and release the sink's resources.
    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Produce an independent instance sharing only static configuration.
    ///
    /// Sinks that must be shared as-is return `None`.
    fn duplicate(&self) -> Option<Arc<dyn TetherSinkTrait>> {
        None
    }

    /// Return `self` as `Any` for downcasting in tests and registries.
    fn as_any(&self) -> &dyn Any;
}

//! Public sink type exported by the crate.

use std::{
    any::Any,
    fmt, io,
    sync::Arc,
    thread::JoinHandle,
    time::Duration,
};

use delegate::delegate;
use log::warn;
use parking_lot::Mutex;

use crate::sink::{SinkError, TetherSinkTrait};

use super::{
    config::WebSocketSinkConfig,
    envelope::Envelope,
    lifecycle::{ConnectHandler, Phase, SinkShared, spawn_supervisor},
};

/// Sink streaming log output to a WebSocket peer.
///
/// Writes are queued and sent by background threads, so a slow or missing
/// peer never blocks the caller. The connection is re-established
/// automatically after any failure until [`close`](Self::close) is called.
pub struct WebSocketSink {
    shared: Arc<SinkShared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketSink {
    /// Sink with default settings targeting `url`.
    pub fn new(url: impl Into<String>) -> io::Result<Self> {
        Self::with_config(WebSocketSinkConfig::new(url))
    }

    /// Start a sink from a configuration. Dialing begins immediately.
    pub fn with_config(config: WebSocketSinkConfig) -> io::Result<Self> {
        Self::start(config, None)
    }

    pub(crate) fn start(
        config: WebSocketSinkConfig,
        on_connect: Option<ConnectHandler>,
    ) -> io::Result<Self> {
        let shared = Arc::new(SinkShared::new(config, on_connect));
        let supervisor = spawn_supervisor(Arc::clone(&shared))?;
        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    /// Queue `buf` for delivery.
    ///
    /// Returns `Ok(buf.len())` both when the bytes were queued and when they
    /// were discarded because no peer is listening. A full queue yields
    /// [`SinkError::QueueFull`] carrying the rejected length.
    pub fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        let Some(peer_present) = self.shared.write_gate() else {
            return Err(SinkError::Closed);
        };
        if self.shared.config.gate_on_peer_presence && !peer_present {
            return Ok(buf.len());
        }
        match self.shared.queue.enqueue(Envelope::text(buf)) {
            Ok(()) => Ok(buf.len()),
            Err(_) => {
                let warner = &self.shared.overflow_warner;
                warner.record_drop();
                warner.warn_if_due(|count| {
                    warn!(
                        target: "tetherlog::websocket",
                        "websocket sink queue full; dropped {count} writes"
                    );
                });
                Err(SinkError::QueueFull { len: buf.len() })
            }
        }
    }

    /// Block until everything queued so far has been sent, bounded by the
    /// write timeout.
    pub fn flush(&self) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let waiter = self.shared.queue.begin_drain()?;
        if waiter.wait(Some(self.shared.config.write_timeout)) {
            Ok(())
        } else {
            self.shared.queue.abandon_drain();
            Err(SinkError::DrainTimeout)
        }
    }

    /// Drain the queue, say goodbye to the peer and stop all threads.
    ///
    /// The drain is bounded by `close_timeout`, or by `write_timeout` when
    /// none is configured, whether or not a connection is up. Envelopes still
    /// queued at the deadline are discarded and [`SinkError::DrainTimeout`]
    /// is returned after the sink has closed.
    pub fn close(&self) -> Result<(), SinkError> {
        self.close_within(self.drain_bound())
    }

    fn drain_bound(&self) -> Duration {
        let config = &self.shared.config;
        config.close_timeout.unwrap_or(config.write_timeout)
    }

    fn close_within(&self, timeout: Duration) -> Result<(), SinkError> {
        if !self.shared.begin_close() {
            return Err(SinkError::AlreadyClosed);
        }
        let waiter = match self.shared.queue.begin_drain() {
            Ok(waiter) => waiter,
            Err(err) => {
                self.shared.cancel_close();
                return Err(err);
            }
        };
        let drained = waiter.wait(Some(timeout));
        if !drained {
            self.shared.queue.abandon_drain();
        }

        if let Some(connection) = self.shared.enter_closed() {
            if let Err(err) = connection.send_close(self.shared.config.write_timeout) {
                log::debug!(target: "tetherlog::websocket", "close frame not sent: {err}");
            }
            connection.shutdown();
        }
        if let Some(handle) = self.supervisor.lock().take()
            && handle.join().is_err()
        {
            warn!(target: "tetherlog::websocket", "websocket supervisor thread panicked");
        }

        let discarded = self.shared.queue.discard_remaining();
        let loss = &self.shared.loss_warner;
        loss.record_drops(discarded as u64);
        loss.flush(|count| {
            warn!(
                target: "tetherlog::websocket",
                "websocket sink closed with {count} envelopes undelivered"
            );
        });
        self.shared.overflow_warner.flush(|count| {
            warn!(
                target: "tetherlog::websocket",
                "websocket sink dropped {count} writes on a full queue"
            );
        });

        if drained {
            Ok(())
        } else {
            Err(SinkError::DrainTimeout)
        }
    }

    /// Independent sink with the same configuration and connect handler.
    pub fn duplicate(&self) -> io::Result<Self> {
        Self::start(self.shared.config.clone(), self.shared.on_connect())
    }

    /// Run `handler` every time a connection is established.
    pub fn set_connect_handler(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.shared.set_on_connect(Some(Arc::new(handler)));
    }

    pub fn clear_connect_handler(&self) {
        self.shared.set_on_connect(None);
    }

    delegate! {
        to self.shared {
            /// Block until a connection is up. Returns `false` on timeout or close.
            pub fn wait_connected(&self, timeout: Duration) -> bool;
            pub fn phase(&self) -> Phase;
            /// Whether the peer last reported an attached consumer.
            pub fn peer_present(&self) -> bool;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == Phase::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.phase() == Phase::Closed
    }

    pub fn config(&self) -> &WebSocketSinkConfig {
        &self.shared.config
    }

    /// Envelopes accepted but not yet sent.
    pub fn pending(&self) -> usize {
        self.shared.queue.pending()
    }
}

impl TetherSinkTrait for WebSocketSink {
    fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        WebSocketSink::write(self, buf)
    }

    fn flush(&self) -> Result<(), SinkError> {
        WebSocketSink::flush(self)
    }

    fn close(&self) -> Result<(), SinkError> {
        WebSocketSink::close(self)
    }

    fn duplicate(&self) -> Option<Arc<dyn TetherSinkTrait>> {
        match WebSocketSink::duplicate(self) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(err) => {
                warn!(target: "tetherlog::websocket", "failed to duplicate websocket sink: {err}");
                None
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl io::Write for &WebSocketSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match WebSocketSink::write(*self, buf) {
            Ok(n) => Ok(n),
            Err(SinkError::Io(err)) => Err(err),
            Err(err @ SinkError::QueueFull { .. }) => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, err))
            }
            Err(err) => Err(io::Error::new(io::ErrorKind::BrokenPipe, err)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match WebSocketSink::flush(*self) {
            Ok(()) | Err(SinkError::Closed) => Ok(()),
            Err(err) => Err(io::Error::new(io::ErrorKind::TimedOut, err)),
        }
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let _ = self.close();
    }
}

impl fmt::Debug for WebSocketSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSink")
            .field("url", &self.shared.config.url)
            .field("phase", &self.phase())
            .field("pending", &self.pending())
            .finish()
    }
}

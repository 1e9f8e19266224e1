//! Connection lifecycle: shared sink state and the supervisor thread.
//!
//! All mutable connection state lives in one [`SinkState`] behind a single
//! lock. Each connection attempt runs under a *generation*; its pumps carry a
//! [`ShutdownToken`] for that generation. Replacing the generation drops the
//! previous shutdown sender, which cancels every holder of the old token at
//! once.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select};
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::rate_limited_warner::RateLimitedWarner;

use super::{
    backoff::BackoffState,
    config::WebSocketSinkConfig,
    liveness::Liveness,
    pumps::{self, PumpFailure},
    queue::OutboundQueue,
    transport::{self, Connection},
};

/// Callback run each time a connection is established.
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Observable connection phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Closed,
}

/// Cancellation handle tied to one connection generation.
#[derive(Clone)]
pub(crate) struct ShutdownToken {
    generation: u64,
    signal: Receiver<()>,
}

impl ShutdownToken {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Receiver that disconnects when this generation is cancelled.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `delay` unless cancelled first. Returns `true` if cancelled.
    fn sleep(&self, delay: Duration) -> bool {
        match self.signal.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

struct SinkState {
    phase: Phase,
    generation: u64,
    peer_present: bool,
    connection: Option<Arc<Connection>>,
    shutdown: Option<Sender<()>>,
    signal: Receiver<()>,
    closing: bool,
}

impl SinkState {
    fn new() -> Self {
        let (shutdown, signal) = bounded(0);
        Self {
            phase: Phase::Disconnected,
            generation: 0,
            peer_present: false,
            connection: None,
            shutdown: Some(shutdown),
            signal,
            closing: false,
        }
    }

    fn token(&self) -> ShutdownToken {
        ShutdownToken {
            generation: self.generation,
            signal: self.signal.clone(),
        }
    }

    /// Cancel the current generation and move on to the next one.
    fn advance_generation(&mut self, install_signal: bool) -> Option<Arc<Connection>> {
        self.shutdown = None;
        self.generation += 1;
        if install_signal {
            let (shutdown, signal) = bounded(0);
            self.shutdown = Some(shutdown);
            self.signal = signal;
        }
        self.connection.take()
    }
}

/// State shared between the sink facade, the supervisor and the pumps.
pub(crate) struct SinkShared {
    pub(crate) config: WebSocketSinkConfig,
    pub(crate) queue: OutboundQueue,
    state: Mutex<SinkState>,
    connected: Condvar,
    on_connect: RwLock<Option<ConnectHandler>>,
    /// Writes refused because the queue was full.
    pub(crate) overflow_warner: RateLimitedWarner,
    /// Envelopes lost to failed sends or discarded at close.
    pub(crate) loss_warner: RateLimitedWarner,
    dial_warner: RateLimitedWarner,
}

impl SinkShared {
    pub(crate) fn new(config: WebSocketSinkConfig, on_connect: Option<ConnectHandler>) -> Self {
        Self {
            queue: OutboundQueue::new(config.queue_capacity),
            state: Mutex::new(SinkState::new()),
            connected: Condvar::new(),
            on_connect: RwLock::new(on_connect),
            overflow_warner: RateLimitedWarner::new(config.warn_interval),
            loss_warner: RateLimitedWarner::new(config.warn_interval),
            dial_warner: RateLimitedWarner::new(config.warn_interval),
            config,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub(crate) fn peer_present(&self) -> bool {
        self.state.lock().peer_present
    }

    pub(crate) fn set_peer_present(&self, present: bool) {
        let mut state = self.state.lock();
        if state.peer_present != present {
            debug!(
                target: "tetherlog::websocket",
                "peer presence changed to {present} for {}", self.config.url
            );
        }
        state.peer_present = present;
    }

    /// Snapshot used by `write`: `None` once closed, otherwise the presence flag.
    pub(crate) fn write_gate(&self) -> Option<bool> {
        let state = self.state.lock();
        (state.phase != Phase::Closed).then_some(state.peer_present)
    }

    pub(crate) fn on_connect(&self) -> Option<ConnectHandler> {
        self.on_connect.read().clone()
    }

    pub(crate) fn set_on_connect(&self, handler: Option<ConnectHandler>) {
        *self.on_connect.write() = handler;
    }

    fn current_token(&self) -> Option<ShutdownToken> {
        let state = self.state.lock();
        (state.phase != Phase::Closed).then(|| state.token())
    }

    fn mark_connecting(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Closed || state.generation != generation {
            return false;
        }
        state.phase = Phase::Connecting;
        true
    }

    /// Tear down `generation` and prepare the next one.
    ///
    /// Returns `false` once the sink is closed, telling the supervisor to
    /// exit.
    fn restart(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Closed {
            return false;
        }
        if state.generation != generation {
            return true;
        }
        state.phase = Phase::Failed;
        if let Some(connection) = state.advance_generation(true) {
            connection.shutdown();
        }
        state.phase = Phase::Disconnected;
        true
    }

    /// Mark the sink as closing. Fails if it is closed or already closing.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Closed || state.closing {
            return false;
        }
        state.closing = true;
        true
    }

    pub(crate) fn cancel_close(&self) {
        self.state.lock().closing = false;
    }

    /// Enter the terminal phase, cancelling the current generation.
    ///
    /// Returns the live connection, if any, so the caller can say goodbye on
    /// it before shutting it down.
    pub(crate) fn enter_closed(&self) -> Option<Arc<Connection>> {
        let mut state = self.state.lock();
        state.phase = Phase::Closed;
        let connection = state.advance_generation(false);
        self.connected.notify_all();
        connection
    }

    /// Block until connected, closed, or `timeout` elapses.
    pub(crate) fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !matches!(state.phase, Phase::Connected | Phase::Closed) {
            if self.connected.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.phase == Phase::Connected
    }

    fn record_dial_failure(&self, err: &transport::DialError) {
        self.dial_warner.record_drop();
        self.dial_warner.warn_if_due(|count| {
            warn!(
                target: "tetherlog::websocket",
                "websocket sink could not connect to {}: {err} ({count} failed attempts)",
                self.config.url
            );
        });
    }
}

/// Pumps running against one established connection.
struct Session {
    token: ShutdownToken,
    failures: Receiver<PumpFailure>,
    threads: Vec<JoinHandle<()>>,
}

impl Session {
    /// Publish `connection` as current and start its pumps.
    ///
    /// Returns `None` if the generation was superseded or the sink closed
    /// while the dial was in flight.
    fn start(
        shared: &Arc<SinkShared>,
        connection: Arc<Connection>,
        token: ShutdownToken,
    ) -> Option<Self> {
        {
            let mut state = shared.state.lock();
            if state.phase == Phase::Closed || state.generation != token.generation {
                return None;
            }
            state.phase = Phase::Connected;
            state.connection = Some(Arc::clone(&connection));
        }

        let (failure_tx, failures) = bounded(2);
        let liveness = Liveness::new(
            shared.config.pong_timeout,
            shared.config.heartbeat_period,
            Instant::now(),
        );
        let mut threads = Vec::with_capacity(2);
        let spawned = pumps::spawn_writer(
            Arc::clone(shared),
            Arc::clone(&connection),
            token.clone(),
            liveness.heartbeat_ticker(),
            failure_tx.clone(),
        )
        .and_then(|writer| {
            threads.push(writer);
            pumps::spawn_reader(
                Arc::clone(shared),
                Arc::clone(&connection),
                token.clone(),
                liveness,
                failure_tx,
            )
        });
        let session = Self {
            token,
            failures,
            threads,
        };
        match spawned {
            Ok(reader) => {
                let mut session = session;
                session.threads.push(reader);
                info!(
                    target: "tetherlog::websocket",
                    "websocket sink connected to {}", connection.peer()
                );
                shared.connected.notify_all();
                if let Some(handler) = shared.on_connect() {
                    handler();
                }
                Some(session)
            }
            Err(err) => {
                warn!(target: "tetherlog::websocket", "failed to start websocket pumps: {err}");
                shared.restart(session.token.generation);
                session.join();
                None
            }
        }
    }

    /// Wait for the first failure of this generation, or `None` on cancellation.
    fn wait(&self) -> Option<PumpFailure> {
        loop {
            select! {
                recv(self.failures) -> failure => match failure {
                    Ok(failure) if failure.generation == self.token.generation => {
                        return Some(failure);
                    }
                    Ok(_) => continue,
                    Err(_) => return None,
                },
                recv(self.token.signal()) -> _ => return None,
            }
        }
    }

    fn join(self) {
        for handle in self.threads {
            let _ = handle.join();
        }
    }
}

/// Start the supervisor thread for `shared`.
pub(crate) fn spawn_supervisor(shared: Arc<SinkShared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tetherlog-ws-supervisor".into())
        .spawn(move || supervise(&shared))
}

fn supervise(shared: &Arc<SinkShared>) {
    let mut backoff = BackoffState::new(shared.config.backoff_policy());
    let poll_interval = Liveness::new(
        shared.config.pong_timeout,
        shared.config.heartbeat_period,
        Instant::now(),
    )
    .poll_interval();
    let mut retry = false;

    while let Some(token) = shared.current_token() {
        if retry && token.sleep(backoff.next_sleep()) {
            break;
        }
        retry = true;
        if !shared.mark_connecting(token.generation) {
            break;
        }

        let connection = match transport::dial(&shared.config, poll_interval) {
            Ok(connection) => Arc::new(connection),
            Err(err) => {
                shared.record_dial_failure(&err);
                if !shared.restart(token.generation) {
                    break;
                }
                continue;
            }
        };

        let generation = token.generation;
        let Some(session) = Session::start(shared, Arc::clone(&connection), token) else {
            connection.shutdown();
            continue;
        };
        backoff.reset();

        if let Some(failure) = session.wait() {
            warn!(
                target: "tetherlog::websocket",
                "websocket connection to {} failed: {}; reconnecting",
                connection.peer(),
                failure.reason
            );
        }
        let open = shared.restart(generation);
        session.join();
        if !open {
            break;
        }
    }
    debug!(target: "tetherlog::websocket", "websocket supervisor for {} exiting", shared.config.url);
}

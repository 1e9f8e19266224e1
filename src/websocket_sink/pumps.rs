//! Per-connection read and write threads.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, warn};
use parking_lot::MutexGuard;
use thiserror::Error;
use tungstenite::Message;

use super::{
    control::decode_control,
    envelope::Envelope,
    lifecycle::{ShutdownToken, SinkShared},
    liveness::Liveness,
    transport::Connection,
};

/// Envelopes written per lock acquisition, beyond the first.
const MAX_BATCH: usize = 32;

/// Why a pump gave up on its connection.
#[derive(Debug, Error)]
pub(crate) enum FailureReason {
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),
    #[error("heartbeat failed: {0}")]
    Heartbeat(#[source] tungstenite::Error),
    #[error("read failed: {0}")]
    Read(#[source] tungstenite::Error),
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("no frames received for {0:?}")]
    Silent(Duration),
}

/// Failure report sent to the supervisor.
#[derive(Debug)]
pub(crate) struct PumpFailure {
    pub(crate) generation: u64,
    pub(crate) reason: FailureReason,
}

fn report(failures: &Sender<PumpFailure>, token: &ShutdownToken, reason: FailureReason) {
    if token.is_cancelled() {
        debug!(target: "tetherlog::websocket", "pump exiting after cancellation: {reason}");
        return;
    }
    let _ = failures.try_send(PumpFailure {
        generation: token.generation(),
        reason,
    });
}

pub(crate) fn spawn_writer(
    shared: Arc<SinkShared>,
    connection: Arc<Connection>,
    token: ShutdownToken,
    heartbeat: Receiver<Instant>,
    failures: Sender<PumpFailure>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tetherlog-ws-writer".into())
        .spawn(move || write_loop(&shared, &connection, &token, &heartbeat, &failures))
}

pub(crate) fn spawn_reader(
    shared: Arc<SinkShared>,
    connection: Arc<Connection>,
    token: ShutdownToken,
    liveness: Liveness,
    failures: Sender<PumpFailure>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tetherlog-ws-reader".into())
        .spawn(move || read_loop(&shared, &connection, &token, liveness, &failures))
}

fn write_loop(
    shared: &SinkShared,
    connection: &Connection,
    token: &ShutdownToken,
    heartbeat: &Receiver<Instant>,
    failures: &Sender<PumpFailure>,
) {
    loop {
        select! {
            recv(token.signal()) -> _ => return,
            recv(heartbeat) -> _ => {
                if let Err(err) = connection.lock().send(Envelope::ping().into_message()) {
                    report(failures, token, FailureReason::Heartbeat(err));
                    return;
                }
            }
            recv(shared.queue.receiver()) -> envelope => {
                let Ok(first) = envelope else { return };
                let (taken, result) = write_batch(shared, connection, first);
                shared.queue.settle(taken);
                if let Err(err) = result {
                    shared.loss_warner.record_drops(taken as u64);
                    shared.loss_warner.warn_if_due(|count| {
                        warn!(
                            target: "tetherlog::websocket",
                            "websocket sink lost {count} envelopes to failed sends"
                        );
                    });
                    report(failures, token, FailureReason::Send(err));
                    return;
                }
            }
        }
    }
}

/// Write `first` and any envelopes already queued behind it, then flush.
///
/// Returns how many envelopes were taken off the queue, whether or not they
/// reached the socket.
fn write_batch(
    shared: &SinkShared,
    connection: &Connection,
    first: Envelope,
) -> (usize, Result<(), tungstenite::Error>) {
    let mut socket = connection.lock();
    let mut taken = 1;
    if let Err(err) = socket.write(first.into_message()) {
        return (taken, Err(err));
    }
    while taken <= MAX_BATCH {
        let Some(next) = shared.queue.try_dequeue() else {
            break;
        };
        taken += 1;
        if let Err(err) = socket.write(next.into_message()) {
            return (taken, Err(err));
        }
    }
    (taken, socket.flush())
}

fn read_loop(
    shared: &SinkShared,
    connection: &Connection,
    token: &ShutdownToken,
    mut liveness: Liveness,
    failures: &Sender<PumpFailure>,
) {
    let pong_timeout = shared.config.pong_timeout;
    while !token.is_cancelled() {
        let result = {
            let mut socket = connection.lock();
            let result = socket.read();
            MutexGuard::unlock_fair(socket);
            result
        };
        match result {
            Ok(message) => {
                liveness.renew(Instant::now());
                match message {
                    Message::Text(text) => apply_control(shared, text.as_bytes()),
                    Message::Binary(data) => apply_control(shared, &data),
                    Message::Close(_) => {
                        report(failures, token, FailureReason::PeerClosed);
                        return;
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                if liveness.is_expired(Instant::now()) {
                    report(failures, token, FailureReason::Silent(pong_timeout));
                    return;
                }
            }
            Err(err) => {
                report(failures, token, FailureReason::Read(err));
                return;
            }
        }
    }
}

fn apply_control(shared: &SinkShared, data: &[u8]) {
    match decode_control(data) {
        Ok(Some(signal)) => shared.set_peer_present(signal.peer_present()),
        Ok(None) => {}
        Err(err) => debug!(
            target: "tetherlog::websocket",
            "ignoring malformed control frame: {err}"
        ),
    }
}

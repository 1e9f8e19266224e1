//! In-process WebSocket peer used to exercise the network sink.
//!
//! The peer accepts one connection at a time, reports everything it sees on
//! an event channel, and can be told to push frames, freeze, or drop the
//! connection. Stopping and rebinding on the same address simulates a peer
//! restart.

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tungstenite::{
    Message, WebSocket,
    handshake::server::{ErrorResponse, Request, Response},
};

const POLL: Duration = Duration::from_millis(5);

/// Something the peer observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerEvent {
    Connected {
        query: Option<String>,
        role_header: Option<String>,
    },
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Close,
    Disconnected,
}

/// Instruction for the current connection.
#[derive(Debug)]
pub enum PeerCommand {
    Send(Message),
    /// Stop reading, so pings go unanswered.
    Freeze,
    /// Tear the connection down without a close handshake.
    Drop,
}

pub struct TestPeer {
    addr: SocketAddr,
    events: Receiver<PeerEvent>,
    commands: Sender<PeerCommand>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestPeer {
    /// Listen on an ephemeral localhost port.
    pub fn start() -> Self {
        Self::bind("127.0.0.1:0".parse().expect("valid address"))
    }

    /// Listen on `addr`, which may be the address of a stopped peer.
    pub fn bind(addr: SocketAddr) -> Self {
        let listener = bind_with_retry(addr);
        listener
            .set_nonblocking(true)
            .expect("non-blocking listener");
        let addr = listener.local_addr().expect("listener address");
        let (event_tx, events) = unbounded();
        let (commands, command_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&listener, &event_tx, &command_rx, &stop))
        };
        Self {
            addr,
            events,
            commands,
            stop,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}/log", self.addr)
    }

    pub fn send(&self, command: PeerCommand) {
        self.commands.send(command).expect("peer thread running");
    }

    pub fn send_text(&self, text: &str) {
        self.send(PeerCommand::Send(Message::Text(text.into())));
    }

    /// Report a consumer as attached.
    pub fn announce_online(&self) {
        self.send_text(r#"{"type":0,"command":100}"#);
    }

    pub fn announce_offline(&self) {
        self.send_text(r#"{"type":0,"command":101}"#);
    }

    /// Next event matching `pred`, skipping others.
    pub fn expect_event(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&PeerEvent) -> bool,
    ) -> PeerEvent {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(_) => panic!("peer event not observed within {timeout:?}"),
            }
        }
    }

    pub fn expect_connected(&self, timeout: Duration) -> PeerEvent {
        self.expect_event(timeout, |event| matches!(event, PeerEvent::Connected { .. }))
    }

    /// Collect `count` text frames, skipping other events.
    pub fn expect_texts(&self, count: usize, timeout: Duration) -> Vec<String> {
        (0..count)
            .map(|_| {
                match self.expect_event(timeout, |event| matches!(event, PeerEvent::Text(_))) {
                    PeerEvent::Text(text) => text,
                    _ => unreachable!(),
                }
            })
            .collect()
    }

    /// Every event received within `window`.
    pub fn drain_events(&self, window: Duration) -> Vec<PeerEvent> {
        let deadline = Instant::now() + window;
        let mut seen = Vec::new();
        while let Ok(event) = self
            .events
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            seen.push(event);
        }
        seen
    }

    /// Stop listening and drop any live connection.
    pub fn stop(mut self) -> SocketAddr {
        self.shutdown();
        self.addr
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().expect("peer thread");
        }
    }
}

impl Drop for TestPeer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_with_retry(addr: SocketAddr) -> TcpListener {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match TcpListener::bind(addr) {
            Ok(listener) => return listener,
            Err(_) if Instant::now() < deadline => thread::sleep(POLL),
            Err(err) => panic!("bind {addr}: {err}"),
        }
    }
}

fn serve(
    listener: &TcpListener,
    events: &Sender<PeerEvent>,
    commands: &Receiver<PeerCommand>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if let Some(socket) = handshake(stream, events) {
                    serve_connection(socket, events, commands, stop);
                    let _ = events.send(PeerEvent::Disconnected);
                }
            }
            Err(_) => thread::sleep(POLL),
        }
    }
}

fn handshake(stream: TcpStream, events: &Sender<PeerEvent>) -> Option<WebSocket<TcpStream>> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    let mut query = None;
    let mut role_header = None;
    let socket = tungstenite::accept_hdr(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            query = request.uri().query().map(str::to_owned);
            role_header = request
                .headers()
                .get("role")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            Ok(response)
        },
    )
    .ok()?;
    socket.get_ref().set_read_timeout(Some(POLL)).ok()?;
    let _ = events.send(PeerEvent::Connected { query, role_header });
    Some(socket)
}

fn serve_connection(
    mut socket: WebSocket<TcpStream>,
    events: &Sender<PeerEvent>,
    commands: &Receiver<PeerCommand>,
    stop: &AtomicBool,
) {
    let mut frozen = false;
    while !stop.load(Ordering::SeqCst) {
        while let Ok(command) = commands.try_recv() {
            match command {
                PeerCommand::Send(message) => {
                    if socket.send(message).is_err() {
                        return;
                    }
                }
                PeerCommand::Freeze => frozen = true,
                PeerCommand::Drop => {
                    let _ = socket.get_ref().shutdown(std::net::Shutdown::Both);
                    return;
                }
            }
        }
        if frozen {
            thread::sleep(POLL);
            continue;
        }
        match socket.read() {
            Ok(Message::Text(text)) => {
                let _ = events.send(PeerEvent::Text(text));
            }
            Ok(Message::Binary(data)) => {
                let _ = events.send(PeerEvent::Binary(data));
            }
            Ok(Message::Ping(_)) => {
                let _ = events.send(PeerEvent::Ping);
            }
            Ok(Message::Close(_)) => {
                let _ = events.send(PeerEvent::Close);
            }
            Ok(Message::Pong(_) | Message::Frame(_)) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(_) => return,
        }
    }
    let _ = socket.get_ref().shutdown(std::net::Shutdown::Both);
}

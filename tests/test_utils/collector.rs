//! Minimal WebSocket server that records every text frame it receives.

use std::{
    io,
    net::{SocketAddr, TcpListener},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, unbounded};
use tungstenite::Message;

/// Accepts connections one after another and forwards text frames.
pub struct Collector {
    addr: SocketAddr,
    frames: Receiver<String>,
}

impl Collector {
    /// Listen on an ephemeral localhost port.
    ///
    /// The accept thread is detached and ends with the test process.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind collector");
        let addr = listener.local_addr().expect("collector address");
        let (tx, frames) = unbounded();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let Ok(mut socket) = tungstenite::accept(stream) else {
                    continue;
                };
                loop {
                    match socket.read() {
                        Ok(Message::Text(text)) => {
                            if tx.send(text.to_string()).is_err() {
                                return;
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(err))
                            if err.kind() == io::ErrorKind::WouldBlock => {}
                        Err(_) => break,
                    }
                }
            }
        });
        Self { addr, frames }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/logs", self.addr)
    }

    /// Wait for the next text frame.
    pub fn next_frame(&self, timeout: Duration) -> Option<String> {
        self.frames.recv_timeout(timeout).ok()
    }

    /// Collect `count` frames, failing the test if they do not arrive.
    pub fn frames(&self, count: usize, timeout: Duration) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.next_frame(timeout)
                    .unwrap_or_else(|| panic!("frame {i} not received within {timeout:?}"))
            })
            .collect()
    }
}

//! Outbound units handed from the sink facade to the write pump.

use tungstenite::Message;

/// What an [`Envelope`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Log output.
    Text,
    /// Heartbeat.
    Ping,
    /// Orderly end of the session.
    Close,
}

/// Immutable tagged payload.
#[derive(Debug, PartialEq, Eq)]
pub struct Envelope {
    kind: EnvelopeKind,
    payload: Vec<u8>,
}

impl Envelope {
    /// Copy `bytes` into a text envelope.
    pub fn text(bytes: &[u8]) -> Self {
        Self {
            kind: EnvelopeKind::Text,
            payload: bytes.to_vec(),
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: EnvelopeKind::Ping,
            payload: Vec::new(),
        }
    }

    pub fn close() -> Self {
        Self {
            kind: EnvelopeKind::Close,
            payload: Vec::new(),
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Convert into the frame sent on the wire.
    ///
    /// Text payloads that are not valid UTF-8 are sent as binary frames so the
    /// bytes reach the peer unchanged.
    pub fn into_message(self) -> Message {
        match self.kind {
            EnvelopeKind::Text => match String::from_utf8(self.payload) {
                Ok(text) => Message::Text(text),
                Err(err) => Message::Binary(err.into_bytes()),
            },
            EnvelopeKind::Ping => Message::Ping(self.payload),
            EnvelopeKind::Close => Message::Close(None),
        }
    }
}

//! Decoder for control frames sent by the peer.
//!
//! Frames are small JSON records `{"type": 0|1, "command": n, "data": any}`.
//! Only command frames carrying a presence code change sink state; every other
//! well-formed frame is accepted and ignored.

use serde::Deserialize;
use serde_json::Value;

/// `type` value marking a command frame.
pub const FRAME_TYPE_COMMAND: i64 = 0;
/// `type` value marking a data frame.
pub const FRAME_TYPE_DATA: i64 = 1;
/// A consumer is attached on the peer side.
pub const COMMAND_PEER_ONLINE: i64 = 100;
/// The last consumer left.
pub const COMMAND_PEER_OFFLINE: i64 = 101;

#[derive(Debug, Deserialize)]
struct ControlFrame {
    #[serde(rename = "type")]
    frame_type: i64,
    #[serde(default)]
    command: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    data: Option<Value>,
}

/// Gating change requested by the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    PeerOnline,
    PeerOffline,
}

impl ControlSignal {
    /// Value of the presence flag after applying this signal.
    pub fn peer_present(self) -> bool {
        matches!(self, Self::PeerOnline)
    }
}

/// Decode an inbound frame into a presence signal.
///
/// Returns `Ok(None)` for frames that are valid but carry nothing this sink
/// acts on.
pub fn decode_control(data: &[u8]) -> Result<Option<ControlSignal>, serde_json::Error> {
    let frame: ControlFrame = serde_json::from_slice(data)?;
    if frame.frame_type != FRAME_TYPE_COMMAND {
        return Ok(None);
    }
    Ok(match frame.command {
        Some(COMMAND_PEER_ONLINE) => Some(ControlSignal::PeerOnline),
        Some(COMMAND_PEER_OFFLINE) => Some(ControlSignal::PeerOffline),
        _ => None,
    })
}

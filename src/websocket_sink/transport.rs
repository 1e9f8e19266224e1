//! Dialing and the shared connection handle used by both pumps.

use std::{
    io,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsConnector;
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tungstenite::{
    HandshakeError, WebSocket,
    client::IntoClientRequest,
    http::{HeaderValue, Uri},
    protocol::WebSocketConfig,
    stream::MaybeTlsStream,
};

use super::{config::WebSocketSinkConfig, envelope::Envelope};

pub(crate) type WsStream = WebSocket<MaybeTlsStream<TcpStream>>;

/// Reasons a dial attempt can fail.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unable to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
    #[error("websocket handshake timed out")]
    HandshakeTimeout,
    #[error("socket configuration failed: {0}")]
    Io(#[from] io::Error),
}

/// An established WebSocket connection shared by the read and write pumps.
///
/// `socket` serialises frame I/O. `control` is a second handle on the same
/// TCP socket used to shut it down without taking the frame lock, which is
/// how a blocked pump is released.
pub(crate) struct Connection {
    socket: Mutex<WsStream>,
    control: TcpStream,
    peer: String,
}

impl Connection {
    pub(crate) fn lock(&self) -> MutexGuard<'_, WsStream> {
        self.socket.lock()
    }

    pub(crate) fn peer(&self) -> &str {
        &self.peer
    }

    /// Send a close frame if the frame lock can be taken within `timeout`.
    pub(crate) fn send_close(&self, timeout: Duration) -> Result<(), tungstenite::Error> {
        let Some(mut socket) = self.socket.try_lock_for(timeout) else {
            return Err(tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection busy",
            )));
        };
        socket.send(Envelope::close().into_message())
    }

    /// Tear down the socket, waking any pump blocked on it.
    pub(crate) fn shutdown(&self) {
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

/// Endpoint URL with the role appended as a query parameter.
pub(crate) fn dial_url(url: &str, role: &str) -> String {
    if role.is_empty() {
        return url.to_owned();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}role={role}")
}

fn invalid_url(url: &str, reason: impl Into<String>) -> DialError {
    DialError::InvalidUrl {
        url: url.to_owned(),
        reason: reason.into(),
    }
}

fn target_of(uri: &Uri, url: &str) -> Result<(String, u16, bool), DialError> {
    let secure = match uri.scheme_str() {
        Some("ws") => false,
        Some("wss") => true,
        _ => return Err(invalid_url(url, "scheme must be ws or wss")),
    };
    let host = uri
        .host()
        .ok_or_else(|| invalid_url(url, "missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_owned();
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });
    Ok((host, port, secure))
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, DialError> {
    let target = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| DialError::Connect {
            target: target.clone(),
            source,
        })?
        .collect();
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = err,
        }
    }
    Err(DialError::Connect {
        target,
        source: last_err,
    })
}

/// Open a connection to the configured endpoint.
///
/// The TCP connect and the WebSocket handshake are each bounded by
/// `connect_timeout`. On success the socket carries `write_timeout` for sends
/// and `read_timeout` for the read pump's polling.
pub(crate) fn dial(
    config: &WebSocketSinkConfig,
    read_timeout: Duration,
) -> Result<Connection, DialError> {
    let url = dial_url(config.url.trim(), &config.role);
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|err| invalid_url(&url, err.to_string()))?;
    if !config.role.is_empty() {
        let role = HeaderValue::from_str(&config.role)
            .map_err(|err| invalid_url(&url, err.to_string()))?;
        request.headers_mut().insert("role", role);
    }
    let (host, port, secure) = target_of(request.uri(), &url)?;

    let stream = connect_tcp(&host, port, config.connect_timeout)?;
    let control = stream.try_clone()?;
    control.set_read_timeout(Some(config.connect_timeout))?;
    control.set_write_timeout(Some(config.connect_timeout))?;

    let connector = if secure {
        Some(tungstenite::Connector::NativeTls(TlsConnector::new()?))
    } else {
        None
    };
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_frame_size);
    ws_config.max_frame_size = Some(config.max_frame_size);

    let (socket, _response) =
        tungstenite::client_tls_with_config(request, stream, Some(ws_config), connector)
            .map_err(|err| match err {
                HandshakeError::Interrupted(_) => DialError::HandshakeTimeout,
                HandshakeError::Failure(tungstenite::Error::Io(io))
                    if matches!(
                        io.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    DialError::HandshakeTimeout
                }
                HandshakeError::Failure(err) => DialError::Handshake(err),
            })?;

    control.set_read_timeout(Some(read_timeout))?;
    control.set_write_timeout(Some(config.write_timeout))?;
    Ok(Connection {
        socket: Mutex::new(socket),
        control,
        peer: format!("{host}:{port}"),
    })
}

//! Console sink writing formatted lines to stdout, stderr or any writer.
//!
//! Writes happen on the caller's thread under a mutex so console output
//! interleaves with the rest of the process in call order.

use std::{
    any::Any,
    fmt,
    io::{self, Write},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::sink::{SinkError, TetherSinkTrait};

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

/// Settings accepted by the `console` registry entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub target: ConsoleTarget,
}

enum Destination {
    Stdout,
    Stderr,
    Writer(Box<dyn Write + Send>),
}

/// Sink that writes every line straight to a stream.
///
/// A console sink is shared as-is rather than duplicated: every logger that
/// resolves `console` writes through the same instance.
pub struct ConsoleSink {
    label: &'static str,
    destination: Mutex<Option<Destination>>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::with_destination("stdout", Destination::Stdout)
    }

    pub fn stderr() -> Self {
        Self::with_destination("stderr", Destination::Stderr)
    }

    pub fn from_config(config: ConsoleConfig) -> Self {
        match config.target {
            ConsoleTarget::Stdout => Self::stdout(),
            ConsoleTarget::Stderr => Self::stderr(),
        }
    }

    /// Sink writing to an arbitrary writer.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::with_destination("writer", Destination::Writer(Box::new(writer)))
    }

    fn with_destination(label: &'static str, destination: Destination) -> Self {
        Self {
            label,
            destination: Mutex::new(Some(destination)),
        }
    }

    fn with_writer<T>(
        &self,
        op: impl FnOnce(&mut dyn Write) -> io::Result<T>,
    ) -> Result<T, SinkError> {
        let mut guard = self.destination.lock();
        let result = match guard.as_mut() {
            None => return Err(SinkError::Closed),
            Some(Destination::Stdout) => op(&mut io::stdout().lock()),
            Some(Destination::Stderr) => op(&mut io::stderr().lock()),
            Some(Destination::Writer(writer)) => op(writer.as_mut()),
        };
        result.map_err(SinkError::from)
    }
}

impl TetherSinkTrait for ConsoleSink {
    fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        self.with_writer(|writer| writer.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.with_writer(|writer| writer.flush())
    }

    fn close(&self) -> Result<(), SinkError> {
        let mut guard = self.destination.lock();
        let Some(mut destination) = guard.take() else {
            return Err(SinkError::AlreadyClosed);
        };
        match &mut destination {
            Destination::Stdout => io::stdout().flush()?,
            Destination::Stderr => io::stderr().flush()?,
            Destination::Writer(writer) => writer.flush()?,
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("target", &self.label)
            .field("closed", &self.destination.lock().is_none())
            .finish()
    }
}

//! A sink that accumulates output in memory for test assertions.

use std::{
    any::Any,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;

use crate::sink::{SinkError, TetherSinkTrait};

/// Sink that stores every write for later inspection.
#[derive(Clone, Default)]
pub struct CollectingSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    fail: bool,
}

impl CollectingSink {
    /// Sink whose writes and flushes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.buffer.lock().clone()).expect("sink output is UTF-8")
    }

    /// Output split into lines without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn failure() -> SinkError {
        SinkError::Io(io::Error::other("collecting sink configured to fail"))
    }
}

impl TetherSinkTrait for CollectingSink {
    fn write(&self, buf: &[u8]) -> Result<usize, SinkError> {
        if self.fail {
            return Err(Self::failure());
        }
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&self) -> Result<(), SinkError> {
        if self.fail {
            return Err(Self::failure());
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SinkError::AlreadyClosed);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub mod collector;
pub mod shared_buffer;

pub use collector::Collector;
pub use shared_buffer::SharedBuf;

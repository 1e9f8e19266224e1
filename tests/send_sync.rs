//! Send/Sync guarantees for core types.

use tetherlog::{
    ConsoleSink, LoggerConfig, RollingFileSink, RollingFileSinkBuilder, SinkRegistry,
    TetherLogger, WebSocketSink, WebSocketSinkBuilder,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(WebSocketSinkBuilder: Send, Sync);
    assert_impl_all!(RollingFileSinkBuilder: Send, Sync);
    assert_impl_all!(LoggerConfig: Send, Sync);
    assert_impl_all!(SinkRegistry: Send, Sync);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(TetherLogger: Send, Sync, Clone);
    assert_impl_all!(WebSocketSink: Send, Sync);
    assert_impl_all!(RollingFileSink: Send, Sync);
    assert_impl_all!(ConsoleSink: Send, Sync);
}

//! Network tests for the WebSocket sink against an in-process peer.

use std::{
    net::{SocketAddr, TcpListener},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use rstest::{fixture, rstest};

use crate::{
    sink::{SinkError, TetherSinkTrait},
    test_utils::peer::{PeerCommand, PeerEvent, TestPeer},
};

use super::{Phase, WebSocketSink, WebSocketSinkConfig};

const WAIT: Duration = Duration::from_secs(5);

#[fixture]
fn peer() -> TestPeer {
    TestPeer::start()
}

/// Settings with short timers so failures are noticed quickly.
fn fast_config(url: String) -> WebSocketSinkConfig {
    WebSocketSinkConfig {
        gate_on_peer_presence: false,
        write_timeout: Duration::from_secs(1),
        pong_timeout: Duration::from_secs(2),
        heartbeat_period: Duration::from_secs(1),
        connect_timeout: Duration::from_millis(500),
        retry_base: Duration::from_millis(20),
        retry_cap: Some(Duration::from_millis(200)),
        ..WebSocketSinkConfig::new(url)
    }
}

fn connected_sink(peer: &TestPeer, config: WebSocketSinkConfig) -> WebSocketSink {
    let sink = WebSocketSink::with_config(config).expect("start sink");
    assert!(sink.wait_connected(WAIT), "sink never connected");
    peer.expect_connected(WAIT);
    sink
}

fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr")
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[rstest]
fn delivers_writes_in_order(peer: TestPeer) {
    let sink = connected_sink(&peer, fast_config(peer.url()));
    let lines: Vec<String> = (0..50).map(|i| format!("line {i}\n")).collect();
    for line in &lines {
        assert_eq!(sink.write(line.as_bytes()).expect("write"), line.len());
    }
    assert_eq!(peer.expect_texts(lines.len(), WAIT), lines);
    sink.close().expect("close");
}

#[rstest]
fn announces_role_in_query_and_header(peer: TestPeer) {
    let sink = WebSocketSink::with_config(fast_config(peer.url())).expect("start sink");
    let event = peer.expect_connected(WAIT);
    assert_eq!(
        event,
        PeerEvent::Connected {
            query: Some("role=sender".into()),
            role_header: Some("sender".into()),
        }
    );
    sink.close().expect("close");
}

#[rstest]
fn full_queue_reports_length() {
    let config = WebSocketSinkConfig {
        queue_capacity: 2,
        close_timeout: Some(Duration::from_millis(50)),
        ..fast_config(format!("ws://{}/", unused_addr()))
    };
    let sink = WebSocketSink::with_config(config).expect("start sink");
    assert!(sink.write(b"one").is_ok());
    assert!(sink.write(b"two").is_ok());
    let err = sink.write(b"three!").expect_err("queue is full");
    assert!(matches!(err, SinkError::QueueFull { len: 6 }), "{err}");
    assert!(matches!(sink.close(), Err(SinkError::DrainTimeout)));
}

#[rstest]
fn gating_suppresses_output_until_peer_online(peer: TestPeer) {
    let config = WebSocketSinkConfig {
        gate_on_peer_presence: true,
        ..fast_config(peer.url())
    };
    let sink = connected_sink(&peer, config);

    assert_eq!(sink.write(b"hidden").expect("gated write"), 6);
    assert_eq!(sink.pending(), 0);

    peer.announce_online();
    assert!(wait_for(|| sink.peer_present()));
    sink.write(b"visible").expect("write");
    assert_eq!(peer.expect_texts(1, WAIT), vec!["visible".to_owned()]);

    peer.announce_offline();
    assert!(wait_for(|| !sink.peer_present()));
    sink.write(b"hidden again").expect("gated write");
    sink.close().expect("close");
    let texts: Vec<PeerEvent> = peer
        .drain_events(Duration::from_millis(200))
        .into_iter()
        .filter(|event| matches!(event, PeerEvent::Text(_)))
        .collect();
    assert!(texts.is_empty(), "{texts:?}");
}

#[rstest]
fn malformed_control_frames_are_ignored(peer: TestPeer) {
    let config = WebSocketSinkConfig {
        gate_on_peer_presence: true,
        ..fast_config(peer.url())
    };
    let sink = connected_sink(&peer, config);
    peer.send_text("not json");
    peer.send_text(r#"{"type":1,"data":"cursor"}"#);
    peer.announce_online();
    assert!(wait_for(|| sink.peer_present()));
    assert!(sink.is_connected());
    sink.close().expect("close");
}

#[rstest]
fn reconnects_after_connection_drop(peer: TestPeer) {
    let connects = Arc::new(AtomicUsize::new(0));
    let sink = WebSocketSink::with_config(fast_config(peer.url())).expect("start sink");
    {
        let connects = Arc::clone(&connects);
        sink.set_connect_handler(move || {
            connects.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert!(sink.wait_connected(WAIT));
    peer.expect_connected(WAIT);

    peer.send(PeerCommand::Drop);
    peer.expect_event(WAIT, |event| matches!(event, PeerEvent::Disconnected));
    peer.expect_connected(WAIT);
    assert!(wait_for(|| sink.is_connected()));

    sink.write(b"after reconnect").expect("write");
    assert_eq!(
        peer.expect_texts(1, WAIT),
        vec!["after reconnect".to_owned()]
    );
    assert!(connects.load(Ordering::SeqCst) >= 1);
    sink.close().expect("close");
}

#[rstest]
fn queued_writes_survive_peer_restart(peer: TestPeer) {
    let sink = connected_sink(&peer, fast_config(peer.url()));
    let addr = peer.stop();
    assert!(wait_for(|| !sink.is_connected()));

    for i in 0..5 {
        sink.write(format!("queued {i}").as_bytes()).expect("write");
    }
    let restarted = TestPeer::bind(addr);
    restarted.expect_connected(WAIT);
    let expected: Vec<String> = (0..5).map(|i| format!("queued {i}")).collect();
    assert_eq!(restarted.expect_texts(5, WAIT), expected);
    sink.close().expect("close");
}

#[rstest]
fn close_drains_pending_then_sends_nothing_else() {
    let addr = unused_addr();
    let config = WebSocketSinkConfig {
        close_timeout: Some(WAIT),
        ..fast_config(format!("ws://{addr}/log"))
    };
    let sink = WebSocketSink::with_config(config).expect("start sink");
    for i in 0..10 {
        sink.write(format!("pending {i}").as_bytes()).expect("write");
    }
    assert_eq!(sink.pending(), 10);

    let late_peer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        TestPeer::bind(addr)
    });
    sink.close().expect("close drains");
    let peer = late_peer.join().expect("peer thread");

    let expected: Vec<String> = (0..10).map(|i| format!("pending {i}")).collect();
    assert_eq!(peer.expect_texts(10, WAIT), expected);
    peer.expect_event(WAIT, |event| matches!(event, PeerEvent::Close));
    assert!(sink.is_closed());
    assert!(matches!(sink.write(b"late"), Err(SinkError::Closed)));
    assert!(matches!(sink.close(), Err(SinkError::AlreadyClosed)));
    let after: Vec<PeerEvent> = peer
        .drain_events(Duration::from_millis(200))
        .into_iter()
        .filter(|event| matches!(event, PeerEvent::Text(_)))
        .collect();
    assert!(after.is_empty(), "{after:?}");
}

#[rstest]
fn close_timeout_bounds_drain_without_peer() {
    let config = WebSocketSinkConfig {
        close_timeout: Some(Duration::from_millis(100)),
        ..fast_config(format!("ws://{}/", unused_addr()))
    };
    let sink = WebSocketSink::with_config(config).expect("start sink");
    sink.write(b"never delivered").expect("write");
    let started = Instant::now();
    assert!(matches!(sink.close(), Err(SinkError::DrainTimeout)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(sink.pending(), 0);
    assert_eq!(sink.phase(), Phase::Closed);
}

#[rstest]
fn close_of_never_connected_sink_is_bounded_by_write_timeout() {
    let config = WebSocketSinkConfig {
        write_timeout: Duration::from_millis(300),
        retry_cap: Some(Duration::from_millis(300)),
        close_timeout: None,
        ..fast_config(format!("ws://{}/", unused_addr()))
    };
    let sink = Arc::new(WebSocketSink::with_config(config).expect("start sink"));
    sink.write(b"never delivered\n").expect("write");
    assert_ne!(sink.phase(), Phase::Connected);

    let closer = {
        let sink = Arc::clone(&sink);
        thread::spawn(move || sink.close())
    };
    assert!(
        wait_for(|| closer.is_finished()),
        "close on a never-connected sink did not return"
    );
    assert!(matches!(
        closer.join().expect("closer"),
        Err(SinkError::DrainTimeout)
    ));
    assert_eq!(sink.phase(), Phase::Closed);
    assert_eq!(sink.pending(), 0);
    assert!(matches!(sink.close(), Err(SinkError::AlreadyClosed)));
}

#[rstest]
fn concurrent_drain_requests_are_rejected() {
    let config = WebSocketSinkConfig {
        write_timeout: Duration::from_millis(300),
        retry_cap: Some(Duration::from_millis(300)),
        close_timeout: Some(Duration::from_millis(50)),
        ..fast_config(format!("ws://{}/", unused_addr()))
    };
    let sink = Arc::new(WebSocketSink::with_config(config).expect("start sink"));
    sink.write(b"stuck").expect("write");
    let flusher = {
        let sink = Arc::clone(&sink);
        thread::spawn(move || sink.flush())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(matches!(sink.flush(), Err(SinkError::DrainInProgress)));
    assert!(matches!(
        flusher.join().expect("flusher"),
        Err(SinkError::DrainTimeout)
    ));
    assert!(matches!(sink.close(), Err(SinkError::DrainTimeout)));
}

#[rstest]
fn heartbeats_reach_the_peer(peer: TestPeer) {
    let config = WebSocketSinkConfig {
        pong_timeout: Duration::from_millis(500),
        heartbeat_period: Duration::from_millis(50),
        ..fast_config(peer.url())
    };
    let sink = connected_sink(&peer, config);
    peer.expect_event(WAIT, |event| matches!(event, PeerEvent::Ping));
    assert!(sink.is_connected());
    sink.close().expect("close");
}

#[rstest]
fn silent_peer_triggers_reconnect(peer: TestPeer) {
    let config = WebSocketSinkConfig {
        pong_timeout: Duration::from_millis(300),
        heartbeat_period: Duration::from_millis(100),
        ..fast_config(peer.url())
    };
    let sink = connected_sink(&peer, config);
    peer.send(PeerCommand::Freeze);
    assert!(wait_for(|| !sink.is_connected()), "silence went unnoticed");
    peer.send(PeerCommand::Drop);
    peer.expect_connected(WAIT);
    assert!(sink.wait_connected(WAIT));
    sink.close().expect("close");
}

#[rstest]
fn duplicate_runs_independently(peer: TestPeer) {
    let original = connected_sink(&peer, fast_config(peer.url()));
    let copy = original.duplicate().expect("duplicate");
    assert_eq!(copy.config(), original.config());
    original.close().expect("close original");

    assert!(copy.wait_connected(WAIT));
    peer.expect_connected(WAIT);
    copy.write(b"from copy").expect("write");
    assert_eq!(peer.expect_texts(1, WAIT), vec!["from copy".to_owned()]);
    assert!(original.is_closed());
    assert!(!copy.is_closed());
    copy.close().expect("close copy");
}

#[rstest]
fn trait_object_duplicate_is_fresh(peer: TestPeer) {
    let sink: Arc<dyn TetherSinkTrait> =
        Arc::new(WebSocketSink::with_config(fast_config(peer.url())).expect("start sink"));
    let copy = sink.duplicate().expect("websocket sinks duplicate");
    assert!(!Arc::ptr_eq(&sink, &copy));
    sink.close().expect("close original");
    let copy_sink = copy
        .as_any()
        .downcast_ref::<WebSocketSink>()
        .expect("duplicate is a websocket sink");
    assert!(copy_sink.wait_connected(WAIT));
    assert!(!copy_sink.is_closed());
    copy.close().expect("close copy");
}

#[rstest]
fn drop_closes_the_connection(peer: TestPeer) {
    let sink = connected_sink(&peer, fast_config(peer.url()));
    sink.write(b"last words").expect("write");
    drop(sink);
    assert_eq!(peer.expect_texts(1, WAIT), vec!["last words".to_owned()]);
    peer.expect_event(WAIT, |event| matches!(event, PeerEvent::Close));
}

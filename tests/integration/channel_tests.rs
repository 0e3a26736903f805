//! Integration tests for a single channel: producer deliveries through
//! the ring and framer, observer fan-out, and the transmit gate.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lineserial::adapters::loopback::{LoopbackPeer, LoopbackTransport};
use lineserial::{LineChannel, SerialChannel, SerialError, SerialEvent, Timeout};
use lineserial::{ChannelKind, TransportError};

use crate::mock_ports::{Recorded, Recorder};

type SmallChannel = SerialChannel<LoopbackTransport, 16, 32, 3>;

fn make_channel(delims: &[u8]) -> (SmallChannel, LoopbackPeer) {
    let (transport, peer) = LoopbackTransport::new("loop", 8);
    let mut ch = SmallChannel::with_delimiters(ChannelKind::Wired, transport, delims).unwrap();
    ch.enable().unwrap();
    (ch, peer)
}

// ── Framing ───────────────────────────────────────────────────

#[test]
fn two_bursts_two_lines() {
    let (mut ch, peer) = make_channel(b"\n");
    peer.inject(b"ab\n");
    peer.inject(b"cd\n");

    let first = ch.get_line(Timeout::NoWait);
    assert_eq!(first.as_bytes(), b"ab\n");
    assert_eq!(first.len(), 3);
    assert_eq!(ch.get_line(Timeout::NoWait).as_bytes(), b"cd\n");
    assert!(ch.get_line(Timeout::NoWait).is_empty());
}

#[test]
fn empty_delimiter_set_returns_immediately() {
    let (mut ch, peer) = make_channel(b"");
    peer.inject(b"xy");
    assert_eq!(ch.get_line(Timeout::Forever).as_bytes(), b"xy");
}

#[test]
fn poll_on_empty_channel_is_side_effect_free() {
    let (mut ch, _peer) = make_channel(b"\n");
    let start = Instant::now();
    assert!(ch.get_line(Timeout::NoWait).is_empty());
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(ch.pending(), 0);
}

#[test]
fn blocking_read_wakes_on_delivery_from_another_thread() {
    let (mut ch, peer) = make_channel(b"\n");
    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        peer.inject(b"par");
        thread::sleep(Duration::from_millis(10));
        peer.inject(b"tial\n");
    });

    let line = ch.get_line(Timeout::After(Duration::from_secs(5)));
    assert_eq!(line.as_bytes(), b"partial\n");
    producer.join().unwrap();
}

#[test]
fn bounded_wait_is_not_extended_by_partial_data() {
    let (mut ch, peer) = make_channel(b"\n");
    let producer = thread::spawn(move || {
        for _ in 0..5 {
            peer.inject(b"x");
            thread::sleep(Duration::from_millis(10));
        }
    });

    let start = Instant::now();
    assert!(ch.get_line(Timeout::from_millis(30)).is_empty());
    assert!(start.elapsed() < Duration::from_millis(200));
    producer.join().unwrap();
}

// ── Overflow ──────────────────────────────────────────────────

#[test]
fn overflow_drops_exactly_the_excess() {
    let (mut ch, peer) = make_channel(b"\n");
    let rec = Recorder::new();
    ch.add_observer(rec.clone()).unwrap();

    // 16-byte ring, 20 bytes delivered before any drain.
    peer.inject(b"0123456789");
    peer.inject(b"abcde\nfgh\n");

    assert_eq!(ch.get_line(Timeout::NoWait).as_bytes(), b"456789abcde\n");
    assert_eq!(ch.get_line(Timeout::NoWait).as_bytes(), b"fgh\n");
    assert_eq!(rec.overflows(), vec![4]);
}

#[test]
fn line_spanning_overflow_is_lost() {
    let (mut ch, peer) = make_channel(b"\n");
    peer.inject(b"start-of-a-very-long-");
    peer.inject(b"line\nok\n");

    // Only the newest 16 bytes survive: "ry-long-line\nok\n".
    assert_eq!(ch.get_line(Timeout::NoWait).as_bytes(), b"ry-long-line\n");
    assert_eq!(ch.get_line(Timeout::NoWait).as_bytes(), b"ok\n");
}

// ── Observers ─────────────────────────────────────────────────

#[test]
fn observers_receive_every_burst_in_order() {
    let (ch, peer) = make_channel(b"\n");
    let a = Recorder::new();
    let b = Recorder::new();
    ch.add_observer(a.clone()).unwrap();
    ch.add_observer(b.clone()).unwrap();

    peer.inject(b"one");
    peer.inject(b"two");

    let expected = vec![
        Recorded::NewData(b"one".to_vec()),
        Recorded::NewData(b"two".to_vec()),
    ];
    assert_eq!(a.events(), expected);
    assert_eq!(b.events(), expected);
}

#[test]
fn observer_table_is_bounded_and_reusable() {
    let (ch, _peer) = make_channel(b"\n");
    let noop = |_: &SerialEvent<'_>| {};
    let ids: Vec<_> = (0..3).map(|_| ch.add_observer(Arc::new(noop)).unwrap()).collect();
    assert_eq!(ch.add_observer(Arc::new(noop)), Err(SerialError::NoMemory));

    ch.remove_observer(ids[1]).unwrap();
    assert_eq!(ch.remove_observer(ids[1]), Err(SerialError::NotFound));
    assert!(ch.add_observer(Arc::new(noop)).is_ok());
}

// ── Transmit gate ─────────────────────────────────────────────

#[test]
fn second_send_is_busy_until_completion() {
    let (mut ch, peer) = make_channel(b"\n");
    peer.set_auto_complete(false);

    ch.send(Timeout::NoWait, b"first").unwrap();
    assert_eq!(ch.send(Timeout::from_millis(10), b"second"), Err(SerialError::Busy));

    peer.complete_transmit();
    ch.send(Timeout::NoWait, b"second").unwrap();
    assert_eq!(peer.take_sent(), b"firstsecond");
}

#[test]
fn blocked_sender_proceeds_when_completion_arrives() {
    let (mut ch, peer) = make_channel(b"\n");
    peer.set_auto_complete(false);
    ch.send(Timeout::NoWait, b"a").unwrap();

    let completer = peer.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        completer.complete_transmit();
    });

    assert_eq!(ch.send(Timeout::After(Duration::from_secs(5)), b"b"), Ok(()));
    t.join().unwrap();
}

#[test]
fn payload_is_fragmented_to_transport_unit() {
    let (mut ch, peer) = make_channel(b"\n");
    ch.send(Timeout::NoWait, b"0123456789abcdefXYZ").unwrap();
    let chunks = peer.sent_chunks();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.len() <= 8));
}

#[test]
fn disconnected_peer_is_silent_success() {
    let (mut ch, peer) = make_channel(b"\n");
    peer.set_connected(false);
    assert_eq!(ch.send(Timeout::NoWait, b"lost"), Ok(()));
    assert!(peer.sent_chunks().is_empty());

    // Gate was released by the early exit.
    peer.set_connected(true);
    assert_eq!(ch.send(Timeout::NoWait, b"kept"), Ok(()));
}

#[test]
fn formatted_send_and_overflowing_format() {
    let (mut ch, peer) = make_channel(b"\n");
    ch.send_fmt(Timeout::NoWait, format_args!("t={}C\n", 21)).unwrap();
    assert_eq!(peer.take_sent(), b"t=21C\n");

    let long = "y".repeat(64);
    assert_eq!(
        ch.send_fmt(Timeout::NoWait, format_args!("{}", long)),
        Err(SerialError::BufferFull)
    );
}

#[test]
fn failed_start_leaves_channel_disabled() {
    let (transport, peer) = LoopbackTransport::new("loop", 8);
    let mut ch = SmallChannel::new(ChannelKind::Wireless, transport);
    peer.fail_next_start(TransportError::Io(-19));

    assert_eq!(ch.enable(), Err(SerialError::NotReady));
    assert!(!ch.is_enabled());
    assert!(!peer.is_started());

    ch.enable().unwrap();
    assert!(peer.is_started());
}

#[test]
fn disabled_channel_ignores_deliveries() {
    let (mut ch, peer) = make_channel(b"\n");
    ch.disable().unwrap();
    assert!(!peer.inject(b"x\n"));
    assert!(ch.get_line(Timeout::NoWait).is_empty());
    assert_eq!(ch.send(Timeout::NoWait, b"y"), Err(SerialError::NotReady));
}

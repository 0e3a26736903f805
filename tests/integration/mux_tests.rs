//! Integration tests for the multiplexer over two loopback channels.

use std::thread;
use std::time::{Duration, Instant};

use lineserial::adapters::loopback::{LoopbackPeer, LoopbackTransport};
use lineserial::config::SerialConfig;
use lineserial::{
    ChannelKind, ChannelMask, LineChannel, SerialChannel, SerialError, SerialMux, Timeout,
    TransportError,
};

use crate::mock_ports::Recorder;

struct Rig {
    mux: SerialMux,
    wired: LoopbackPeer,
    wireless: LoopbackPeer,
}

fn rig() -> Rig {
    let (wired_t, wired) = LoopbackTransport::new("wired", usize::MAX);
    let (wireless_t, wireless) = LoopbackTransport::new("wireless", 20);

    let mut config = SerialConfig::default();
    config.delimiters = heapless::Vec::from_slice(b"\n").unwrap();

    let mut mux = SerialMux::with_config(&config);
    mux.attach(Box::new(SerialChannel::<_, 64>::new(ChannelKind::Wired, wired_t)))
        .unwrap();
    mux.attach(Box::new(SerialChannel::<_, 64>::new(ChannelKind::Wireless, wireless_t)))
        .unwrap();
    Rig { mux, wired, wireless }
}

#[test]
fn wired_has_priority_over_wireless() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();

    r.wireless.inject(b"from-air\n");
    r.wired.inject(b"from-wire\n");

    assert_eq!(r.mux.get_line(Timeout::NoWait).as_bytes(), b"from-wire\n");
    assert_eq!(r.mux.get_line(Timeout::NoWait).as_bytes(), b"from-air\n");
    assert!(r.mux.get_line(Timeout::NoWait).is_empty());
}

#[test]
fn blocked_reader_wakes_on_any_channel() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();

    let wireless = r.wireless.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        wireless.inject(b"hello\n");
    });

    let start = Instant::now();
    let line = r.mux.get_line(Timeout::After(Duration::from_secs(5)));
    assert_eq!(line.as_bytes(), b"hello\n");
    assert!(start.elapsed() < Duration::from_secs(5));
    t.join().unwrap();
}

#[test]
fn reader_assembles_line_across_wakes() {
    let mut r = rig();
    r.mux.enable(ChannelMask::WIRED).unwrap();

    let wired = r.wired.clone();
    let t = thread::spawn(move || {
        for part in [&b"sp"[..], b"lit", b"\n"] {
            thread::sleep(Duration::from_millis(10));
            wired.inject(part);
        }
    });

    assert_eq!(r.mux.get_line(Timeout::Forever).as_bytes(), b"split\n");
    t.join().unwrap();
}

#[test]
fn disabled_channel_is_not_polled() {
    let mut r = rig();
    r.mux.enable(ChannelMask::WIRELESS).unwrap();
    assert!(!r.wired.inject(b"ignored\n"));
    assert!(r.mux.get_line(Timeout::from_millis(5)).is_empty());
}

#[test]
fn send_fans_out_to_enabled_channels() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();

    let payload = [b'q'; 45];
    r.mux.send(Timeout::NoWait, &payload).unwrap();

    assert_eq!(r.wired.sent_chunks().len(), 1);
    assert_eq!(r.wireless.sent_chunks().len(), 3, "20-byte payload units");
    assert_eq!(r.wired.take_sent(), r.wireless.take_sent());

    r.mux
        .send_fmt(Timeout::NoWait, format_args!("Hello World!\n"))
        .unwrap();
    assert_eq!(r.wired.take_sent(), b"Hello World!\n");
    assert_eq!(r.wireless.take_sent(), b"Hello World!\n");
}

#[test]
fn send_reports_last_channel_status() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();

    // Wired fails, wireless succeeds: caller sees success.
    r.wired.fail_next_transmit(TransportError::Io(-5));
    assert_eq!(r.mux.send(Timeout::NoWait, b"x"), Ok(()));

    // Wired succeeds, wireless fails: caller sees the failure.
    r.wireless.fail_next_transmit(TransportError::Io(-5));
    assert_eq!(r.mux.send(Timeout::NoWait, b"y"), Err(SerialError::NotReady));
}

#[test]
fn partial_enable_is_not_rolled_back() {
    let mut r = rig();
    r.wireless.fail_next_start(TransportError::NotReady);

    assert_eq!(r.mux.enable(ChannelMask::ALL), Err(SerialError::NotReady));
    assert_eq!(r.mux.enabled(), ChannelMask::WIRED);
    assert!(r.mux.channel(ChannelKind::Wired).unwrap().is_enabled());

    // Retrying picks up where it stopped.
    r.mux.enable(ChannelMask::ALL).unwrap();
    assert_eq!(r.mux.enabled(), ChannelMask::WIRED | ChannelMask::WIRELESS);
}

#[test]
fn nothing_enabled_means_not_ready() {
    let mut r = rig();
    assert_eq!(r.mux.send(Timeout::NoWait, b"x"), Err(SerialError::NotReady));
    assert_eq!(
        r.mux.send_fmt(Timeout::NoWait, format_args!("x")),
        Err(SerialError::NotReady)
    );
    assert!(r.mux.get_line(Timeout::Forever).is_empty());
    assert_eq!(r.mux.enable(ChannelMask::NONE), Err(SerialError::NotReady));
}

#[test]
fn disable_then_reenable() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();
    r.mux.disable(ChannelMask::ALL).unwrap();
    assert_eq!(r.mux.enabled(), ChannelMask::NONE);
    assert!(!r.wired.is_started());

    r.mux.enable(ChannelMask::WIRED).unwrap();
    r.wired.inject(b"back\n");
    assert_eq!(r.mux.get_line(Timeout::NoWait).as_bytes(), b"back\n");
}

#[test]
fn delimiter_change_applies_to_enabled_channels() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();
    r.mux.set_delimiters(b";").unwrap();

    r.wireless.inject(b"a;b\n");
    assert_eq!(r.mux.get_line(Timeout::NoWait).as_bytes(), b"a;");
    assert_eq!(
        r.mux.channel(ChannelKind::Wired).unwrap().delimiters(),
        b";"
    );
}

#[test]
fn extra_observers_on_muxed_channel() {
    let mut r = rig();
    r.mux.enable(ChannelMask::ALL).unwrap();
    let rec = Recorder::new();
    r.mux
        .channel(ChannelKind::Wireless)
        .unwrap()
        .add_observer(rec.clone())
        .unwrap();

    r.wireless.inject(b"seen\n");
    assert_eq!(rec.events().len(), 1);
    assert_eq!(r.mux.get_line(Timeout::NoWait).as_bytes(), b"seen\n");
}

#[test]
fn attaching_twice_is_busy() {
    let mut r = rig();
    let (t, _peer) = LoopbackTransport::new("dup", 8);
    let dup: Box<dyn LineChannel> = Box::new(SerialChannel::<_, 64>::new(ChannelKind::Wired, t));
    assert_eq!(r.mux.attach(dup), Err(SerialError::Busy));
}

//! lineserial echo demo.
//!
//! Runs the serial stack on the host with loopback transports:
//!
//! ```text
//!  stdin ──▶ [wired loopback]    ──┐
//!                                  ├──▶ SerialMux ──▶ echo every line
//!            [wireless loopback] ──┘        │
//!                                           ▼
//!  stdout ◀── what each transport transmitted
//! ```
//!
//! Usage: `lineserial-echo [config.json]`. Log level via `RUST_LOG`.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use log::info;

use lineserial::adapters::log_sink::LogObserver;
use lineserial::adapters::loopback::{LoopbackPeer, LoopbackTransport};
use lineserial::config::DEFAULT_NUS_PAYLOAD;
use lineserial::{ChannelKind, LineChannel, SerialChannel, SerialConfig, SerialMux, Timeout};

/// How long one `get_line` waits before re-checking for end of input.
const POLL_TIMEOUT: Timeout = Timeout::from_millis(200);

fn load_config() -> Result<SerialConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            SerialConfig::from_json(&json).with_context(|| format!("parsing config {}", path))
        }
        None => Ok(SerialConfig::default()),
    }
}

fn channel(kind: ChannelKind, transport: LoopbackTransport) -> Result<Box<dyn LineChannel>> {
    let channel: SerialChannel<LoopbackTransport> = SerialChannel::new(kind, transport);
    channel.add_observer(Arc::new(LogObserver::new(kind)))?;
    Ok(Box::new(channel))
}

/// Feed stdin into the wired peer until EOF.
fn spawn_stdin_reader(peer: LoopbackPeer, done: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    peer.inject(&buf[..n]);
                }
            }
        }
        done.store(true, Ordering::Release);
    })
}

fn print_transmitted(peers: &[(ChannelKind, &LoopbackPeer)]) -> Result<()> {
    let mut out = io::stdout().lock();
    for (kind, peer) in peers {
        let sent = peer.take_sent();
        if !sent.is_empty() {
            write!(out, "[{}] {}", kind, String::from_utf8_lossy(&sent))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = load_config()?;
    let send_timeout = config.send_timeout();

    let (wired, wired_peer) = LoopbackTransport::new("stdin", usize::MAX);
    let (wireless, wireless_peer) = LoopbackTransport::new("ble-loopback", DEFAULT_NUS_PAYLOAD);
    let peers = [
        (ChannelKind::Wired, &wired_peer),
        (ChannelKind::Wireless, &wireless_peer),
    ];

    let mut mux = SerialMux::with_config(&config);
    mux.attach(channel(ChannelKind::Wired, wired)?)?;
    mux.attach(channel(ChannelKind::Wireless, wireless)?)?;
    mux.enable(config.channels)?;
    info!("echo demo running on {:?}", mux.enabled());

    let stdin_done = Arc::new(AtomicBool::new(false));
    let reader = spawn_stdin_reader(wired_peer.clone(), Arc::clone(&stdin_done));

    mux.send_fmt(send_timeout, format_args!("Hello World!\n"))?;
    print_transmitted(&peers)?;

    loop {
        // Sampled before polling so input injected just before EOF is still drained.
        let eof = stdin_done.load(Ordering::Acquire);
        let line = mux.get_line(POLL_TIMEOUT);
        if line.is_empty() {
            if eof {
                break;
            }
            continue;
        }

        let echo = line.to_vec();
        if let Err(e) = mux.send(send_timeout, &echo) {
            log::warn!("echo failed: {}", e);
        }
        print_transmitted(&peers)?;
    }

    // Reader already hit EOF; join cannot block.
    let _ = reader.join();
    mux.disable(mux.enabled())?;
    Ok(())
}

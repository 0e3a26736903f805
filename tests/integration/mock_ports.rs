//! Mock hardware ports for integration tests.
//!
//! Each mock records every call so tests can assert on the full history,
//! and exposes the driver callback it was given so tests can play the
//! role of the UART driver or BLE stack.

use std::sync::{Arc, Mutex};

use lineserial::adapters::nus::{NusCallback, NusEvent, NusPort, RadioState};
use lineserial::adapters::uart::{UartCallback, UartEvent, UartPort};
use lineserial::{EventObserver, SerialEvent, TransportError};

// ── Event recorder ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    NewData(Vec<u8>),
    Overflow(usize),
}

/// Observer that keeps an owned copy of every event.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Recorded>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn overflows(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Overflow(n) => Some(n),
                Recorded::NewData(_) => None,
            })
            .collect()
    }
}

impl EventObserver for Recorder {
    fn on_event(&self, event: &SerialEvent<'_>) {
        let rec = match event {
            SerialEvent::NewData { data, .. } => Recorded::NewData(data.to_vec()),
            SerialEvent::BufferOverflow { lost } => Recorded::Overflow(*lost),
        };
        self.events.lock().unwrap().push(rec);
    }
}

// ── MockUart ──────────────────────────────────────────────────

#[derive(Default)]
pub struct UartState {
    pub ready: bool,
    pub ack_disable: bool,
    pub callback: Option<UartCallback>,
    pub writes: Vec<Vec<u8>>,
    pub disable_requests: usize,
}

/// UART port whose state stays reachable after the port is moved into
/// a channel.
pub struct MockUart {
    pub state: Arc<Mutex<UartState>>,
}

#[allow(dead_code)]
impl MockUart {
    pub fn new() -> (Self, Arc<Mutex<UartState>>) {
        let state = Arc::new(Mutex::new(UartState {
            ready: true,
            ack_disable: true,
            ..UartState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

/// Fire a driver event at the registered callback, outside the state lock.
#[allow(dead_code)]
pub fn uart_event(state: &Mutex<UartState>, event: UartEvent<'_>) {
    let cb = state.lock().unwrap().callback.clone();
    cb.expect("uart rx not enabled").handle(event);
}

impl UartPort for MockUart {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn enable_rx(
        &mut self,
        callback: UartCallback,
        _rx_timeout: core::time::Duration,
    ) -> Result<(), TransportError> {
        self.state.lock().unwrap().callback = Some(callback);
        Ok(())
    }

    fn disable_rx(&mut self) -> Result<(), TransportError> {
        let cb = {
            let mut s = self.state.lock().unwrap();
            s.disable_requests += 1;
            if s.ack_disable { s.callback.clone() } else { None }
        };
        if let Some(cb) = cb {
            cb.handle(UartEvent::RxDisabled);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.state.lock().unwrap().writes.push(data.to_vec());
        Ok(())
    }
}

// ── MockNus ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NusCall {
    EnableRadio,
    InitService,
    StartAdvertising,
    Shutdown,
    Notify(Vec<u8>),
}

pub struct NusState {
    pub radio: RadioState,
    pub connected: bool,
    pub callback: Option<NusCallback>,
    pub calls: Vec<NusCall>,
}

pub struct MockNus {
    pub state: Arc<Mutex<NusState>>,
}

#[allow(dead_code)]
impl MockNus {
    pub fn new(radio: RadioState) -> (Self, Arc<Mutex<NusState>>) {
        let state = Arc::new(Mutex::new(NusState {
            radio,
            connected: true,
            callback: None,
            calls: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[allow(dead_code)]
pub fn nus_event(state: &Mutex<NusState>, event: NusEvent<'_>) {
    let cb = state.lock().unwrap().callback.clone();
    cb.expect("nus service not initialised").handle(event);
}

/// Notifications sent so far.
#[allow(dead_code)]
pub fn notifications(state: &Mutex<NusState>) -> Vec<Vec<u8>> {
    state
        .lock()
        .unwrap()
        .calls
        .iter()
        .filter_map(|c| match c {
            NusCall::Notify(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

impl NusPort for MockNus {
    fn enable_radio(&mut self) -> Result<RadioState, TransportError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(NusCall::EnableRadio);
        Ok(s.radio)
    }

    fn init_service(&mut self, callback: NusCallback) -> Result<(), TransportError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(NusCall::InitService);
        s.callback = Some(callback);
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().calls.push(NusCall::StartAdvertising);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().calls.push(NusCall::Shutdown);
        Err(TransportError::Unsupported)
    }

    fn notify(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut s = self.state.lock().unwrap();
        if !s.connected {
            return Err(TransportError::NotConnected);
        }
        s.calls.push(NusCall::Notify(data.to_vec()));
        Ok(())
    }
}

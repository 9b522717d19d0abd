//! Wireless thermal-printer transport.
//!
//! Owns exactly one logical connection to a line-mode printer reached over
//! a GATT-like wireless link, and reliably transmits formatted ESC/POS
//! streams despite the link's small per-write payload limit. The platform
//! side (device chooser, service negotiation, characteristic writes) sits
//! behind the [`DeviceLink`] trait and is injected by the composition root.
//!
//! State machine:
//! `Disconnected → Connecting → Connected → (Disconnected | Reconnecting →
//! Connected | Disconnected)`.
//!
//! Payloads are sent in 20-byte chunks with a fixed 50 ms pause between
//! chunks. The pause respects the receiver's buffering and is a deliberate
//! throttle, not a tunable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::{uuid, Uuid};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Well-known GATT service exposed by serial-over-BLE thermal printers.
pub const PRINT_SERVICE_UUID: Uuid = uuid!("000018f0-0000-1000-8000-00805f9b34fb");
/// Write characteristic within [`PRINT_SERVICE_UUID`].
pub const PRINT_CHARACTERISTIC_UUID: Uuid = uuid!("00002af1-0000-1000-8000-00805f9b34fb");

/// Maximum bytes per characteristic write — the minimal safe default for
/// constrained wireless links.
pub const CHUNK_SIZE: usize = 20;
/// Pause between consecutive chunk writes.
pub const INTER_CHUNK_DELAY: Duration = Duration::from_millis(50);
/// Automatic reconnection ceiling. Exhausting it requires an explicit
/// `connect()` before any further attempt.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Pause between failed reconnect attempts.
const RECONNECT_BACKOFF: Duration = Duration::from_millis(1000);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures at the platform device boundary.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("wireless transport is unavailable on this platform")]
    Unavailable,
    #[error("device selection cancelled")]
    Cancelled,
    #[error("print service or characteristic not found on device")]
    ServiceNotFound,
    #[error("device unreachable: {0}")]
    Unreachable(String),
    #[error("characteristic write failed: {0}")]
    Write(String),
}

/// Failures surfaced to the operator.
#[derive(Debug, Error)]
pub enum PrinterError {
    /// Device unreachable, selection cancelled, or capability missing.
    #[error("printer connection failed: {0}")]
    Connection(String),
    /// A print was attempted without an active connection. No bytes were
    /// transmitted.
    #[error("printer is not connected")]
    NotConnected,
    /// A chunk write failed mid-transmission; the remainder was aborted.
    /// A partial print may have been produced.
    #[error("print aborted after {sent} of {total} bytes: {reason}")]
    Print {
        sent: usize,
        total: usize,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Device boundary
// ---------------------------------------------------------------------------

/// Identity of a chosen printer device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: String,
    pub name: String,
}

/// Platform boundary: the host's wireless device chooser plus a GATT-like
/// connect/write primitive addressed by [`PRINT_SERVICE_UUID`] and
/// [`PRINT_CHARACTERISTIC_UUID`].
#[async_trait]
pub trait DeviceLink: Send {
    /// Open the user-mediated device chooser, connect to the selection, and
    /// negotiate the print service/characteristic pair.
    async fn choose_and_connect(&mut self) -> Result<DeviceHandle, LinkError>;

    /// Reconnect to a previously chosen device without user mediation.
    async fn reconnect_device(&mut self, device_id: &str) -> Result<DeviceHandle, LinkError>;

    /// Write one chunk to the print characteristic. Callers never pass more
    /// than [`CHUNK_SIZE`] bytes.
    async fn write_chunk(&mut self, data: &[u8]) -> Result<(), LinkError>;

    /// Release any held handles.
    async fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Snapshot of the transport's session state. Obtained non-blockingly via
/// [`PrinterTransport::connection_info`] or observed as a stream via
/// [`PrinterTransport::subscribe`].
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub state: LinkState,
    pub device_name: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

impl ConnectionInfo {
    pub fn connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// True while a bounded automatic-reconnect loop is running, so a
    /// caller can render a waiting indicator.
    pub fn reconnecting(&self) -> bool {
        self.state == LinkState::Reconnecting
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            state: LinkState::Disconnected,
            device_name: None,
            reconnect_attempts: 0,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Single logical connection to a wireless thermal printer.
///
/// Methods take `&mut self`, so at most one operation is in flight at a
/// time and reconnect loops can never overlap. For shared access (e.g. a
/// kitchen ticket and a customer receipt printed back-to-back from
/// different tasks) wrap it in [`SharedPrinter`], whose fair mutex queues
/// prints in request order.
pub struct PrinterTransport<L: DeviceLink> {
    link: L,
    device: Option<DeviceHandle>,
    /// Remembered across connectivity loss so `reconnect()` can retry the
    /// same device. Cleared by explicit `disconnect()`.
    last_device_id: Option<String>,
    status_tx: watch::Sender<ConnectionInfo>,
    status_rx: watch::Receiver<ConnectionInfo>,
}

impl<L: DeviceLink> PrinterTransport<L> {
    pub fn new(link: L) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionInfo::default());
        Self {
            link,
            device: None,
            last_device_id: None,
            status_tx,
            status_rx,
        }
    }

    /// Open the platform device chooser and connect.
    ///
    /// No-op when already connected. On failure the state returns to
    /// `Disconnected`.
    pub async fn connect(&mut self) -> Result<(), PrinterError> {
        if self.is_connected() {
            debug!("connect() called while already connected — ignoring");
            return Ok(());
        }

        self.set_status(LinkState::Connecting, 0);
        match self.link.choose_and_connect().await {
            Ok(handle) => {
                info!(device = %handle.name, "Printer connected");
                self.last_device_id = Some(handle.id.clone());
                self.device = Some(handle);
                self.set_status(LinkState::Connected, 0);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Printer connection failed");
                self.device = None;
                self.set_status(LinkState::Disconnected, 0);
                Err(PrinterError::Connection(e.to_string()))
            }
        }
    }

    /// Transmit a formatted ESC/POS payload in [`CHUNK_SIZE`]-byte chunks.
    ///
    /// Returns only after every chunk was acknowledged by the link. A chunk
    /// failure aborts the remainder, marks the connection lost, and returns
    /// [`PrinterError::Print`] — the caller must surface the possible
    /// partial print to the operator rather than assume atomicity.
    pub async fn print(&mut self, payload: &[u8]) -> Result<(), PrinterError> {
        if !self.is_connected() {
            return Err(PrinterError::NotConnected);
        }

        let total = payload.len();
        let mut sent = 0usize;

        for chunk in payload.chunks(CHUNK_SIZE) {
            if sent > 0 {
                tokio::time::sleep(INTER_CHUNK_DELAY).await;
            }
            if let Err(e) = self.link.write_chunk(chunk).await {
                warn!(sent, total, error = %e, "Chunk write failed, aborting print");
                // The link is gone; keep the device id so reconnect() can retry.
                self.device = None;
                self.set_status(LinkState::Disconnected, 0);
                return Err(PrinterError::Print {
                    sent,
                    total,
                    reason: e.to_string(),
                });
            }
            sent += chunk.len();
        }

        debug!(bytes = total, "Print payload transmitted");
        Ok(())
    }

    /// Attempt to re-establish a lost connection to the remembered device,
    /// up to [`MAX_RECONNECT_ATTEMPTS`] times.
    ///
    /// The `Reconnecting` condition and the attempt counter are observable
    /// through [`connection_info`](Self::connection_info) and the status
    /// stream. Exhausting the ceiling returns to `Disconnected` and makes
    /// no further attempt until explicitly requested again.
    pub async fn reconnect(&mut self) -> Result<(), PrinterError> {
        if self.is_connected() {
            return Ok(());
        }
        let device_id = self
            .last_device_id
            .clone()
            .ok_or_else(|| PrinterError::Connection("no previously connected device".into()))?;

        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            self.set_status(LinkState::Reconnecting, attempt);
            info!(attempt, max = MAX_RECONNECT_ATTEMPTS, "Reconnecting to printer");

            match self.link.reconnect_device(&device_id).await {
                Ok(handle) => {
                    info!(device = %handle.name, attempt, "Printer reconnected");
                    self.device = Some(handle);
                    self.set_status(LinkState::Connected, 0);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    if attempt < MAX_RECONNECT_ATTEMPTS {
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
        }

        self.device = None;
        self.set_status(LinkState::Disconnected, MAX_RECONNECT_ATTEMPTS);
        Err(PrinterError::Connection(format!(
            "gave up after {MAX_RECONNECT_ATTEMPTS} reconnect attempts"
        )))
    }

    /// Tear down the connection and forget the remembered device.
    /// Idempotent: safe to call from any state.
    pub async fn disconnect(&mut self) {
        self.link.close().await;
        if self.device.take().is_some() {
            info!("Printer disconnected");
        }
        self.last_device_id = None;
        self.set_status(LinkState::Disconnected, 0);
    }

    /// Non-blocking session-state snapshot. Never fails.
    pub fn connection_info(&self) -> ConnectionInfo {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to connection-state changes (no polling required).
    pub fn subscribe(&self) -> watch::Receiver<ConnectionInfo> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn set_status(&self, state: LinkState, reconnect_attempts: u32) {
        let info = ConnectionInfo {
            state,
            device_name: self.device.as_ref().map(|d| d.name.clone()),
            reconnect_attempts,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        };
        // An internal receiver is held, so send cannot fail.
        let _ = self.status_tx.send(info);
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Cloneable handle around a [`PrinterTransport`] for use across tasks.
///
/// The process-wide printer connection is a singleton owned by the
/// composition root; clones of this handle share it. The inner
/// `tokio::sync::Mutex` is fair, so back-to-back `print()` calls (kitchen
/// ticket then customer receipt) are transmitted in request order.
pub struct SharedPrinter<L: DeviceLink> {
    inner: Arc<tokio::sync::Mutex<PrinterTransport<L>>>,
    status: watch::Receiver<ConnectionInfo>,
}

impl<L: DeviceLink> SharedPrinter<L> {
    pub fn new(transport: PrinterTransport<L>) -> Self {
        let status = transport.subscribe();
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(transport)),
            status,
        }
    }

    pub async fn connect(&self) -> Result<(), PrinterError> {
        self.inner.lock().await.connect().await
    }

    pub async fn print(&self, payload: &[u8]) -> Result<(), PrinterError> {
        self.inner.lock().await.print(payload).await
    }

    pub async fn reconnect(&self) -> Result<(), PrinterError> {
        self.inner.lock().await.reconnect().await
    }

    pub async fn disconnect(&self) {
        self.inner.lock().await.disconnect().await;
    }

    /// Lock-free status snapshot; never blocks on an in-flight print.
    pub fn connection_info(&self) -> ConnectionInfo {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionInfo> {
        self.status.clone()
    }
}

impl<L: DeviceLink> Clone for SharedPrinter<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            status: self.status.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockState {
        writes: Vec<Vec<u8>>,
        connect_calls: u32,
        reconnect_calls: u32,
    }

    /// Scriptable stand-in for the platform device boundary.
    struct MockLink {
        state: Arc<Mutex<MockState>>,
        fail_connect: Option<LinkError>,
        /// Number of leading reconnect attempts that fail.
        reconnect_failures: u32,
        /// Zero-based index of the write call that fails, if any.
        fail_write_at: Option<usize>,
    }

    impl MockLink {
        fn new() -> (Self, Arc<Mutex<MockState>>) {
            let state = Arc::new(Mutex::new(MockState::default()));
            (
                Self {
                    state: Arc::clone(&state),
                    fail_connect: None,
                    reconnect_failures: 0,
                    fail_write_at: None,
                },
                state,
            )
        }

        fn handle() -> DeviceHandle {
            DeviceHandle {
                id: "printer-01".into(),
                name: "RPP58 Thermal".into(),
            }
        }
    }

    #[async_trait]
    impl DeviceLink for MockLink {
        async fn choose_and_connect(&mut self) -> Result<DeviceHandle, LinkError> {
            self.state.lock().unwrap().connect_calls += 1;
            if let Some(err) = self.fail_connect.take() {
                return Err(err);
            }
            Ok(Self::handle())
        }

        async fn reconnect_device(&mut self, device_id: &str) -> Result<DeviceHandle, LinkError> {
            assert_eq!(device_id, "printer-01");
            let calls = {
                let mut s = self.state.lock().unwrap();
                s.reconnect_calls += 1;
                s.reconnect_calls
            };
            if calls <= self.reconnect_failures {
                return Err(LinkError::Unreachable("out of range".into()));
            }
            Ok(Self::handle())
        }

        async fn write_chunk(&mut self, data: &[u8]) -> Result<(), LinkError> {
            let mut s = self.state.lock().unwrap();
            if self.fail_write_at == Some(s.writes.len()) {
                return Err(LinkError::Write("gatt write rejected".into()));
            }
            s.writes.push(data.to_vec());
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn transport(link: MockLink) -> PrinterTransport<MockLink> {
        PrinterTransport::new(link)
    }

    #[tokio::test(start_paused = true)]
    async fn test_print_while_disconnected_fails_without_transmitting() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        let err = t.print(b"hello printer").await.unwrap_err();
        assert!(matches!(err, PrinterError::NotConnected));
        assert!(state.lock().unwrap().writes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_print_chunks_payload_in_order() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        t.connect().await.unwrap();

        let payload: Vec<u8> = (0..45u8).collect();
        t.print(&payload).await.unwrap();

        let writes = &state.lock().unwrap().writes;
        // ceil(45 / 20) = 3 writes, each <= 20 bytes, offsets strictly increasing
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|w| w.len() <= CHUNK_SIZE));
        assert_eq!(writes[0].len(), 20);
        assert_eq!(writes[1].len(), 20);
        assert_eq!(writes[2].len(), 5);
        let reassembled: Vec<u8> = writes.concat();
        assert_eq!(reassembled, payload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_print_single_chunk_payload() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        t.connect().await.unwrap();
        t.print(&[0xAA; 20]).await.unwrap();
        assert_eq!(state.lock().unwrap().writes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_failure_aborts_remaining_chunks() {
        let (mut link, state) = MockLink::new();
        link.fail_write_at = Some(1);
        let mut t = transport(link);
        t.connect().await.unwrap();

        let err = t.print(&[0u8; 45]).await.unwrap_err();
        match err {
            PrinterError::Print { sent, total, .. } => {
                assert_eq!(sent, 20);
                assert_eq!(total, 45);
            }
            other => panic!("expected Print error, got {other:?}"),
        }
        // only the first chunk went out; the connection is marked lost
        assert_eq!(state.lock().unwrap().writes.len(), 1);
        assert!(!t.connection_info().connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_returns_to_disconnected() {
        let (mut link, _state) = MockLink::new();
        link.fail_connect = Some(LinkError::Cancelled);
        let mut t = transport(link);

        let err = t.connect().await.unwrap_err();
        assert!(matches!(err, PrinterError::Connection(_)));
        let info = t.connection_info();
        assert_eq!(info.state, LinkState::Disconnected);
        assert!(!info.connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_when_connected() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        t.connect().await.unwrap();
        t.connect().await.unwrap();
        // the chooser is not reopened
        assert_eq!(state.lock().unwrap().connect_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_succeeds_after_transient_failure() {
        let (mut link, state) = MockLink::new();
        link.reconnect_failures = 1;
        link.fail_write_at = Some(0);
        let mut t = transport(link);
        t.connect().await.unwrap();

        // lose the link mid-print
        assert!(t.print(b"x").await.is_err());
        assert!(!t.connection_info().connected());

        t.reconnect().await.unwrap();
        let info = t.connection_info();
        assert!(info.connected());
        assert_eq!(info.reconnect_attempts, 0);
        assert_eq!(state.lock().unwrap().reconnect_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_ceiling_is_enforced() {
        let (mut link, state) = MockLink::new();
        link.reconnect_failures = u32::MAX;
        link.fail_write_at = Some(0);
        let mut t = transport(link);
        t.connect().await.unwrap();
        assert!(t.print(b"x").await.is_err());

        let err = t.reconnect().await.unwrap_err();
        assert!(matches!(err, PrinterError::Connection(_)));

        let info = t.connection_info();
        assert_eq!(info.state, LinkState::Disconnected);
        assert_eq!(info.reconnect_attempts, MAX_RECONNECT_ATTEMPTS);
        // exactly the ceiling, and no further attempts afterwards
        assert_eq!(state.lock().unwrap().reconnect_calls, MAX_RECONNECT_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_without_remembered_device_fails() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        let err = t.reconnect().await.unwrap_err();
        assert!(matches!(err, PrinterError::Connection(_)));
        assert_eq!(state.lock().unwrap().reconnect_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_idempotent_and_forgets_device() {
        let (link, _state) = MockLink::new();
        let mut t = transport(link);
        t.connect().await.unwrap();

        t.disconnect().await;
        t.disconnect().await;
        assert_eq!(t.connection_info().state, LinkState::Disconnected);

        // explicit disconnect forgets the device — no automatic reconnect target
        assert!(t.reconnect().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_stream_observes_state_changes() {
        let (link, _state) = MockLink::new();
        let mut t = transport(link);
        let mut rx = t.subscribe();

        t.connect().await.unwrap();
        rx.changed().await.unwrap();
        let info = rx.borrow_and_update().clone();
        assert_eq!(info.state, LinkState::Connected);
        assert_eq!(info.device_name.as_deref(), Some("RPP58 Thermal"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_printer_queues_prints_in_order() {
        let (link, state) = MockLink::new();
        let mut t = transport(link);
        t.connect().await.unwrap();
        let printer = SharedPrinter::new(t);

        let a = printer.clone();
        let b = printer.clone();
        let first = tokio::spawn(async move { a.print(&[1u8; 30]).await });
        let second = tokio::spawn(async move { b.print(&[2u8; 10]).await });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let writes = &state.lock().unwrap().writes;
        assert_eq!(writes.len(), 3);
        // chunks of one payload are never interleaved with the other's
        let flat: Vec<u8> = writes.concat();
        let ones = flat.iter().filter(|&&b| b == 1).count();
        let twos = flat.iter().filter(|&&b| b == 2).count();
        assert_eq!(ones, 30);
        assert_eq!(twos, 10);
        let first_two_pos = flat.iter().position(|&b| b == 2).unwrap();
        assert!(flat[..first_two_pos].iter().all(|&b| b == 1) || first_two_pos == 0);
    }

    #[test]
    fn test_service_identifiers_are_stable() {
        assert_eq!(
            PRINT_SERVICE_UUID.to_string(),
            "000018f0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            PRINT_CHARACTERISTIC_UUID.to_string(),
            "00002af1-0000-1000-8000-00805f9b34fb"
        );
    }
}

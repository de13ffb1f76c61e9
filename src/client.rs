// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/client.py

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::alarm::{Alarm, AlarmChange, ArmingMode, ArmingState, PanelInfo, Zone};
use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::constants::{
    AUX_OUTPUT_COUNT, CLOSE_GRACE, CMD_ARMING_STATUS, CMD_AUX_OUTPUTS, CMD_PANEL_VERSION,
    CMD_ZONES_1_16_UNSEALED, CMD_ZONES_17_32_UNSEALED, CRLF, MAX_COMMAND_LEN,
};
use crate::error::{NessError, Result};
use crate::event::{AuxOutputs, Event, StatusUpdate};
use crate::notify::{ClientEvent, EventReceiver, EventSender, event_channel};
use crate::packet::Packet;
use crate::transport::Connection;

type StateChangeHandler = Box<dyn Fn(ArmingState, Option<ArmingMode>) + Send + Sync>;
type ZoneChangeHandler = Box<dyn Fn(u8, bool) + Send + Sync>;
type AuxOutputChangeHandler = Box<dyn Fn(u8, bool) + Send + Sync>;
type EventReceivedHandler = Box<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    state_change: Option<StateChangeHandler>,
    zone_change: Option<ZoneChangeHandler>,
    aux_output_change: Option<AuxOutputChangeHandler>,
    event_received: Option<EventReceivedHandler>,
}

/// Pending `send_command_and_wait` calls, keyed by request id. All waiters
/// for one id share a single slot, resolved by the next matching response.
type PendingTable = HashMap<u8, watch::Sender<Option<StatusUpdate>>>;

struct Tasks {
    receive: JoinHandle<()>,
    refresh: JoinHandle<()>,
}

struct Inner {
    connection: Arc<dyn Connection>,
    config: ClientConfig,
    alarm: RwLock<Alarm>,
    handlers: Handlers,
    event_tx: EventSender,
    closed: AtomicBool,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    connect_lock: Mutex<Backoff>,
    write_lock: Mutex<()>,
    last_recv: Mutex<Option<Instant>>,
    pending: Mutex<PendingTable>,
    tasks: Mutex<Option<Tasks>>,
}

/// Async client for a Ness D8x/D16x panel.
///
/// Cloning is cheap; all clones share the same connection and state.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use nessclient::{Client, TcpConnection};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let connection = Arc::new(TcpConnection::new("192.168.1.10", 2401));
///     let client = Client::builder(connection)
///         .on_zone_change(|zone, triggered| println!("Zone {zone}: {triggered}"))
///         .build();
///
///     client.start().await;
///     client.arm_away(Some("1234")).await?;
///
///     tokio::signal::ctrl_c().await?;
///     client.close().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub fn new(connection: Arc<dyn Connection>, config: ClientConfig) -> Self {
        Self::builder(connection).config(config).build()
    }

    pub fn builder(connection: Arc<dyn Connection>) -> ClientBuilder {
        ClientBuilder {
            connection,
            config: ClientConfig::default(),
            handlers: Handlers::default(),
        }
    }

    /// Subscribe to client events.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.event_tx.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    // --- Connection lifecycle ---

    /// Connect if not already connected, retrying with backoff until it
    /// succeeds or the client is closed.
    pub async fn connect(&self) -> Result<()> {
        self.inner.ensure_connected().await
    }

    /// Spawn the receive and refresh tasks. Subsequent calls are no-ops.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let receive = tokio::spawn(receive_loop(self.inner.clone()));
        let refresh = tokio::spawn(refresh_loop(self.inner.clone()));
        *self.inner.tasks.lock().await = Some(Tasks { receive, refresh });
    }

    /// Start the background tasks and wait until they finish (after `close()`).
    pub async fn keepalive(&self) {
        self.start().await;
        let tasks = self.inner.tasks.lock().await.take();
        if let Some(tasks) = tasks {
            let _ = tokio::join!(tasks.receive, tasks.refresh);
        }
    }

    /// Close the client: stop the background tasks and the transport.
    pub async fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!("Closing client");
        }
        let _ = self.inner.shutdown_tx.send(true);
        self.inner.connection.close().await;

        let tasks = self.inner.tasks.lock().await.take();
        if let Some(tasks) = tasks {
            join_or_abort("refresh", tasks.refresh).await;
            join_or_abort("receive", tasks.receive).await;
        }
    }

    // --- Commands ---

    /// Send a raw command (e.g. `"A1234E"`) without waiting for a response.
    pub async fn send_command(&self, command: &str) -> Result<()> {
        self.inner.send_command(command).await
    }

    /// Send a status request (`S<hex id>`) and wait for the matching response.
    ///
    /// Concurrent calls for the same request id each transmit the request
    /// but share the first response received.
    pub async fn send_command_and_wait(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<StatusUpdate> {
        self.inner.send_command_and_wait(command, timeout).await
    }

    pub async fn arm_away(&self, code: Option<&str>) -> Result<()> {
        self.send_command(&format!("A{}E", code.unwrap_or_default()))
            .await
    }

    pub async fn arm_home(&self, code: Option<&str>) -> Result<()> {
        self.send_command(&format!("H{}E", code.unwrap_or_default()))
            .await
    }

    pub async fn disarm(&self, code: &str) -> Result<()> {
        self.send_command(&format!("{code}E")).await
    }

    pub async fn panic(&self, code: &str) -> Result<()> {
        self.send_command(&format!("*{code}#")).await
    }

    /// Turn an auxiliary output (1-8) on or off.
    pub async fn aux(&self, output_id: u8, on: bool) -> Result<()> {
        if output_id == 0 || output_id as usize > AUX_OUTPUT_COUNT {
            return Err(NessError::InvalidArgument {
                details: format!("aux output {output_id} out of range 1..={AUX_OUTPUT_COUNT}"),
            });
        }
        let action = if on { '*' } else { '#' };
        self.send_command(&format!("{output_id}{output_id}{action}"))
            .await
    }

    /// Query zone banks and arming status in parallel. Responses are applied
    /// by the receive task.
    pub async fn update(&self) -> Result<()> {
        self.inner.update().await
    }

    /// Panel model and firmware version. Queried once, then served from state.
    pub async fn get_panel_info(&self) -> Result<PanelInfo> {
        if let Some(info) = self.panel_info().await {
            return Ok(info);
        }
        let update = self
            .send_command_and_wait(CMD_PANEL_VERSION, self.inner.config.request_timeout())
            .await?;
        match update {
            StatusUpdate::PanelVersion(version) => Ok(PanelInfo {
                model: version.model,
                version: version.version(),
            }),
            other => Err(NessError::UnexpectedResponse {
                details: format!("expected panel version, got {:?}", other.request_id()),
            }),
        }
    }

    /// Query the auxiliary output states.
    pub async fn refresh_aux_outputs(&self) -> Result<AuxOutputs> {
        let update = self
            .send_command_and_wait(CMD_AUX_OUTPUTS, self.inner.config.request_timeout())
            .await?;
        match update {
            StatusUpdate::AuxiliaryOutputs(aux) => Ok(aux.outputs),
            other => Err(NessError::UnexpectedResponse {
                details: format!("expected auxiliary outputs, got {:?}", other.request_id()),
            }),
        }
    }

    // --- State accessors ---

    pub async fn arming_state(&self) -> ArmingState {
        self.inner.alarm.read().await.arming_state()
    }

    pub async fn arming_mode(&self) -> Option<ArmingMode> {
        self.inner.alarm.read().await.arming_mode()
    }

    pub async fn zones(&self) -> Vec<Zone> {
        self.inner.alarm.read().await.zones()
    }

    /// Get a specific zone by ID (1-indexed).
    pub async fn zone(&self, id: u8) -> Option<Zone> {
        self.inner.alarm.read().await.zone(id)
    }

    pub async fn panel_info(&self) -> Option<PanelInfo> {
        self.inner.alarm.read().await.panel_info().cloned()
    }

    pub async fn aux_outputs(&self) -> [Option<bool>; AUX_OUTPUT_COUNT] {
        self.inner.alarm.read().await.aux_outputs()
    }
}

/// Builder for [`Client`], used to register change handlers.
pub struct ClientBuilder {
    connection: Arc<dyn Connection>,
    config: ClientConfig,
    handlers: Handlers,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_state_change(
        mut self,
        handler: impl Fn(ArmingState, Option<ArmingMode>) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.state_change = Some(Box::new(handler));
        self
    }

    pub fn on_zone_change(mut self, handler: impl Fn(u8, bool) + Send + Sync + 'static) -> Self {
        self.handlers.zone_change = Some(Box::new(handler));
        self
    }

    pub fn on_aux_output_change(
        mut self,
        handler: impl Fn(u8, bool) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.aux_output_change = Some(Box::new(handler));
        self
    }

    /// Called for every decoded event, before it is applied to the alarm state.
    pub fn on_event_received(mut self, handler: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.handlers.event_received = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Client {
        let (event_tx, _event_rx) = event_channel(self.config.event_channel_capacity.max(1));
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let inner = Inner {
            alarm: RwLock::new(Alarm::new(self.config.infer_arming_state)),
            connect_lock: Mutex::new(Backoff::from_config(&self.config)),
            connection: self.connection,
            config: self.config,
            handlers: self.handlers,
            event_tx,
            closed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            shutdown_tx,
            write_lock: Mutex::new(()),
            last_recv: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            tasks: Mutex::new(None),
        };
        Client {
            inner: Arc::new(inner),
        }
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn is_stale(&self) -> bool {
        self.last_recv
            .lock()
            .await
            .is_some_and(|last| last.elapsed() > self.config.stale_after())
    }

    async fn ensure_connected(&self) -> Result<()> {
        let mut backoff = self.connect_lock.lock().await;

        if self.is_stale().await {
            warn!("No data received from panel recently, reconnecting");
            self.connection.close().await;
        }

        let mut reconnected = false;
        while !self.connection.connected() {
            if self.is_closed() {
                return Err(NessError::Closed);
            }
            match self.connection.connect().await {
                Ok(true) => reconnected = true,
                Ok(false) => debug!("Transport did not connect"),
                Err(e) => debug!("Connect failed: {}", e),
            }
            if self.connection.connected() {
                break;
            }

            let delay = backoff.next_delay();
            warn!(
                "Unable to connect, retrying in {:.1}s (attempt {})",
                delay.as_secs_f64(),
                backoff.attempt()
            );
            let mut shutdown = self.shutdown_tx.subscribe();
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.wait_for(|closed| *closed) => return Err(NessError::Closed),
            }
        }

        if reconnected {
            backoff.reset();
            *self.last_recv.lock().await = Some(Instant::now());
            info!("Connected to panel");
            let _ = self.event_tx.send(ClientEvent::Connected);
        }
        Ok(())
    }

    async fn send_command(&self, command: &str) -> Result<()> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(NessError::InvalidArgument {
                details: format!(
                    "command of {} characters exceeds {MAX_COMMAND_LEN}",
                    command.len()
                ),
            });
        }
        let line = format!("{}{}", Packet::request(command).encode(), CRLF);
        self.ensure_connected().await?;

        let _guard = self.write_lock.lock().await;
        debug!("Sending: {}", line.trim_end());
        self.connection.write(line.as_bytes()).await
    }

    async fn send_command_and_wait(&self, command: &str, wait: Duration) -> Result<StatusUpdate> {
        let request_id = parse_status_request(command)?;

        let mut slot = {
            let mut pending = self.pending.lock().await;
            match pending.get(&request_id) {
                Some(tx) if tx.borrow().is_none() => tx.subscribe(),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    pending.insert(request_id, tx);
                    rx
                }
            }
        };

        self.send_command(command).await?;

        match timeout(wait, slot.wait_for(Option::is_some)).await {
            Ok(Ok(update)) => update.clone().ok_or(NessError::Closed),
            Ok(Err(_)) => Err(NessError::Closed),
            Err(_) => Err(NessError::CommandTimeout {
                command: command.to_string(),
            }),
        }
    }

    async fn update(&self) -> Result<()> {
        debug!("Requesting state update from panel");
        tokio::try_join!(
            self.send_command(CMD_ZONES_1_16_UNSEALED),
            self.send_command(CMD_ZONES_17_32_UNSEALED),
            self.send_command(CMD_ARMING_STATUS),
        )?;
        Ok(())
    }

    async fn handle_line(&self, data: &[u8]) {
        let line = String::from_utf8_lossy(data);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        debug!("Received: {}", line);

        let event = match Event::decode_line(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to decode line '{}': {}", line, e);
                return;
            }
        };
        *self.last_recv.lock().await = Some(Instant::now());

        if let Some(update) = event.status_update() {
            let slot = self.pending.lock().await.remove(&update.request_id().code());
            if let Some(tx) = slot {
                tx.send_replace(Some(update.clone()));
            }
        }

        if let Some(handler) = &self.handlers.event_received {
            guarded("event received", || handler(&event));
        }
        let _ = self.event_tx.send(ClientEvent::EventReceived(event.clone()));

        let changes = self.alarm.write().await.handle_event(&event);
        for change in changes {
            self.dispatch_change(change);
        }
    }

    fn dispatch_change(&self, change: AlarmChange) {
        match change {
            AlarmChange::ArmingState { state, mode } => {
                if let Some(handler) = &self.handlers.state_change {
                    guarded("state change", || handler(state, mode));
                }
            }
            AlarmChange::Zone { zone_id, triggered } => {
                if let Some(handler) = &self.handlers.zone_change {
                    guarded("zone change", || handler(zone_id, triggered));
                }
            }
            AlarmChange::AuxOutput { output_id, active } => {
                if let Some(handler) = &self.handlers.aux_output_change {
                    guarded("aux output change", || handler(output_id, active));
                }
            }
        }
        let _ = self.event_tx.send(change.into());
    }
}

/// Extract the request id from a `S<hex>` status request.
fn parse_status_request(command: &str) -> Result<u8> {
    command
        .strip_prefix('S')
        .filter(|id| id.len() == 2)
        .and_then(|id| u8::from_str_radix(id, 16).ok())
        .ok_or_else(|| NessError::InvalidArgument {
            details: format!("'{command}' is not a status request"),
        })
}

fn guarded(name: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!("The {} handler panicked", name);
    }
}

async fn join_or_abort(name: &str, mut handle: JoinHandle<()>) {
    if timeout(CLOSE_GRACE, &mut handle).await.is_err() {
        warn!("{} task did not stop in time, aborting", name);
        handle.abort();
    }
}

async fn receive_loop(inner: Arc<Inner>) {
    while !inner.is_closed() {
        if inner.ensure_connected().await.is_err() {
            break;
        }
        while let Some(data) = inner.connection.read().await {
            inner.handle_line(&data).await;
        }
        if inner.is_closed() {
            break;
        }
        warn!("Lost connection to panel");
        let _ = inner.event_tx.send(ClientEvent::Disconnected);
    }
    debug!("Receive loop stopped");
}

async fn refresh_loop(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = sleep(inner.config.update_interval()) => {}
            _ = shutdown.wait_for(|closed| *closed) => break,
        }
        if inner.is_closed() {
            break;
        }
        tokio::select! {
            result = inner.update() => {
                if let Err(e) = result {
                    warn!("State refresh failed: {}", e);
                }
            }
            _ = shutdown.wait_for(|closed| *closed) => break,
        }
    }
    debug!("Refresh loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_request() {
        assert_eq!(parse_status_request("S00").unwrap(), 0x00);
        assert_eq!(parse_status_request("S14").unwrap(), 0x14);
        assert_eq!(parse_status_request("S20").unwrap(), 0x20);
        assert_eq!(parse_status_request("S1a").unwrap(), 0x1a);
    }

    #[test]
    fn test_parse_status_request_rejects_commands() {
        for command in ["A1234E", "1234E", "S", "S1", "S123", "SZZ", "s14", ""] {
            assert!(
                matches!(
                    parse_status_request(command),
                    Err(NessError::InvalidArgument { .. })
                ),
                "{command} should be rejected"
            );
        }
    }

    #[test]
    fn test_guarded_swallows_panic() {
        guarded("test", || panic!("boom"));
    }
}

//! RealtimeManager - 每个楼层一个检测 WebSocket
//!
//! Every floor in the current set owns one supervisor task. The task connects,
//! runs the session, and on close asks the floor's [`FloorLifecycle`] whether
//! to retry. A floor therefore never has more than one socket, and the
//! pending reconnect timer is simply the supervisor sleeping.
//!
//! Each floor gets a child of the manager's root [`CancellationToken`].
//! Removing the floor cancels its token, shutting down cancels the root. The
//! supervisor checks its token at every await point and re-validates its
//! floor entry (by generation) before touching shared state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::message::{ClientFrame, KEEPALIVE_PING};
use shared::{FloorId, ServerFrame};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::lifecycle::{CloseOutcome, ConnectionState, FloorLifecycle};
use super::transport::{Connector, DetectionSocket, SocketEvent};
use super::{FloorStatus, RealtimeConfig, RealtimeEvent};

struct FloorEntry {
    /// Distinguishes re-added floors from their removed predecessor
    generation: u64,
    lifecycle: FloorLifecycle,
    cancel: CancellationToken,
    /// Cuts a pending reconnect delay short
    wake: Arc<Notify>,
    /// A supervisor owns this floor's connection
    running: bool,
    task: Option<JoinHandle<()>>,
    message: Option<String>,
    last_frame_at: Option<DateTime<Utc>>,
}

impl FloorEntry {
    fn new(generation: u64, config: &RealtimeConfig, cancel: CancellationToken) -> Self {
        Self {
            generation,
            lifecycle: FloorLifecycle::new(config.max_attempts, config.backoff()),
            cancel,
            wake: Arc::new(Notify::new()),
            running: false,
            task: None,
            message: None,
            last_frame_at: None,
        }
    }

    fn status(&self, floor_id: FloorId) -> FloorStatus {
        FloorStatus {
            floor_id,
            state: self.lifecycle.state(),
            attempts: self.lifecycle.attempts(),
            message: self.message.clone(),
            last_frame_at: self.last_frame_at,
        }
    }
}

#[derive(Default)]
struct Registry {
    floors: HashMap<FloorId, FloorEntry>,
    /// Supervisors of removed floors that may still be closing their socket
    retiring: HashMap<FloorId, JoinHandle<()>>,
    next_generation: u64,
}

struct Inner {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    registry: Mutex<Registry>,
    events: broadcast::Sender<RealtimeEvent>,
    shutdown: CancellationToken,
}

/// Keeps one detection socket open per floor
pub struct RealtimeManager {
    inner: Arc<Inner>,
}

impl RealtimeManager {
    pub fn new(config: RealtimeConfig, connector: impl Connector) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                connector: Arc::new(connector),
                registry: Mutex::new(Registry::default()),
                events,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Detection frames and state changes of every floor
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.inner.events.subscribe()
    }

    /// Reconcile with the caller's floor set
    ///
    /// Floors that left are closed and forgotten, new floors connect
    /// (staggered), floors that stay are left untouched.
    pub fn set_floors(&self, floor_ids: impl IntoIterator<Item = FloorId>) {
        if self.inner.shutdown.is_cancelled() {
            tracing::debug!("Realtime manager shut down, ignoring floor set");
            return;
        }
        let wanted: BTreeSet<FloorId> = floor_ids.into_iter().collect();
        let mut registry = self.inner.registry.lock();

        let removed: Vec<FloorId> = registry
            .floors
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for floor_id in removed {
            if let Some(entry) = registry.floors.remove(&floor_id) {
                entry.cancel.cancel();
                if let Some(task) = entry.task.filter(|t| !t.is_finished()) {
                    registry.retiring.insert(floor_id, task);
                }
                tracing::info!(floor_id, "Floor removed, detection stream stopped");
            }
        }

        let added: Vec<FloorId> = wanted
            .iter()
            .filter(|id| !registry.floors.contains_key(id))
            .copied()
            .collect();
        for (slot, floor_id) in added.into_iter().enumerate() {
            let generation = registry.next_generation;
            registry.next_generation += 1;
            let entry = FloorEntry::new(
                generation,
                &self.inner.config,
                self.inner.shutdown.child_token(),
            );
            self.inner.emit_state(floor_id, &entry);
            registry.floors.insert(floor_id, entry);

            let delay = self
                .inner
                .config
                .stagger
                .saturating_mul(u32::try_from(slot).unwrap_or(u32::MAX));
            self.inner.spawn_supervisor(&mut registry, floor_id, delay);
            tracing::info!(floor_id, delay_ms = delay.as_millis() as u64, "Floor added");
        }

        registry.retiring.retain(|_, task| !task.is_finished());
    }

    /// Start a connection for `floor_id` unless one is already live
    ///
    /// No-op (returns `false`) when the floor is not in the set, a connect or
    /// session is in progress, attempts are exhausted, or the manager is shut
    /// down. A floor waiting out its backoff reconnects right away.
    pub fn ensure(&self, floor_id: FloorId) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }
        let mut registry = self.inner.registry.lock();
        let Some(entry) = registry.floors.get_mut(&floor_id) else {
            tracing::debug!(floor_id, "ensure: floor not in the current set");
            return false;
        };
        if entry.running {
            if entry.lifecycle.state() == ConnectionState::Reconnecting {
                entry.wake.notify_waiters();
                return true;
            }
            return false;
        }
        if !entry.lifecycle.can_connect() {
            return false;
        }
        self.inner
            .spawn_supervisor(&mut registry, floor_id, Duration::ZERO)
    }

    /// Clear the attempt counter (e.g. after `Failed`) and reconnect
    pub fn reset(&self, floor_id: FloorId) -> bool {
        {
            let mut registry = self.inner.registry.lock();
            let Some(entry) = registry.floors.get_mut(&floor_id) else {
                return false;
            };
            entry.lifecycle.reset();
            self.inner.emit_state(floor_id, entry);
        }
        tracing::info!(floor_id, "Detection stream reset");
        self.ensure(floor_id)
    }

    pub fn status(&self, floor_id: FloorId) -> Option<FloorStatus> {
        let registry = self.inner.registry.lock();
        registry.floors.get(&floor_id).map(|e| e.status(floor_id))
    }

    /// Status of every floor, ordered by floor id
    pub fn statuses(&self) -> Vec<FloorStatus> {
        let registry = self.inner.registry.lock();
        let mut statuses: Vec<FloorStatus> = registry
            .floors
            .iter()
            .map(|(id, e)| e.status(*id))
            .collect();
        statuses.sort_by_key(|s| s.floor_id);
        statuses
    }

    pub fn floor_ids(&self) -> Vec<FloorId> {
        let registry = self.inner.registry.lock();
        let mut ids: Vec<FloorId> = registry.floors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Cancel every timer, close every socket and wait for the supervisors
    ///
    /// Idempotent; later `set_floors`/`ensure` calls are ignored.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = {
            let mut registry = self.inner.registry.lock();
            let floors = std::mem::take(&mut registry.floors);
            let mut tasks: Vec<JoinHandle<()>> =
                floors.into_values().filter_map(|e| e.task).collect();
            tasks.extend(registry.retiring.drain().map(|(_, task)| task));
            tasks
        };
        if tasks.is_empty() {
            return;
        }

        tracing::info!("Stopping {} detection streams...", tasks.len());
        for task in tasks {
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::error!(error = ?e, "Detection supervisor panicked"),
            }
        }
        tracing::info!("All detection streams stopped");
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

// ========== Supervisor bookkeeping ==========

impl Inner {
    fn spawn_supervisor(
        self: &Arc<Self>,
        registry: &mut Registry,
        floor_id: FloorId,
        delay: Duration,
    ) -> bool {
        let previous = registry.retiring.remove(&floor_id);
        let Some(entry) = registry.floors.get_mut(&floor_id) else {
            return false;
        };
        entry.running = true;
        let task = tokio::spawn(supervise(
            self.clone(),
            Supervisor {
                floor_id,
                generation: entry.generation,
                cancel: entry.cancel.clone(),
                wake: entry.wake.clone(),
            },
            delay,
            previous,
        ));
        entry.task = Some(task);
        true
    }

    fn emit_state(&self, floor_id: FloorId, entry: &FloorEntry) {
        let _ = self.events.send(RealtimeEvent::State {
            floor_id,
            state: entry.lifecycle.state(),
            attempts: entry.lifecycle.attempts(),
        });
    }

    /// Run `f` on the floor entry if it is still the supervisor's incarnation
    fn with_entry<R>(&self, sup: &Supervisor, f: impl FnOnce(&mut FloorEntry) -> R) -> Option<R> {
        if sup.cancel.is_cancelled() {
            return None;
        }
        let mut registry = self.registry.lock();
        let entry = registry
            .floors
            .get_mut(&sup.floor_id)
            .filter(|e| e.generation == sup.generation)?;
        Some(f(entry))
    }

    fn begin_connect(&self, sup: &Supervisor) -> bool {
        self.with_entry(sup, |entry| {
            if entry.lifecycle.is_exhausted() {
                return false;
            }
            entry.lifecycle.on_connecting();
            self.emit_state(sup.floor_id, entry);
            true
        })
        .unwrap_or(false)
    }

    fn mark_open(&self, sup: &Supervisor) -> bool {
        self.with_entry(sup, |entry| {
            entry.lifecycle.on_open();
            self.emit_state(sup.floor_id, entry);
        })
        .is_some()
    }

    fn on_closed(&self, sup: &Supervisor) -> CloseOutcome {
        let max = self.config.max_attempts;
        self.with_entry(sup, |entry| {
            let outcome = entry.lifecycle.on_closed(true);
            match outcome {
                CloseOutcome::Retry { attempt, delay } => tracing::warn!(
                    floor_id = sup.floor_id,
                    attempt,
                    max,
                    delay_ms = delay.as_millis() as u64,
                    "Detection stream lost, reconnecting"
                ),
                CloseOutcome::Exhausted { attempts } => tracing::error!(
                    floor_id = sup.floor_id,
                    attempts,
                    "Detection stream failed, giving up"
                ),
                CloseOutcome::Stop => {}
            }
            self.emit_state(sup.floor_id, entry);
            outcome
        })
        .unwrap_or(CloseOutcome::Stop)
    }

    fn supervisor_exited(&self, sup: &Supervisor) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry
            .floors
            .get_mut(&sup.floor_id)
            .filter(|e| e.generation == sup.generation)
        {
            entry.running = false;
            if matches!(
                entry.lifecycle.state(),
                ConnectionState::Connecting | ConnectionState::Open
            ) {
                entry.lifecycle.on_closed(false);
                self.emit_state(sup.floor_id, entry);
            }
        }
    }

    async fn handle_text(&self, sup: &Supervisor, text: &str, socket: &mut dyn DetectionSocket) {
        let floor_id = sup.floor_id;
        match ServerFrame::parse(text) {
            Ok(ServerFrame::Ping) => {
                // best effort, a failed pong surfaces as a close later
                if let Err(e) = socket.send_text(&ClientFrame::Pong.to_json()).await {
                    tracing::debug!(floor_id, "Pong failed: {e}");
                }
            }
            Ok(ServerFrame::Pong) => tracing::trace!(floor_id, "Keepalive answered"),
            Ok(ServerFrame::Detection(frame)) => {
                let current = self
                    .with_entry(sup, |entry| entry.last_frame_at = Some(Utc::now()))
                    .is_some();
                if current {
                    let _ = self
                        .events
                        .send(RealtimeEvent::Detection { floor_id, frame });
                }
            }
            Ok(other) => {
                if let Some(message) = other.status_text() {
                    tracing::debug!(floor_id, %message, "Detection stream status");
                    self.with_entry(sup, |entry| entry.message = Some(message));
                }
            }
            Err(e) => tracing::warn!(floor_id, "Dropping detection frame: {e}"),
        }
    }
}

// ========== Supervisor task ==========

struct Supervisor {
    floor_id: FloorId,
    generation: u64,
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

enum SessionEnd {
    Cancelled,
    Closed { code: Option<u16>, reason: String },
}

async fn supervise(
    inner: Arc<Inner>,
    sup: Supervisor,
    initial_delay: Duration,
    previous: Option<JoinHandle<()>>,
) {
    let floor_id = sup.floor_id;

    // A removed incarnation of this floor closes its socket first
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    if !initial_delay.is_zero() {
        tokio::select! {
            _ = sup.cancel.cancelled() => {
                inner.supervisor_exited(&sup);
                return;
            }
            _ = tokio::time::sleep(initial_delay) => {}
        }
    }

    loop {
        if !inner.begin_connect(&sup) {
            break;
        }

        let connected = tokio::select! {
            biased;
            _ = sup.cancel.cancelled() => break,
            result = inner.connector.connect(floor_id) => result,
        };

        match connected {
            Ok(mut socket) => {
                if !inner.mark_open(&sup) {
                    socket.close().await;
                    break;
                }
                tracing::info!(floor_id, "Detection stream open");
                match run_session(&inner, &sup, socket.as_mut()).await {
                    SessionEnd::Cancelled => {
                        socket.close().await;
                        break;
                    }
                    SessionEnd::Closed { code, reason } => {
                        tracing::info!(floor_id, code = ?code, %reason, "Detection stream closed");
                    }
                }
            }
            Err(e) => tracing::warn!(floor_id, error = %e, "Detection stream connect failed"),
        }

        // registered before the state turns Reconnecting, so an `ensure`
        // landing before the select below still wakes us
        let wake = sup.wake.notified();
        tokio::pin!(wake);
        wake.as_mut().enable();

        match inner.on_closed(&sup) {
            CloseOutcome::Retry { delay, .. } => {
                tokio::select! {
                    _ = sup.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                    _ = wake.as_mut() => {
                        tracing::debug!(floor_id, "Reconnect requested early");
                    }
                }
            }
            CloseOutcome::Exhausted { .. } | CloseOutcome::Stop => break,
        }
    }

    inner.supervisor_exited(&sup);
}

async fn run_session(
    inner: &Inner,
    sup: &Supervisor,
    socket: &mut dyn DetectionSocket,
) -> SessionEnd {
    let mut keepalive = keepalive_timer(inner.config.keepalive_interval);

    loop {
        tokio::select! {
            biased;
            _ = sup.cancel.cancelled() => return SessionEnd::Cancelled,

            event = socket.next_event() => match event {
                SocketEvent::Text(text) => inner.handle_text(sup, &text, socket).await,
                SocketEvent::Closed { code, reason } => return SessionEnd::Closed { code, reason },
            },

            _ = tick(&mut keepalive) => {
                if let Err(e) = socket.send_text(KEEPALIVE_PING).await {
                    tracing::debug!(floor_id = sup.floor_id, "Keepalive ping failed: {e}");
                }
            }
        }
    }
}

fn keepalive_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

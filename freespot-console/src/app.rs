//! Console wiring
//!
//! ```text
//! ConnectionMonitor ──on_connect──▶ floor_loader ──set_floors──▶ RealtimeManager
//!        ▲                               ▲                              │
//!        │                         floor_refresh                   RealtimeEvent
//!    /health                                                            ▼
//!                                 OccupancyBoard ◀──apply_detection── detection_listener
//!                                                                       │ (PERSIST_STATUS)
//!                                                                       ▼
//!                                                              PUT /tables/{id}
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use freespot_client::{
    ApiClient, ConnectionMonitor, ConnectionState, Connector, MonitorConfig, RealtimeConfig,
    RealtimeEvent, RealtimeManager, WsConnector,
};
use parking_lot::{Mutex, RwLock};
use shared::{DetectionFrame, FloorId};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::board::OccupancyBoard;
use crate::config::{Config, ConsoleResult};
use crate::tasks::{BackgroundTasks, TaskKind};

/// 任务健康检查间隔
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Why the floor list is being reloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    Reconnected,
    Refresh,
}

/// State shared by the console's background tasks
#[derive(Clone)]
struct Context {
    config: Arc<Config>,
    api: Arc<ApiClient>,
    realtime: Arc<RealtimeManager>,
    board: Arc<RwLock<OccupancyBoard>>,
    /// Floors we already asked the backend to run detection for
    started: Arc<Mutex<HashSet<FloorId>>>,
}

pub struct Console {
    ctx: Context,
    monitor: Arc<ConnectionMonitor>,
}

impl Console {
    /// Console talking to the real backend over WebSocket
    pub fn new(config: Config) -> ConsoleResult<Self> {
        let connector = WsConnector::new(config.client.clone());
        Self::with_connector(config, MonitorConfig::default(), RealtimeConfig::wan(), connector)
    }

    pub fn with_connector(
        config: Config,
        monitor_config: MonitorConfig,
        realtime_config: RealtimeConfig,
        connector: impl Connector,
    ) -> ConsoleResult<Self> {
        let api = Arc::new(ApiClient::new(config.client.clone())?);
        let monitor = Arc::new(ConnectionMonitor::new(api.clone(), monitor_config));
        let realtime = Arc::new(RealtimeManager::new(realtime_config, connector));
        Ok(Self {
            ctx: Context {
                config: Arc::new(config),
                api,
                realtime,
                board: Arc::new(RwLock::new(OccupancyBoard::new())),
                started: Arc::new(Mutex::new(HashSet::new())),
            },
            monitor,
        })
    }

    pub fn board(&self) -> Arc<RwLock<OccupancyBoard>> {
        self.ctx.board.clone()
    }

    pub fn realtime(&self) -> Arc<RealtimeManager> {
        self.ctx.realtime.clone()
    }

    pub fn monitor(&self) -> Arc<ConnectionMonitor> {
        self.monitor.clone()
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> ConsoleResult<()> {
        let mut tasks = BackgroundTasks::new(shutdown.child_token());

        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        let on_connect_tx = reload_tx.clone();
        let subscription = self.monitor.on_connect(move || {
            let _ = on_connect_tx.send(Reload::Reconnected);
        });

        // 先订阅, 避免错过首批事件
        let events = self.ctx.realtime.subscribe();
        let token = tasks.shutdown_token();
        tasks.spawn(
            "detection_listener",
            TaskKind::Listener,
            detection_listener(self.ctx.clone(), events, token),
        );

        let token = tasks.shutdown_token();
        tasks.spawn(
            "floor_loader",
            TaskKind::Listener,
            floor_loader(self.ctx.clone(), reload_rx, token),
        );

        if !self.ctx.config.floor_refresh.is_zero() {
            let token = tasks.shutdown_token();
            let monitor = self.monitor.clone();
            let every = self.ctx.config.floor_refresh;
            tasks.spawn(
                "floor_refresh",
                TaskKind::Periodic,
                floor_refresh(monitor, reload_tx, every, token),
            );
        }

        let token = tasks.shutdown_token();
        let monitor = self.monitor.clone();
        tasks.spawn("connection_monitor", TaskKind::Worker, async move {
            monitor.run(token).await;
        });

        tasks.log_summary();

        let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = health.tick() => {
                    tasks.check_health();
                    let summary = self.ctx.board.read().summary();
                    tracing::info!(connected = self.monitor.is_connected(), "Board: {summary}");
                }
            }
        }

        tracing::info!("Console shutting down");
        subscription.unsubscribe();
        self.ctx.realtime.shutdown().await;
        tasks.shutdown().await;
        Ok(())
    }
}

// ========== Background tasks ==========

async fn floor_loader(
    ctx: Context,
    mut reloads: mpsc::UnboundedReceiver<Reload>,
    shutdown: CancellationToken,
) {
    loop {
        let reason = tokio::select! {
            _ = shutdown.cancelled() => break,
            reason = reloads.recv() => match reason {
                Some(reason) => reason,
                None => break,
            },
        };
        if let Err(e) = ctx.reload(reason).await {
            tracing::warn!(?reason, "Loading floors failed: {e}");
        }
    }
}

async fn floor_refresh(
    monitor: Arc<ConnectionMonitor>,
    reloads: mpsc::UnboundedSender<Reload>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    // 跳过立即触发的第一次 tick, 首次加载由 on_connect 负责
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if monitor.is_connected() && reloads.send(Reload::Refresh).is_err() {
                    break;
                }
            }
        }
    }
}

async fn detection_listener(
    ctx: Context,
    mut events: broadcast::Receiver<RealtimeEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(RealtimeEvent::Detection { floor_id, frame }) => {
                ctx.on_detection(floor_id, &frame).await;
            }
            Ok(RealtimeEvent::State {
                floor_id,
                state,
                attempts,
            }) => ctx.on_state(floor_id, state, attempts),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Detection listener lagging, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ========== Handlers ==========

impl Context {
    async fn reload(&self, reason: Reload) -> ConsoleResult<()> {
        let floors = self.api.list_floors().await?;
        let tables = self.api.list_tables(None).await?;

        let (floor_ids, summary) = {
            let mut board = self.board.write();
            let ids = board.load_floors(floors);
            board.load_tables(tables);
            (ids, board.summary())
        };
        tracing::info!(?reason, "Loaded {summary}");

        self.realtime.set_floors(floor_ids.iter().copied());
        if reason == Reload::Reconnected {
            // 后端刚恢复, 跳过仍在等待的退避
            for &floor_id in &floor_ids {
                self.realtime.ensure(floor_id);
            }
        }

        if self.config.auto_start_detection {
            self.start_detection(&floor_ids).await;
        }
        Ok(())
    }

    async fn start_detection(&self, floor_ids: &[FloorId]) {
        let pending: Vec<FloorId> = {
            let started = self.started.lock();
            floor_ids
                .iter()
                .copied()
                .filter(|id| !started.contains(id))
                .collect()
        };
        for floor_id in pending {
            match self
                .api
                .start_detection(floor_id, self.config.detection_start())
                .await
            {
                Ok(started) => {
                    tracing::info!(floor_id, "{}", started.message);
                    self.started.lock().insert(floor_id);
                }
                Err(e) => tracing::warn!(floor_id, "Starting detection failed: {e}"),
            }
        }
    }

    async fn on_detection(&self, floor_id: FloorId, frame: &DetectionFrame) {
        let changes = self.board.write().apply_detection(floor_id, frame);
        for change in changes {
            tracing::info!(
                floor_id,
                table_id = change.table_id,
                from = %change.from,
                to = %change.to,
                "Table status changed"
            );
            if !self.config.persist_status {
                continue;
            }
            if let Err(e) = self.api.update_table_status(change.table_id, change.to).await {
                tracing::warn!(table_id = change.table_id, "Persisting table status failed: {e}");
            }
        }
    }

    fn on_state(&self, floor_id: FloorId, state: ConnectionState, attempts: u32) {
        let label = self.board.read().floor_label(floor_id);
        match state {
            ConnectionState::Failed => tracing::error!(
                floor_id,
                attempts,
                "Detection stream for {label} failed, manual reset required"
            ),
            ConnectionState::Reconnecting => {
                tracing::warn!(floor_id, attempts, "Detection stream for {label} reconnecting")
            }
            _ => tracing::debug!(floor_id, %state, "Detection stream for {label}"),
        }
    }
}

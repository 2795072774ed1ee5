//! Connection Monitor - 后端连接状态监控
//!
//! Polls the backend health endpoint, tracks connected/disconnected state and
//! runs the registered callbacks on every disconnected → connected transition.
//! The monitor never loads data itself; callers hook in through
//! [`ConnectionMonitor::on_connect`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::ApiClient;

/// Health probe abstraction (REST client in production, fakes in tests)
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `true` when the backend answered 2xx
    async fn probe(&self) -> bool;
}

#[async_trait]
impl HealthProbe for ApiClient {
    async fn probe(&self) -> bool {
        match self.health().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                false
            }
        }
    }
}

/// 轮询间隔配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Base interval while disconnected, grows per failed probe
    pub base_interval: Duration,
    /// Upper bound of the disconnected interval
    pub max_interval: Duration,
    /// Fixed interval while connected
    pub connected_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            connected_interval: Duration::from_secs(30),
        }
    }
}

type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct MonitorState {
    connected: bool,
    retries: u32,
    next_id: u64,
    callbacks: Vec<(u64, ConnectCallback)>,
}

/// 连接监控器
pub struct ConnectionMonitor {
    probe: Arc<dyn HealthProbe>,
    config: MonitorConfig,
    state: Arc<Mutex<MonitorState>>,
}

impl ConnectionMonitor {
    /// Starts disconnected, so the first successful probe fires the callbacks
    pub fn new(probe: Arc<dyn HealthProbe>, config: MonitorConfig) -> Self {
        Self {
            probe,
            config,
            state: Arc::new(Mutex::new(MonitorState::default())),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Failed probes since the last success
    pub fn retries(&self) -> u32 {
        self.state.lock().retries
    }

    /// Probe once and update state; returns the new connected flag
    pub async fn check_connection(&self) -> bool {
        let healthy = self.probe.probe().await;

        let (reconnected, to_fire) = {
            let mut state = self.state.lock();
            if healthy {
                let reconnected = !state.connected;
                state.connected = true;
                state.retries = 0;
                let callbacks: Vec<ConnectCallback> = if reconnected {
                    state.callbacks.iter().map(|(_, cb)| cb.clone()).collect()
                } else {
                    Vec::new()
                };
                (reconnected, callbacks)
            } else {
                if state.connected {
                    tracing::warn!("Backend connection lost");
                }
                state.connected = false;
                state.retries = state.retries.saturating_add(1);
                tracing::debug!(retries = state.retries, "Backend unreachable");
                (false, Vec::new())
            }
        };

        if reconnected {
            tracing::info!(callbacks = to_fire.len(), "Backend connected");
        }
        // 锁外执行回调，按注册顺序
        for callback in to_fire {
            callback();
        }
        healthy
    }

    /// Probe immediately, outside the schedule
    pub async fn retry(&self) -> bool {
        self.check_connection().await
    }

    /// Register a callback for every disconnected → connected transition
    pub fn on_connect<F>(&self, callback: F) -> ConnectSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.push((id, Arc::new(callback)));
        ConnectSubscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Delay before the next scheduled probe
    pub fn next_interval(&self) -> Duration {
        let state = self.state.lock();
        if state.connected {
            self.config.connected_interval
        } else {
            self.config
                .base_interval
                .saturating_mul(state.retries.saturating_add(1))
                .min(self.config.max_interval)
        }
    }

    /// Probe loop; the interval is recomputed after every probe
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("Connection monitor started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.check_connection().await;
            let delay = self.next_interval();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("Connection monitor stopped");
    }
}

/// Handle returned by [`ConnectionMonitor::on_connect`]
pub struct ConnectSubscription {
    id: u64,
    state: Weak<Mutex<MonitorState>>,
}

impl ConnectSubscription {
    /// Remove the callback; no-op once the monitor is gone
    pub fn unsubscribe(self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

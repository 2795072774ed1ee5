//! In-process connector
//!
//! Every accepted connection hands a [`MemoryPeer`] (the server side) to the
//! owner of the connector, which can push frames, read what the client sent
//! and close the session with any code.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::FloorId;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::transport::{Connector, DetectionSocket, SocketEvent};
use crate::{ClientError, ClientResult};

#[derive(Default)]
struct ConnectorState {
    attempts: Vec<(FloorId, Instant)>,
    /// Floors whose next N connects fail
    refuse_next: HashMap<FloorId, u32>,
    /// Floors whose connects always fail
    refuse_always: HashSet<FloorId>,
}

/// Channel-backed [`Connector`]
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
    accepted_tx: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Connector plus the stream of accepted server-side peers
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState::default())),
            accepted_tx,
        };
        (connector, accepted_rx)
    }

    /// Fail the next `count` connects of `floor_id`
    pub fn refuse_next(&self, floor_id: FloorId, count: u32) {
        *self.state.lock().refuse_next.entry(floor_id).or_default() += count;
    }

    /// Fail every connect of `floor_id` until [`accept`](Self::accept)
    pub fn refuse(&self, floor_id: FloorId) {
        self.state.lock().refuse_always.insert(floor_id);
    }

    pub fn accept(&self, floor_id: FloorId) {
        let mut state = self.state.lock();
        state.refuse_always.remove(&floor_id);
        state.refuse_next.remove(&floor_id);
    }

    /// Connect attempts made for `floor_id`, refused ones included
    pub fn attempts(&self, floor_id: FloorId) -> usize {
        self.state
            .lock()
            .attempts
            .iter()
            .filter(|(id, _)| *id == floor_id)
            .count()
    }

    /// Every attempt in call order
    pub fn attempt_log(&self) -> Vec<(FloorId, Instant)> {
        self.state.lock().attempts.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, floor_id: FloorId) -> ClientResult<Box<dyn DetectionSocket>> {
        {
            let mut state = self.state.lock();
            state.attempts.push((floor_id, Instant::now()));
            if state.refuse_always.contains(&floor_id) {
                return Err(ClientError::Connection(format!("floor {floor_id} refused")));
            }
            if let Some(left) = state.refuse_next.get_mut(&floor_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ClientError::Connection(format!("floor {floor_id} refused")));
                }
            }
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            floor_id,
            inbound: inbound_tx,
            outbound: outbound_rx,
            pending: VecDeque::new(),
        };
        self.accepted_tx
            .send(peer)
            .map_err(|_| ClientError::Connection("memory listener dropped".into()))?;

        Ok(Box::new(MemorySocket {
            inbound: inbound_rx,
            outbound: Some(outbound_tx),
        }))
    }
}

struct MemorySocket {
    inbound: mpsc::UnboundedReceiver<SocketEvent>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl DetectionSocket for MemorySocket {
    async fn next_event(&mut self) -> SocketEvent {
        match self.inbound.recv().await {
            Some(event) => event,
            None => SocketEvent::abnormal("peer dropped"),
        }
    }

    async fn send_text(&mut self, text: &str) -> ClientResult<()> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| ClientError::Connection("socket closed".into()))?;
        tx.send(text.to_string())
            .map_err(|_| ClientError::Connection("peer dropped".into()))
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}

/// Server side of an in-memory detection socket
pub struct MemoryPeer {
    pub floor_id: FloorId,
    inbound: mpsc::UnboundedSender<SocketEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    pending: VecDeque<String>,
}

impl MemoryPeer {
    /// Push a text frame to the client; `false` once the client is gone
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.inbound.send(SocketEvent::Text(text.into())).is_ok()
    }

    /// Close the session with `code`
    pub fn close(&self, code: u16) -> bool {
        self.inbound
            .send(SocketEvent::Closed {
                code: Some(code),
                reason: String::new(),
            })
            .is_ok()
    }

    /// Next frame the client sent; `None` once the client closed
    pub async fn recv_text(&mut self) -> Option<String> {
        if let Some(text) = self.pending.pop_front() {
            return Some(text);
        }
        self.outbound.recv().await
    }

    /// Frame already sent by the client, without waiting
    pub fn try_recv_text(&mut self) -> Option<String> {
        self.pending
            .pop_front()
            .or_else(|| self.outbound.try_recv().ok())
    }

    /// Wait until the client closed or dropped the socket
    pub async fn closed(&mut self) {
        while let Some(text) = self.outbound.recv().await {
            self.pending.push_back(text);
        }
    }

    /// Whether the client side is gone
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

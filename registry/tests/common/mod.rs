#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]
//! Recording socket doubles for registry integration tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use botnet_registry::socket::{BotSocket, MonitorSocket, Nonce, Pingable};
use botnet_registry::{BotIdentity, BoxSummary, SocketError, SocketId};
use tokio::sync::mpsc;

pub struct FakeBot {
    pub identity: BotIdentity,
    pub pings: Mutex<Vec<Nonce>>,
}

impl FakeBot {
    pub fn new(team: &str, box_name: &str, remote_address: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: BotIdentity {
                socket_id: SocketId::new(),
                team_id: format!("team-{team}"),
                team_name: team.to_string(),
                box_id: format!("box-{box_name}"),
                box_name: box_name.to_string(),
                remote_address: remote_address.to_string(),
            },
            pings: Mutex::new(Vec::new()),
        })
    }

    pub fn with_identity(identity: BotIdentity) -> Arc<Self> {
        Arc::new(Self {
            identity,
            pings: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Pingable for FakeBot {
    fn socket_id(&self) -> SocketId {
        self.identity.socket_id
    }

    async fn ping(&self, nonce: Nonce) -> Result<(), SocketError> {
        self.pings.lock().unwrap().push(nonce);
        Ok(())
    }
}

impl BotSocket for FakeBot {
    fn identity(&self) -> BotIdentity {
        self.identity.clone()
    }
}

/// Monitor that forwards every update to a channel, or fails on demand.
pub struct FakeMonitor {
    pub id: SocketId,
    pub team: String,
    pub fail: bool,
    tx: mpsc::UnboundedSender<Vec<BoxSummary>>,
}

impl FakeMonitor {
    pub fn new(team: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<BoxSummary>>) {
        Self::build(team, false)
    }

    pub fn failing(team: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<BoxSummary>>) {
        Self::build(team, true)
    }

    fn build(team: &str, fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<Vec<BoxSummary>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = Arc::new(Self {
            id: SocketId::new(),
            team: team.to_string(),
            fail,
            tx,
        });
        (monitor, rx)
    }
}

#[async_trait]
impl Pingable for FakeMonitor {
    fn socket_id(&self) -> SocketId {
        self.id
    }

    async fn ping(&self, _nonce: Nonce) -> Result<(), SocketError> {
        if self.fail {
            return Err(SocketError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl MonitorSocket for FakeMonitor {
    fn team_name(&self) -> &str {
        &self.team
    }

    async fn update(&self, boxes: Vec<BoxSummary>) -> Result<(), SocketError> {
        if self.fail {
            return Err(SocketError::Send("broken pipe".to_string()));
        }
        self.tx.send(boxes).map_err(|_| SocketError::Closed)
    }
}

/// Next update delivered to a monitor, or `None` if nothing arrives in time.
pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<Vec<BoxSummary>>) -> Option<Vec<BoxSummary>> {
    tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Assert no update arrives within a short grace period.
pub async fn assert_no_update(rx: &mut mpsc::UnboundedReceiver<Vec<BoxSummary>>) {
    let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(got.is_err(), "unexpected monitor update: {got:?}");
}

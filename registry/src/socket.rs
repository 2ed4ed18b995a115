//! Capabilities the transport layer's socket handles must provide.
//!
//! Bots and monitors are distinct roles. They share only the [`Pingable`]
//! liveness probe; identity and update delivery are role specific.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use serde::Serialize;

use crate::error::SocketError;
use crate::record::{BotIdentity, BoxSummary, SocketId};

/// Random payload carried by a keep-alive ping, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// `len` fresh random bytes from the thread rng.
    pub fn random(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness probe shared by every socket role.
#[async_trait]
pub trait Pingable: Send + Sync {
    fn socket_id(&self) -> SocketId;

    /// Send a ping frame. The registry never waits on the reply.
    async fn ping(&self, nonce: Nonce) -> Result<(), SocketError>;
}

/// A connected bot.
pub trait BotSocket: Pingable {
    /// Identity fields advertised at connect time.
    fn identity(&self) -> BotIdentity;
}

/// A connected monitor subscribed to one team.
#[async_trait]
pub trait MonitorSocket: Pingable {
    fn team_name(&self) -> &str;

    /// Push the team's current box list.
    async fn update(&self, boxes: Vec<BoxSummary>) -> Result<(), SocketError>;
}

pub type BotHandle = Arc<dyn BotSocket>;
pub type MonitorHandle = Arc<dyn MonitorSocket>;

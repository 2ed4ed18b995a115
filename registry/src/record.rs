//! Row and identity types for the bot registry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RegistryError;

/// Opaque identifier of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(Uuid);

impl SocketId {
    /// Fresh random socket id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Process-local sequential row id. Assigned by the store at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(pub u64);

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bot-{}", self.0)
    }
}

/// Identity a bot socket advertises at connect time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub socket_id: SocketId,
    pub team_id: String,
    pub team_name: String,
    pub box_id: String,
    pub box_name: String,
    pub remote_address: String,
}

impl BotIdentity {
    /// Checks the fields the uniqueness constraint is keyed on.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.team_id.trim().is_empty() {
            return Err(RegistryError::InvalidArgument {
                field: "team_id",
                socket_id: self.socket_id,
            });
        }
        if self.box_id.trim().is_empty() {
            return Err(RegistryError::InvalidArgument {
                field: "box_id",
                socket_id: self.socket_id,
            });
        }
        Ok(())
    }
}

/// One live bot in the registry store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRecord {
    pub id: BotId,
    pub socket_id: SocketId,
    pub team_id: String,
    pub team_name: String,
    pub box_id: String,
    pub box_name: String,
    pub remote_address: String,
    /// Never negative; see [`crate::store::RegistryStore::add_reward`].
    pub total_reward: u64,
    pub created_at: DateTime<Utc>,
}

impl BotRecord {
    pub(crate) fn from_identity(id: BotId, identity: BotIdentity) -> Self {
        Self {
            id,
            socket_id: identity.socket_id,
            team_id: identity.team_id,
            team_name: identity.team_name,
            box_id: identity.box_id,
            box_name: identity.box_name,
            remote_address: identity.remote_address,
            total_reward: 0,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> BoxSummary {
        BoxSummary {
            remote_address: self.remote_address.clone(),
            box_name: self.box_name.clone(),
            total_reward: self.total_reward,
        }
    }
}

/// Per-box entry pushed to team monitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxSummary {
    pub remote_address: String,
    pub box_name: String,
    pub total_reward: u64,
}

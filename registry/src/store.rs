//! RegistryStore: indexed in-memory table of live bots.
//!
//! One row per connected bot, keyed by socket id, with secondary indexes by
//! team id, team name, box id and the `(team_id, box_id)` uniqueness key. The
//! primary map and every index live behind a single mutex so a reader never
//! sees a half-applied insert or delete.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::record::{BotId, BotIdentity, BotRecord, SocketId};

/// Uniqueness key: one live bot per (team_id, box_id).
type TeamBoxKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<SocketId, BotRecord>,
    by_team_box: HashMap<TeamBoxKey, SocketId>,
    by_team_id: HashMap<String, HashSet<SocketId>>,
    by_team_name: HashMap<String, HashSet<SocketId>>,
    by_box_id: HashMap<String, HashSet<SocketId>>,
    next_id: u64,
}

impl Tables {
    fn index(&mut self, record: &BotRecord) {
        let sid = record.socket_id;
        self.by_team_box
            .insert((record.team_id.clone(), record.box_id.clone()), sid);
        self.by_team_id
            .entry(record.team_id.clone())
            .or_default()
            .insert(sid);
        self.by_team_name
            .entry(record.team_name.clone())
            .or_default()
            .insert(sid);
        self.by_box_id
            .entry(record.box_id.clone())
            .or_default()
            .insert(sid);
    }

    fn unindex(&mut self, record: &BotRecord) {
        let sid = record.socket_id;
        self.by_team_box
            .remove(&(record.team_id.clone(), record.box_id.clone()));
        remove_from(&mut self.by_team_id, &record.team_id, sid);
        remove_from(&mut self.by_team_name, &record.team_name, sid);
        remove_from(&mut self.by_box_id, &record.box_id, sid);
    }

    fn select(&self, index: &HashMap<String, HashSet<SocketId>>, key: &str) -> Vec<BotRecord> {
        index
            .get(key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|sid| self.rows.get(sid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn remove_from(index: &mut HashMap<String, HashSet<SocketId>>, key: &str, sid: SocketId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(&sid);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Authoritative collection of live [`BotRecord`]s.
///
/// Holds no socket handles and sends no notifications; that is the
/// [`crate::manager::BotManager`]'s job.
#[derive(Debug, Default)]
pub struct RegistryStore {
    tables: Mutex<Tables>,
    trace_queries: bool,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that logs every mutation at debug level.
    pub fn with_tracing(trace_queries: bool) -> Self {
        Self {
            tables: Mutex::default(),
            trace_queries,
        }
    }

    // Every critical section below restores the indexes before it can panic,
    // so a poisoned lock still guards consistent tables.
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row for `identity`.
    ///
    /// Returns `None` without touching the table when a live row already holds
    /// the same `(team_id, box_id)` or the same socket id. The check and the
    /// insert happen under one lock acquisition.
    pub fn insert(&self, identity: BotIdentity) -> Option<BotRecord> {
        let mut tables = self.lock();
        let key = (identity.team_id.clone(), identity.box_id.clone());
        if tables.by_team_box.contains_key(&key) || tables.rows.contains_key(&identity.socket_id) {
            if self.trace_queries {
                tracing::debug!(
                    "store insert rejected: duplicate socket {} for team {} on box {}",
                    identity.socket_id,
                    identity.team_id,
                    identity.box_id
                );
            }
            return None;
        }

        tables.next_id += 1;
        let record = BotRecord::from_identity(BotId(tables.next_id), identity);
        tables.index(&record);
        tables.rows.insert(record.socket_id, record.clone());

        if self.trace_queries {
            tracing::debug!(
                "store insert {} ({}) for team '{}' on {}",
                record.id,
                record.socket_id,
                record.team_name,
                record.box_name
            );
        }
        Some(record)
    }

    /// Remove and return the row owned by `socket_id`, if any.
    pub fn delete_by_socket_id(&self, socket_id: SocketId) -> Option<BotRecord> {
        let mut tables = self.lock();
        let record = tables.rows.remove(&socket_id)?;
        tables.unindex(&record);
        if self.trace_queries {
            tracing::debug!("store delete {} ({socket_id})", record.id);
        }
        Some(record)
    }

    pub fn all_records(&self) -> Vec<BotRecord> {
        self.lock().rows.values().cloned().collect()
    }

    pub fn by_box_id(&self, box_id: &str) -> Vec<BotRecord> {
        let tables = self.lock();
        tables.select(&tables.by_box_id, box_id)
    }

    pub fn by_team_name(&self, team_name: &str) -> Vec<BotRecord> {
        let tables = self.lock();
        tables.select(&tables.by_team_name, team_name)
    }

    pub fn by_socket_id(&self, socket_id: SocketId) -> Option<BotRecord> {
        self.lock().rows.get(&socket_id).cloned()
    }

    pub fn count_by_team_name(&self, team_name: &str) -> usize {
        self.lock().by_team_name.get(team_name).map_or(0, HashSet::len)
    }

    pub fn count_by_team_id(&self, team_id: &str) -> usize {
        self.lock().by_team_id.get(team_id).map_or(0, HashSet::len)
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Whether a live row already holds `(team_id, box_id)`.
    pub fn is_duplicate(&self, team_id: &str, box_id: &str) -> bool {
        self.lock()
            .by_team_box
            .contains_key(&(team_id.to_string(), box_id.to_string()))
    }

    /// Adjust `total_reward` of every row of `team_name` by `amount`.
    ///
    /// Negative amounts are allowed; the accumulator saturates at zero instead
    /// of rejecting the adjustment. Returns the number of rows touched.
    pub fn add_reward(&self, team_name: &str, amount: i64) -> usize {
        let mut tables = self.lock();
        let Some(ids) = tables.by_team_name.get(team_name).cloned() else {
            return 0;
        };

        let mut updated = 0;
        for sid in ids {
            if let Some(row) = tables.rows.get_mut(&sid) {
                row.total_reward = if amount >= 0 {
                    row.total_reward.saturating_add(amount.unsigned_abs())
                } else {
                    row.total_reward.saturating_sub(amount.unsigned_abs())
                };
                updated += 1;
            }
        }

        if self.trace_queries {
            tracing::debug!("store add_reward {amount} to {updated} rows of team '{team_name}'");
        }
        updated
    }
}

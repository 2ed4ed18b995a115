//! BotManager: coordinates the registry store with live socket handles.
//!
//! Owns the socket id → bot handle map and the team → monitor subscriptions,
//! and implements the connect / disconnect / reward / notify workflow.
//!
//! Lock discipline: a store call always completes and releases the store lock
//! before either manager map is locked, and the two manager maps are never
//! held together. Deliveries to collaborator sockets run on spawned tasks
//! after every lock is released.
//!
//! Each subscribed monitor owns a single delivery task fed by a `watch`
//! channel. Notifications only bump the channel; the task reads the team's
//! box list when it wakes, so rapid changes coalesce and the last update a
//! monitor receives always reflects the latest store state.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::BotnetConfig;
use crate::error::{RegistryError, SocketError};
use crate::record::{BotRecord, BoxSummary, SocketId};
use crate::socket::{BotHandle, BotSocket, MonitorHandle, MonitorSocket, Nonce};
use crate::store::RegistryStore;
use crate::sweep::SweepReport;

/// Live bot handles, keyed by socket id.
#[derive(Default)]
struct BotTable {
    sockets: HashMap<SocketId, BotHandle>,
    /// Rows deleted from the store before `add_bot` got to wire their handle.
    /// The pending wiring consumes the marker instead of inserting.
    orphaned: HashSet<SocketId>,
}

/// A subscribed monitor and the wake-up channel of its delivery task.
/// Dropping the entry closes the channel and ends the task.
struct Subscriber {
    socket: MonitorHandle,
    wake: watch::Sender<u64>,
}

type MonitorTable = HashMap<String, HashMap<SocketId, Subscriber>>;

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared registry of connected bots and team monitors.
///
/// Construct once at startup and share through an `Arc`.
pub struct BotManager {
    store: Arc<RegistryStore>,
    bots: Mutex<BotTable>,
    monitors: Mutex<MonitorTable>,
    nonce_bytes: usize,
}

impl Default for BotManager {
    fn default() -> Self {
        Self::new(&BotnetConfig::default())
    }
}

impl BotManager {
    pub fn new(config: &BotnetConfig) -> Self {
        Self {
            store: Arc::new(RegistryStore::with_tracing(config.store.trace_queries)),
            bots: Mutex::default(),
            monitors: Mutex::default(),
            nonce_bytes: config.sweep.nonce_bytes,
        }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    /// Register a newly connected bot.
    ///
    /// Returns `Ok(false)` when the team already has a live bot on the same
    /// box; nothing changes and no monitor is notified. On success the team's
    /// monitors receive the updated box list.
    ///
    /// If the bot disconnects between the insert and the wiring of its
    /// handle, the row is already gone and `remove_bot` has notified the
    /// team. The call still returns `Ok(true)` so that it pairs with that
    /// successful `remove_bot`, but nothing is wired and no second update
    /// is sent.
    pub fn add_bot(&self, socket: BotHandle) -> Result<bool, RegistryError> {
        let identity = socket.identity();
        if let Err(e) = identity.validate() {
            tracing::error!("Rejecting bot connection: {e}");
            return Err(e);
        }
        let team_id = identity.team_id.clone();
        let box_id = identity.box_id.clone();
        let socket_id = identity.socket_id;

        let Some(record) = self.store.insert(identity) else {
            tracing::debug!("Duplicate bot for team {team_id} on box {box_id} ({socket_id})");
            return Ok(false);
        };

        if !self.attach(socket) {
            tracing::debug!(
                "Bot {} disconnected before registration completed",
                record.socket_id
            );
            return Ok(true);
        }
        tracing::debug!(
            "Bot {} connected for team '{}' on {} from {}",
            record.id,
            record.team_name,
            record.box_name,
            record.remote_address
        );
        self.notify_monitors(&record.team_name);
        Ok(true)
    }

    /// Wire the handle for a row that was just inserted. Returns false when a
    /// concurrent `remove_bot` already deleted the row.
    fn attach(&self, socket: BotHandle) -> bool {
        let socket_id = socket.socket_id();
        let mut bots = relock(&self.bots);
        if bots.orphaned.remove(&socket_id) {
            return false;
        }
        bots.sockets.insert(socket_id, socket);
        true
    }

    /// Drop a disconnected bot. Returns whether it was registered.
    ///
    /// Removing an unknown bot is an expected race and only logged.
    pub fn remove_bot(&self, socket: &dyn BotSocket) -> bool {
        let socket_id = socket.socket_id();
        let Some(record) = self.store.delete_by_socket_id(socket_id) else {
            tracing::debug!("Failed to remove bot '{socket_id}': not registered");
            return false;
        };

        {
            let mut bots = relock(&self.bots);
            if bots.sockets.remove(&socket_id).is_none() {
                bots.orphaned.insert(socket_id);
            }
        }
        tracing::debug!(
            "Removing bot '{}' at {}",
            record.team_id,
            record.remote_address
        );
        self.notify_monitors(&record.team_name);
        true
    }

    /// Whether the bot's `(team_id, box_id)` is already live.
    pub fn is_duplicate(&self, socket: &dyn BotSocket) -> Result<bool, RegistryError> {
        let identity = socket.identity();
        identity.validate()?;
        Ok(self.store.is_duplicate(&identity.team_id, &identity.box_id))
    }

    /// Subscribe a monitor to its team. Returns false if it was already subscribed.
    ///
    /// A new subscriber gets its own delivery task; it receives nothing until
    /// the team next changes.
    pub fn add_monitor(&self, socket: MonitorHandle) -> bool {
        let team = socket.team_name().to_string();
        let socket_id = socket.socket_id();
        let mut monitors = relock(&self.monitors);
        let subscribers = monitors.entry(team).or_default();
        if subscribers.contains_key(&socket_id) {
            return false;
        }
        let (wake, woken) = watch::channel(0);
        spawn_delivery(Arc::clone(&self.store), Arc::clone(&socket), woken);
        subscribers.insert(socket_id, Subscriber { socket, wake });
        true
    }

    /// Unsubscribe a monitor and stop its delivery task. Empty team entries
    /// are kept.
    pub fn remove_monitor(&self, socket: &dyn MonitorSocket) -> bool {
        let socket_id = socket.socket_id();
        let removed = relock(&self.monitors)
            .get_mut(socket.team_name())
            .and_then(|subscribers| subscribers.remove(&socket_id))
            .is_some();
        if !removed {
            tracing::debug!("Monitor {socket_id} was not subscribed");
        }
        removed
    }

    /// Wake the delivery task of each of the team's monitors.
    ///
    /// Returns the number of monitors signalled. Each task then pushes the
    /// team's current box list; one slow or failing monitor never holds up
    /// the others or the caller.
    pub fn notify_monitors(&self, team_name: &str) -> usize {
        let monitors = relock(&self.monitors);
        let Some(subscribers) = monitors.get(team_name) else {
            return 0;
        };
        if !subscribers.is_empty() {
            tracing::debug!(
                "Sending update to {team_name} ({} monitors)",
                subscribers.len()
            );
        }
        for subscriber in subscribers.values() {
            subscriber.wake.send_modify(|generation| *generation += 1);
        }
        subscribers.len()
    }

    /// Current `(remote_address, box_name, total_reward)` rows for a team,
    /// ordered by box name.
    pub fn get_boxes(&self, team_name: &str) -> Vec<BoxSummary> {
        team_boxes(&self.store, team_name)
    }

    /// Credit every live bot of `team_name` with `amount`.
    ///
    /// Monitors are not notified; they see the new totals with the next
    /// connect or disconnect on the team.
    pub fn add_rewards(&self, team_name: &str, amount: i64) -> usize {
        self.store.add_reward(team_name, amount)
    }

    /// Ping every live bot and monitor with a fresh nonce.
    ///
    /// Dead connections are detected by the transport, which then calls
    /// `remove_bot` / `remove_monitor`.
    pub fn ping_all(&self) -> SweepReport {
        tracing::info!("Pinging open botnet websockets");
        let bots: Vec<BotHandle> = relock(&self.bots).sockets.values().cloned().collect();
        let monitors: Vec<MonitorHandle> = relock(&self.monitors)
            .values()
            .flat_map(|subs| subs.values().map(|sub| Arc::clone(&sub.socket)))
            .collect();

        for bot in &bots {
            let bot = bot.clone();
            let nonce = Nonce::random(self.nonce_bytes);
            dispatch("ping", bot.socket_id(), async move { bot.ping(nonce).await });
        }
        for monitor in &monitors {
            let monitor = monitor.clone();
            let nonce = Nonce::random(self.nonce_bytes);
            dispatch("ping", monitor.socket_id(), async move {
                monitor.ping(nonce).await
            });
        }

        SweepReport {
            bots: bots.len(),
            monitors: monitors.len(),
        }
    }

    /// Handles of every registered bot.
    pub fn bots(&self) -> Vec<BotHandle> {
        self.handles_for(self.store.all_records())
    }

    pub fn bots_by_box(&self, box_id: &str) -> Vec<BotHandle> {
        self.handles_for(self.store.by_box_id(box_id))
    }

    pub fn bots_by_team(&self, team_name: &str) -> Vec<BotHandle> {
        self.handles_for(self.store.by_team_name(team_name))
    }

    fn handles_for(&self, records: Vec<BotRecord>) -> Vec<BotHandle> {
        let bots = relock(&self.bots);
        records
            .iter()
            .filter_map(|r| bots.sockets.get(&r.socket_id).cloned())
            .collect()
    }

    pub fn count_by_team(&self, team_name: &str) -> usize {
        self.store.count_by_team_name(team_name)
    }

    pub fn count_by_team_id(&self, team_id: &str) -> usize {
        self.store.count_by_team_id(team_id)
    }

    /// Number of wired bot handles.
    pub fn bot_count(&self) -> usize {
        relock(&self.bots).sockets.len()
    }

    pub fn monitor_count(&self, team_name: &str) -> usize {
        relock(&self.monitors).get(team_name).map_or(0, HashMap::len)
    }
}

fn team_boxes(store: &RegistryStore, team_name: &str) -> Vec<BoxSummary> {
    let mut boxes: Vec<BoxSummary> = store
        .by_team_name(team_name)
        .iter()
        .map(BotRecord::summary)
        .collect();
    boxes.sort_by(|a, b| {
        a.box_name
            .cmp(&b.box_name)
            .then_with(|| a.remote_address.cmp(&b.remote_address))
    });
    boxes
}

/// Push the team's box list to `monitor` each time `wake` changes, one update
/// at a time. Ends once the subscriber entry, and with it the sender, is gone.
fn spawn_delivery(
    store: Arc<RegistryStore>,
    monitor: MonitorHandle,
    mut wake: watch::Receiver<u64>,
) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(
            "No async runtime available, monitor {} will not receive updates",
            monitor.socket_id()
        );
        return;
    };
    runtime.spawn(async move {
        while wake.changed().await.is_ok() {
            let boxes = team_boxes(&store, monitor.team_name());
            if let Err(e) = monitor.update(boxes).await {
                tracing::warn!("Failed to deliver update to {}: {e}", monitor.socket_id());
            }
        }
    });
}

/// Fire-and-forget delivery to one socket. Failures are logged, never returned.
fn dispatch<F>(what: &'static str, socket_id: SocketId, delivery: F)
where
    F: Future<Output = Result<(), SocketError>> + Send + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!("No async runtime available, dropping {what} for {socket_id}");
        return;
    };
    runtime.spawn(async move {
        if let Err(e) = delivery.await {
            tracing::warn!("Failed to deliver {what} to {socket_id}: {e}");
        }
    });
}

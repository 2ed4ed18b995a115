//! Periodic keep-alive sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::manager::BotManager;

/// Pings dispatched by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub bots: usize,
    pub monitors: usize,
}

/// Run [`BotManager::ping_all`] every `period` until `token` is cancelled.
///
/// The first sweep happens one full period after the call.
pub fn spawn_sweeper(
    manager: Arc<BotManager>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately once
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = manager.ping_all();
                    tracing::debug!(
                        "Sweep pinged {} bots and {} monitors",
                        report.bots,
                        report.monitors
                    );
                }
            }
        }
        tracing::info!("Keep-alive sweeper stopped");
    })
}

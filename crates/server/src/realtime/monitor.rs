//! Background database health monitor.
//!
//! Pings the pool on a fixed interval and broadcasts `db-status` whenever
//! reachability changes.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use sample_depot_core::events::ServerEvent;

use super::hub::EventHub;

/// Spawn the monitor. It runs until the runtime shuts down.
#[must_use]
pub fn spawn_db_monitor(pool: PgPool, hub: EventHub, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut connected = true;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = sqlx::query("SELECT 1").execute(&pool).await.is_ok();
            if let Some(event) = transition(&mut connected, reachable) {
                hub.broadcast(event);
            }
        }
    })
}

/// Record the latest ping result, returning the event to publish on a change.
fn transition(connected: &mut bool, reachable: bool) -> Option<ServerEvent> {
    if *connected == reachable {
        return None;
    }
    *connected = reachable;
    if reachable {
        tracing::info!("Database connection restored");
    } else {
        tracing::warn!("Database connection lost");
    }
    Some(ServerEvent::DbStatus {
        connected: reachable,
    })
}

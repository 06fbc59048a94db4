// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Publisher (spec §4.C): fans out registry mutations to WebSocket
//! subscribers. One internal `tokio::sync::broadcast` channel carries every
//! message; each subscriber gets its own bounded `mpsc` relay so a slow
//! reader never backs up the others — an overflowing relay is simply
//! dropped, per spec ("on overflow, drop the subscriber").

use std::sync::{Arc, LazyLock};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::modules::registry::AccountStatus;
use crate::modules::scheduler::periodic::{PeriodicTask, TaskHandle};
use crate::utc_now;

pub static PUBLISHER: LazyLock<Arc<Publisher>> = LazyLock::new(|| Arc::new(Publisher::new()));

/// Heartbeat interval (spec §4.C: "every 30 s, send a ping").
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
/// Per-subscriber bounded relay capacity (spec §4.C: "e.g., 64").
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMsg {
    StatusUpdate { data: Option<AccountStatus>, ts: i64 },
    RecentRuns { data: Vec<AccountStatus> },
    Ping,
}

pub struct Publisher {
    tx: broadcast::Sender<WsServerMsg>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Enqueues one `{type:"status_update", data, ts}` message. Called after
    /// every Registry mutation (start/update/increment/complete).
    pub fn publish_status(&self, data: Option<AccountStatus>) {
        let _ = self.tx.send(WsServerMsg::StatusUpdate {
            data,
            ts: utc_now!(),
        });
    }

    /// Registers a new subscriber and returns the receiving half of its
    /// bounded relay. The relay task exits (closing the channel) as soon as
    /// the subscriber falls behind by `SUBSCRIBER_QUEUE_CAPACITY` messages or
    /// the broadcast channel is dropped.
    pub fn subscribe(&self) -> mpsc::Receiver<WsServerMsg> {
        let mut broadcast_rx = self.tx.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        if tx.try_send(msg).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }

    /// Starts the 30-second heartbeat loop, reusing the scheduler's named
    /// periodic-task runner rather than hand-rolling another `tokio::spawn`
    /// + `interval` pair.
    pub fn start_heartbeat(self: &std::sync::Arc<Self>) -> TaskHandle {
        let publisher = self.clone();
        PeriodicTask::new("publisher-heartbeat").start(
            move |_| {
                let publisher = publisher.clone();
                async move {
                    let _ = publisher.tx.send(WsServerMsg::Ping);
                    Ok(())
                }
            },
            None,
            std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            false,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_snapshot_then_updates() {
        let publisher = Publisher::new();
        let mut rx = publisher.subscribe();
        publisher.publish_status(None);
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, WsServerMsg::StatusUpdate { data: None, .. }));
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_dropped() {
        let publisher = Publisher::new();
        let mut rx = publisher.subscribe();
        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 10) {
            publisher.publish_status(None);
        }
        // Give the relay task a chance to observe the full channel and exit.
        tokio::task::yield_now().await;
        // Draining never panics even though some messages were dropped.
        while rx.try_recv().is_ok() {}
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Scheduler (spec §4.F): a single long-lived driver that wakes every
//! `scanInterval`, sweeps active accounts sequentially through the Pipeline,
//! and backs off an account that keeps failing. Generalizes the teacher's
//! named `PeriodicTask` loop (one `tokio::spawn` selecting over an interval
//! tick, a wake signal, and the process-wide shutdown broadcast) into a
//! driver with its own start/stop lifecycle and per-account backoff state.

pub mod periodic;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::modules::account::entity::Account;
use crate::modules::common::signal::SIGNAL_MANAGER;
use crate::modules::error::PipelineError;
use crate::modules::gate::Source;
use crate::modules::pipeline::{Pipeline, PIPELINE};
use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;

/// Process-wide scheduler driving the process-wide `Pipeline` singleton.
/// Started and stopped from the REST surface and from `main` at startup.
pub static SCHEDULER: LazyLock<Arc<Scheduler>> = LazyLock::new(|| {
    Scheduler::new(
        PIPELINE.clone(),
        Duration::from_secs(SETTINGS.cat_emails_scan_interval_secs),
    )
});

/// Cap on a single account's backoff window (spec §4.E error semantics:
/// "double the per-account next-eligible time, cap at 30 min, reset on
/// success").
const MAX_BACKOFF_MS: i64 = 30 * 60 * 1000;

fn next_backoff_ms(current_ms: i64) -> i64 {
    current_ms.saturating_mul(2).min(MAX_BACKOFF_MS)
}

struct AccountBackoff {
    next_eligible_at: i64,
    current_backoff_ms: i64,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    scan_interval: Duration,
    backoff: Mutex<HashMap<String, AccountBackoff>>,
    stop_flag: AtomicBool,
    wake: Notify,
    running: AtomicBool,
    next_execution_at: AtomicI64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, scan_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            scan_interval,
            backoff: Mutex::new(HashMap::new()),
            stop_flag: AtomicBool::new(false),
            wake: Notify::new(),
            running: AtomicBool::new(false),
            next_execution_at: AtomicI64::new(0),
            task: Mutex::new(None),
        })
    }

    /// `Start()`: spawns the driver loop. A no-op if already running.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_flag.store(false, Ordering::SeqCst);
        let scheduler = self.clone();
        let handle = tokio::spawn(async move { scheduler.run_loop().await });
        *self.task.lock().expect("scheduler mutex poisoned") = Some(handle);
    }

    /// `Stop()`: returns after the current account finishes (graceful) or
    /// immediately if the loop is currently sleeping between ticks.
    pub async fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        let handle = self.task.lock().expect("scheduler mutex poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `NextExecutionAt()`: `None` while stopped, otherwise the epoch-millis
    /// timestamp of the next scheduled tick.
    pub fn next_execution_at(&self) -> Option<i64> {
        self.running()
            .then(|| self.next_execution_at.load(Ordering::SeqCst))
    }

    async fn run_loop(self: Arc<Self>) {
        let mut shutdown = SIGNAL_MANAGER.subscribe();
        info!("scheduler started, scanning every {:?}", self.scan_interval);

        loop {
            let next_at = utc_now!() + self.scan_interval.as_millis() as i64;
            self.next_execution_at.store(next_at, Ordering::SeqCst);

            tokio::select! {
                _ = tokio::time::sleep(self.scan_interval) => {}
                _ = self.wake.notified() => {}
                _ = shutdown.recv() => {
                    info!("scheduler shutting down due to process shutdown signal");
                    break;
                }
            }

            if self.stop_flag.load(Ordering::SeqCst) {
                info!("scheduler stopped while idle");
                break;
            }

            self.tick().await;

            if self.stop_flag.load(Ordering::SeqCst) {
                info!("scheduler stopped after completing its current account");
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    /// One sweep: every active, currently-eligible account runs in turn. No
    /// concurrent accounts across the scheduler — per-account concurrency
    /// with manual triggers is still enforced by the Gate.
    async fn tick(&self) {
        let accounts = match Account::list_active().await {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(error = %e, "failed to list active accounts for scheduler tick");
                return;
            }
        };

        for account in accounts {
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }
            if !self.is_eligible(&account.address) {
                continue;
            }

            let outcome = self
                .pipeline
                .run(&account.address, Source::Schedule, CancellationToken::new())
                .await;

            match outcome {
                Ok(()) => self.reset_backoff(&account.address),
                Err(PipelineError::Busy { .. }) => {
                    // A manual trigger holds the lease; skip this account this tick.
                }
                Err(e) => {
                    warn!(error = %e, account = %account.address, "scheduled run failed");
                    self.bump_backoff(&account.address);
                }
            }
        }
    }

    fn is_eligible(&self, account: &str) -> bool {
        let guard = self.backoff.lock().expect("scheduler mutex poisoned");
        guard
            .get(account)
            .map(|b| utc_now!() >= b.next_eligible_at)
            .unwrap_or(true)
    }

    fn bump_backoff(&self, account: &str) {
        let mut guard = self.backoff.lock().expect("scheduler mutex poisoned");
        let entry = guard.entry(account.to_string()).or_insert(AccountBackoff {
            next_eligible_at: 0,
            current_backoff_ms: self.scan_interval.as_millis() as i64,
        });
        entry.current_backoff_ms = next_backoff_ms(entry.current_backoff_ms);
        entry.next_eligible_at = utc_now!() + entry.current_backoff_ms;
    }

    fn reset_backoff(&self, account: &str) {
        self.backoff
            .lock()
            .expect("scheduler mutex poisoned")
            .remove(account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut ms = 300_000; // 5 min starting point
        ms = next_backoff_ms(ms);
        assert_eq!(ms, 600_000);
        for _ in 0..10 {
            ms = next_backoff_ms(ms);
        }
        assert_eq!(ms, MAX_BACKOFF_MS);
    }
}

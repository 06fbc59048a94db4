// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Status Registry (spec §4.B): the in-memory mirror of whichever run is
//! currently active per account, plus a bounded ring of recently completed
//! runs. One mutex guards both structures — readers get deep copies, writers
//! go through the methods below only.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex};

use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::audit::run::RunCounters;
use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::modules::settings::cli::SETTINGS;
use crate::{raise_error, utc_now};

pub static REGISTRY: LazyLock<Arc<StatusRegistry>> =
    LazyLock::new(|| Arc::new(StatusRegistry::new(SETTINGS.cat_emails_max_recent_runs)));

/// Registry-level run state (spec §4.B), distinct from `audit::run::RunOutcome`:
/// the audit store only records started/completed/error, but subscribers want
/// the finer-grained progress the pipeline moves through between those.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Enum)]
pub enum RunState {
    Connecting,
    Fetching,
    Processing,
    Categorizing,
    Labeling,
    Completed,
    Error,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Error)
    }
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, Object)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

/// A handle to one live session, returned by `Start` and threaded through
/// every subsequent mutator. A handle whose `run_id` no longer matches the
/// live slot for its account is stale and every mutator treats it as a no-op
/// — this is what lets a cancelled or already-completed run's lingering
/// references fail silently instead of corrupting the next run's status.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub account: String,
    pub run_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Object)]
pub struct AccountStatus {
    pub account: String,
    pub run_id: String,
    pub state: RunState,
    pub current_step: String,
    pub counters: RunCounters,
    pub error_message: Option<String>,
    pub progress: Progress,
    pub start_time: i64,
    pub last_updated: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Object)]
pub struct Statistics {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub success_rate: f64,
    pub avg_duration_sec: f64,
}

struct RegistryInner {
    live: HashMap<String, AccountStatus>,
    ring: VecDeque<AccountStatus>,
}

/// Default ring capacity absent an explicit override (spec §3 AccountStatus:
/// "bounded ring, default capacity 50").
pub const DEFAULT_RING_CAPACITY: usize = 50;

pub struct StatusRegistry {
    inner: Mutex<RegistryInner>,
    ring_capacity: usize,
}

impl StatusRegistry {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                live: HashMap::new(),
                ring: VecDeque::new(),
            }),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// `Start(account) -> sessionHandle`: fails with `ErrBusy` if the account
    /// already has a live session.
    pub fn start(&self, account: &str, run_id: &str) -> PipelineResult<SessionHandle> {
        let mut guard = self.inner.lock().expect("registry mutex poisoned");
        if guard.live.contains_key(account) {
            return Err(raise_error!(
                format!("account '{account}' already has an active run"),
                ErrorCode::Busy
            ));
        }
        let now = utc_now!();
        guard.live.insert(
            account.to_string(),
            AccountStatus {
                account: account.to_string(),
                run_id: run_id.to_string(),
                state: RunState::Connecting,
                current_step: "connecting".to_string(),
                counters: RunCounters::default(),
                error_message: None,
                progress: Progress::default(),
                start_time: now,
                last_updated: now,
            },
        );
        Ok(SessionHandle {
            account: account.to_string(),
            run_id: run_id.to_string(),
        })
    }

    fn with_live_mut(&self, handle: &SessionHandle, f: impl FnOnce(&mut AccountStatus)) {
        let mut guard = self.inner.lock().expect("registry mutex poisoned");
        if let Some(status) = guard.live.get_mut(&handle.account) {
            if status.run_id == handle.run_id {
                f(status);
                status.last_updated = utc_now!();
            }
        }
    }

    pub fn update(
        &self,
        handle: &SessionHandle,
        state: RunState,
        step: &str,
        progress: Option<Progress>,
        error: Option<String>,
    ) {
        self.with_live_mut(handle, |status| {
            status.state = state;
            status.current_step = step.to_string();
            if let Some(progress) = progress {
                status.progress = progress;
            }
            if error.is_some() {
                status.error_message = error;
            }
        });
    }

    fn increment(&self, handle: &SessionHandle, n: u64, apply: impl FnOnce(&mut RunCounters, u64)) {
        if n == 0 {
            return;
        }
        self.with_live_mut(handle, |status| apply(&mut status.counters, n));
    }

    pub fn increment_categorized(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_categorized += n);
    }

    pub fn increment_skipped(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_skipped += n);
    }

    pub fn increment_deleted(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_deleted += n);
    }

    pub fn increment_archived(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_archived += n);
    }

    pub fn increment_processed(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_processed += n);
    }

    pub fn increment_errors(&self, handle: &SessionHandle, n: u64) {
        self.increment(handle, n, |c, n| c.emails_errors += n);
    }

    pub fn set_found(&self, handle: &SessionHandle, found: u64) {
        self.with_live_mut(handle, |status| status.counters.emails_found = found);
    }

    /// `Complete(handle)`: freezes the status, copies it into the ring
    /// (evicting the oldest entry past capacity), and releases the live
    /// slot. Returns the frozen snapshot for the caller to hand to the
    /// publisher.
    pub fn complete(
        &self,
        handle: &SessionHandle,
        final_state: RunState,
        error: Option<String>,
    ) -> Option<AccountStatus> {
        let mut guard = self.inner.lock().expect("registry mutex poisoned");
        let matches = guard
            .live
            .get(&handle.account)
            .map(|s| s.run_id == handle.run_id)
            .unwrap_or(false);
        if !matches {
            return None;
        }
        let mut status = guard.live.remove(&handle.account)?;
        status.state = final_state;
        status.error_message = error.or(status.error_message);
        status.last_updated = utc_now!();

        if guard.ring.len() >= self.ring_capacity {
            guard.ring.pop_front();
        }
        guard.ring.push_back(status.clone());
        Some(status)
    }

    /// `GetCurrent(account?) -> AccountStatus?`. With no account given,
    /// returns the most recently updated live session across all
    /// concurrently active accounts (manual triggers can run several
    /// accounts at once even though the scheduler drives them sequentially
    /// — see DESIGN.md).
    pub fn current(&self, account: Option<&str>) -> Option<AccountStatus> {
        let guard = self.inner.lock().expect("registry mutex poisoned");
        match account {
            Some(account) => guard.live.get(account).cloned(),
            None => guard
                .live
                .values()
                .max_by_key(|s| s.last_updated)
                .cloned(),
        }
    }

    pub fn recent_runs(&self, limit: usize) -> Vec<AccountStatus> {
        let guard = self.inner.lock().expect("registry mutex poisoned");
        guard
            .ring
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        let guard = self.inner.lock().expect("registry mutex poisoned");
        let total = guard.ring.len() as u64;
        if total == 0 {
            return Statistics::default();
        }
        let success = guard
            .ring
            .iter()
            .filter(|s| s.state == RunState::Completed)
            .count() as u64;
        let error = total - success;
        let total_duration: i64 = guard
            .ring
            .iter()
            .map(|s| (s.last_updated - s.start_time).max(0))
            .sum();
        Statistics {
            total,
            success,
            error,
            success_rate: success as f64 / total as f64,
            avg_duration_sec: (total_duration as f64 / total as f64) / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_fails_busy_for_second_concurrent_run() {
        let registry = StatusRegistry::new(10);
        let _first = registry.start("u@example.com", "run-1").unwrap();
        let second = registry.start("u@example.com", "run-2");
        assert!(second.is_err());
    }

    #[test]
    fn stale_handle_increments_are_no_ops() {
        let registry = StatusRegistry::new(10);
        let handle = registry.start("u@example.com", "run-1").unwrap();
        registry.complete(&handle, RunState::Completed, None);

        registry.increment_categorized(&handle, 5);
        assert!(registry.current(Some("u@example.com")).is_none());
    }

    #[test]
    fn complete_moves_status_into_ring_and_clears_live_slot() {
        let registry = StatusRegistry::new(10);
        let handle = registry.start("u@example.com", "run-1").unwrap();
        registry.increment_categorized(&handle, 3);
        let completed = registry.complete(&handle, RunState::Completed, None).unwrap();
        assert_eq!(completed.counters.emails_categorized, 3);
        assert!(registry.current(Some("u@example.com")).is_none());
        assert_eq!(registry.recent_runs(10).len(), 1);
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let registry = StatusRegistry::new(2);
        for i in 0..3 {
            let handle = registry
                .start("u@example.com", &format!("run-{i}"))
                .unwrap();
            registry.complete(&handle, RunState::Completed, None);
        }
        assert_eq!(registry.recent_runs(10).len(), 2);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(StatusRegistry::new(10));
        let handle = registry.start("u@example.com", "run-1").unwrap();

        let mut threads = Vec::new();
        for _ in 0..10 {
            let registry = registry.clone();
            let handle = handle.clone();
            threads.push(thread::spawn(move || {
                for _ in 0..5000 {
                    registry.increment_categorized(&handle, 1);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        let status = registry.current(Some("u@example.com")).unwrap();
        assert_eq!(status.counters.emails_categorized, 50_000);
    }
}

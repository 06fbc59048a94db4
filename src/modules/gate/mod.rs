// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Rate Gate & Single-Flight Map (spec §4.D): two in-process maps keyed by
//! account address, guarded by one mutex. Deliberately a plain
//! `std::sync::Mutex<HashMap<..>>` rather than `governor` — the policy here
//! is a single per-account cooldown timestamp, not a token bucket (`governor`
//! is reserved for REST-surface request throttling, an unrelated concern).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use serde::{Deserialize, Serialize};

use crate::modules::error::{code::ErrorCode, PipelineError, PipelineResult};
use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;

pub static GATE: LazyLock<Arc<RateGate>> =
    LazyLock::new(|| Arc::new(RateGate::new(SETTINGS.cat_emails_min_interval_secs)));

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Source {
    Schedule,
    Manual,
}

/// A held lease. Dropping it without calling `release` leaks the slot, so
/// the pipeline always releases from a `finally`-style path (see
/// `pipeline::Pipeline::run_after_lease`), not from `Drop` — matching the
/// spec's explicit `Release(lease)` operation rather than RAII semantics.
#[derive(Clone, Debug)]
pub struct Lease {
    pub account: String,
}

struct GateInner {
    active_leases: HashMap<String, ()>,
    last_manual_at: HashMap<String, i64>,
}

pub struct RateGate {
    inner: Mutex<GateInner>,
    min_interval_ms: i64,
}

impl RateGate {
    pub fn new(min_interval_secs: u64) -> Self {
        Self {
            inner: Mutex::new(GateInner {
                active_leases: HashMap::new(),
                last_manual_at: HashMap::new(),
            }),
            min_interval_ms: min_interval_secs as i64 * 1000,
        }
    }

    /// `Lease(account, source) -> lease | ErrBusy | ErrTooSoon`.
    pub fn lease(&self, account: &str, source: Source) -> PipelineResult<Lease> {
        let mut guard = self.inner.lock().expect("gate mutex poisoned");

        if guard.active_leases.contains_key(account) {
            return Err(PipelineError::Busy {
                message: format!("account '{account}' already has an active run"),
                location: snafu::Location::default(),
            });
        }

        if source == Source::Manual {
            if let Some(&last) = guard.last_manual_at.get(account) {
                let elapsed = utc_now!() - last;
                if elapsed < self.min_interval_ms {
                    let remaining_ms = self.min_interval_ms - elapsed;
                    return Err(PipelineError::TooSoon {
                        message: format!(
                            "manual trigger for '{account}' arrived before the minimum interval elapsed"
                        ),
                        retry_after_secs: (remaining_ms + 999) / 1000,
                        location: snafu::Location::default(),
                    });
                }
            }
        }

        guard.active_leases.insert(account.to_string(), ());
        if source == Source::Manual {
            guard.last_manual_at.insert(account.to_string(), utc_now!());
        }
        Ok(Lease {
            account: account.to_string(),
        })
    }

    pub fn release(&self, lease: Lease) {
        let mut guard = self.inner.lock().expect("gate mutex poisoned");
        guard.active_leases.remove(&lease.account);
    }

    #[cfg(test)]
    pub fn is_busy(&self, account: &str) -> bool {
        self.inner
            .lock()
            .expect("gate mutex poisoned")
            .active_leases
            .contains_key(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lease_for_same_account_is_busy() {
        let gate = RateGate::new(300);
        let lease = gate.lease("u@example.com", Source::Schedule).unwrap();
        let err = gate.lease("u@example.com", Source::Schedule).unwrap_err();
        assert!(matches!(err, PipelineError::Busy { .. }));
        gate.release(lease);
        assert!(gate.lease("u@example.com", Source::Schedule).is_ok());
    }

    #[test]
    fn distinct_accounts_do_not_contend() {
        let gate = RateGate::new(300);
        let _a = gate.lease("a@example.com", Source::Schedule).unwrap();
        assert!(gate.lease("b@example.com", Source::Schedule).is_ok());
    }

    #[test]
    fn manual_trigger_within_min_interval_is_too_soon() {
        let gate = RateGate::new(300);
        let lease = gate.lease("u@example.com", Source::Manual).unwrap();
        gate.release(lease);
        let err = gate.lease("u@example.com", Source::Manual).unwrap_err();
        assert!(matches!(err, PipelineError::TooSoon { .. }));
    }

    #[test]
    fn schedule_source_never_updates_manual_cooldown() {
        let gate = RateGate::new(300);
        let lease = gate.lease("u@example.com", Source::Schedule).unwrap();
        gate.release(lease);
        assert!(gate.lease("u@example.com", Source::Manual).is_ok());
    }
}

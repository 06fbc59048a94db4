// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The Account Pipeline (spec §4.E): the seven steps one invocation runs
//! through for a single account — connect, fetch, dedupe, snapshot the
//! policy, classify and act on each message, tally aggregates, and record
//! completion. Every collaborator is a trait object so the pipeline never
//! talks to a concrete mail provider or classifier directly.

pub mod message;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use backoff::{future::retry, Error as BackoffError, ExponentialBackoffBuilder};
use tokio_util::sync::CancellationToken;

use crate::modules::account::entity::Account;
use crate::modules::audit::aggregate::{Aggregate, AggregateDelta, Dimension};
use crate::modules::audit::dedup::DedupLedgerEntry;
use crate::modules::audit::run::{ProcessingRun, RunCounters};
use crate::modules::collaborators::unconfigured::{
    UnconfiguredClassifier, UnconfiguredMailStore, UnconfiguredPolicy, UnconfiguredTokenRefresher,
};
use crate::modules::collaborators::{
    Classifier, ConnectCredential, MailAction, MailStore, MessageEnvelope, Policy, PolicySnapshot,
};
use crate::modules::common::lru::TimedLruCache;
use crate::modules::credential::{self, TokenCache, TokenRefresher, TOKEN_CACHE};
use crate::modules::error::{PipelineError, PipelineResult};
use crate::modules::gate::{RateGate, Source, GATE};
use crate::modules::publisher::{Publisher, PUBLISHER};
use crate::modules::registry::{Progress, RunState, SessionHandle, StatusRegistry, REGISTRY};
use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;

use message::{category_for_domain, decide_action, extract_domain, CATEGORY_FALLBACK};

/// Retry policy for classifier calls (spec §4.E step 5: "exponential backoff
/// (base 1s, cap 30s, max 3 attempts)"). Exhausting retries never aborts the
/// run — the message falls back to `Other` and processing continues.
const MAX_CLASSIFY_ATTEMPTS: u32 = 3;
const CLASSIFY_BACKOFF_BASE: Duration = Duration::from_secs(1);
const CLASSIFY_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// How long a resolved OAuth access token may sit unused in the cache before
/// it's treated as expiring soon and refreshed proactively.
const TOKEN_REFRESH_SKEW: Duration = Duration::from_secs(300);

/// TTL for the cached policy snapshot (spec §4.E step 4: "short TTL cache").
const POLICY_SNAPSHOT_TTL: Duration = Duration::from_secs(60);

fn cancelled_error() -> PipelineError {
    PipelineError::Cancelled {
        message: "run was cancelled".to_string(),
        location: snafu::Location::default(),
    }
}

/// Races a future against the run's cancellation token so a suspension
/// point (network I/O, classifier call) can be interrupted immediately
/// rather than running to completion after `Stop()` (spec §4.F, scenario S5).
async fn checked<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(cancelled_error()),
        result = fut => result,
    }
}

/// Wires together the seven collaborators an account run touches: the mail
/// provider, the classifier, the policy service, the token refresher, and
/// the three in-process components (Registry, Publisher, Gate).
pub struct Pipeline {
    mail_store: Arc<dyn MailStore>,
    classifier: Arc<dyn Classifier>,
    policy: Arc<dyn Policy>,
    refresher: Arc<dyn TokenRefresher>,
    token_cache: Arc<TokenCache>,
    registry: Arc<StatusRegistry>,
    publisher: Arc<Publisher>,
    gate: Arc<RateGate>,
    policy_cache: TimedLruCache<(), PolicySnapshot>,
    default_lookback_hours: u32,
    run_timeout: Duration,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mail_store: Arc<dyn MailStore>,
        classifier: Arc<dyn Classifier>,
        policy: Arc<dyn Policy>,
        refresher: Arc<dyn TokenRefresher>,
        token_cache: Arc<TokenCache>,
        registry: Arc<StatusRegistry>,
        publisher: Arc<Publisher>,
        gate: Arc<RateGate>,
        default_lookback_hours: u32,
        run_timeout: Duration,
    ) -> Self {
        Self {
            mail_store,
            classifier,
            policy,
            refresher,
            token_cache,
            registry,
            publisher,
            gate,
            policy_cache: TimedLruCache::new(1, POLICY_SNAPSHOT_TTL),
            default_lookback_hours,
            run_timeout,
        }
    }

    /// Runs one invocation for `account`: acquires the gate lease, opens the
    /// audit row, drives the seven steps, and always releases the lease and
    /// closes out the run — success or failure — before returning. Used by
    /// the scheduler, which awaits the whole run before moving to the next
    /// account.
    pub async fn run(
        &self,
        account: &str,
        source: Source,
        cancel: CancellationToken,
    ) -> PipelineResult<()> {
        let lease = self.gate.lease(account, source)?;
        self.run_after_lease(account, lease, cancel, None).await
    }

    /// Checks the account exists and the gate will admit a manual run, then
    /// hands the already-held lease to a detached task and returns
    /// immediately. Lets the `POST .../process` endpoint answer 202 without
    /// the caller waiting out the whole run, while still closing the
    /// Busy/TooSoon race the naive "probe, release, respawn" approach would
    /// reopen between the two leases. `override_hours`, when set, replaces the
    /// account's normal lookback window for this one run (the `?hours=N`
    /// query parameter on the force-process endpoint).
    pub async fn trigger(
        self: &Arc<Self>,
        account: &str,
        override_hours: Option<u32>,
    ) -> PipelineResult<()> {
        Account::get(account).await?;
        let lease = self.gate.lease(account, Source::Manual)?;
        let pipeline = self.clone();
        let account = account.to_string();
        tokio::spawn(async move {
            if let Err(e) = pipeline
                .run_after_lease(&account, lease, CancellationToken::new(), override_hours)
                .await
            {
                tracing::warn!(error = %e, account, "manually triggered run failed");
            }
        });
        Ok(())
    }

    async fn run_after_lease(
        &self,
        account: &str,
        lease: crate::modules::gate::Lease,
        cancel: CancellationToken,
        override_hours: Option<u32>,
    ) -> PipelineResult<()> {
        let run_id = match ProcessingRun::start(account).await {
            Ok(id) => id,
            Err(e) => {
                self.gate.release(lease);
                return Err(e);
            }
        };

        let handle = match self.registry.start(account, &run_id) {
            Ok(h) => h,
            Err(e) => {
                if let Err(store_err) = ProcessingRun::complete(
                    &run_id,
                    RunCounters::default(),
                    false,
                    Some(e.message().to_string()),
                )
                .await
                {
                    tracing::error!(error = %store_err, run_id, "failed to close orphaned run row");
                }
                self.gate.release(lease);
                return Err(e);
            }
        };
        self.publisher.publish_status(self.registry.current(Some(account)));

        let outcome = match tokio::time::timeout(
            self.run_timeout,
            self.execute(account, &handle, &run_id, cancel.clone(), override_hours),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(PipelineError::Network {
                message: format!(
                    "run exceeded the {}s timeout",
                    self.run_timeout.as_secs()
                ),
                location: snafu::Location::default(),
            }),
        };

        let success = outcome.is_ok();
        let error_message = outcome.as_ref().err().map(|e| e.message().to_string());
        let final_state = if success {
            RunState::Completed
        } else {
            RunState::Error
        };

        let frozen = self.registry.complete(&handle, final_state, error_message.clone());
        if let Some(status) = &frozen {
            if let Err(e) = ProcessingRun::complete(
                &run_id,
                status.counters.clone(),
                success,
                error_message,
            )
            .await
            {
                tracing::error!(error = %e, run_id, "failed to persist final run counters");
            }
        }
        self.publisher.publish_status(frozen);
        self.gate.release(lease);

        if success {
            if let Err(e) = Account::record_scan(account, utc_now!()).await {
                tracing::warn!(error = %e, account, "failed to record last-scan timestamp");
            }
        }

        outcome
    }

    /// Steps 1-6: connect, fetch, dedupe, snapshot the policy, classify and
    /// act on each pending message, and tally aggregates. Step 7 (Complete)
    /// is the caller's responsibility since it must run regardless of which
    /// step here returns `Err`.
    async fn execute(
        &self,
        account: &str,
        handle: &SessionHandle,
        run_id: &str,
        cancel: CancellationToken,
        override_hours: Option<u32>,
    ) -> PipelineResult<()> {
        // Step 1: Connect.
        self.registry
            .update(handle, RunState::Connecting, "connecting", None, None);
        let account_row = Account::get(account).await?;
        let resolved = checked(
            &cancel,
            credential::resolve(
                account,
                &account_row.credential,
                &self.token_cache,
                self.refresher.as_ref(),
                TOKEN_REFRESH_SKEW,
            ),
        )
        .await?;
        let mut session = checked(
            &cancel,
            self.mail_store.connect(
                account,
                ConnectCredential {
                    app_password: resolved.app_password,
                    access_token: resolved.access_token,
                },
            ),
        )
        .await?;

        // Step 2: Fetch.
        self.registry
            .update(handle, RunState::Fetching, "fetching", None, None);
        let since_ms = match override_hours {
            Some(hours) => utc_now!() - (hours as i64) * 3_600_000,
            None => lookback_since(account_row.last_scan_at, self.default_lookback_hours),
        };
        let envelopes = match checked(&cancel, session.fetch_since(since_ms)).await {
            Ok(envelopes) => envelopes,
            Err(e) => {
                let _ = session.close().await;
                return Err(e);
            }
        };
        self.registry.set_found(handle, envelopes.len() as u64);

        // Step 3: Dedupe.
        let msg_ids: Vec<String> = envelopes.iter().map(|e| e.msg_id.clone()).collect();
        let total_found = msg_ids.len();
        let unprocessed: HashSet<String> =
            DedupLedgerEntry::filter_unprocessed(account, msg_ids)
                .await?
                .into_iter()
                .collect();
        let pending: Vec<&MessageEnvelope> = envelopes
            .iter()
            .filter(|e| unprocessed.contains(&e.msg_id))
            .collect();
        let already_seen = (total_found - pending.len()) as u64;
        self.registry.increment_skipped(handle, already_seen);

        // Step 4: Policy snapshot.
        self.registry
            .update(handle, RunState::Processing, "loading policy", None, None);
        let policy_snapshot = self.policy_snapshot().await?;

        // Step 5: per-message loop.
        self.registry
            .update(handle, RunState::Categorizing, "categorizing", None, None);
        let total = pending.len() as u64;
        let today = today_utc();
        let mut tallies: HashMap<(Dimension, String), u64> = HashMap::new();
        let mut processed = 0u64;

        for envelope in pending {
            if cancel.is_cancelled() {
                let _ = session.close().await;
                return Err(cancelled_error());
            }

            let domain = extract_domain(&envelope.from);
            let category = match category_for_domain(&domain, &policy_snapshot) {
                Some(shortcut) => shortcut.to_string(),
                None => {
                    let (category, errored) =
                        self.classify_with_fallback(&envelope.classify_text).await;
                    if errored {
                        self.registry.increment_errors(handle, 1);
                    }
                    category
                }
            };
            let action = decide_action(&category, &policy_snapshot);

            if let Err(e) = session.label(&envelope.msg_id, &category).await {
                tracing::warn!(error = %e, msg_id = %envelope.msg_id, "failed to label message");
            }

            if action != MailAction::Keep {
                match session.apply_action(&envelope.msg_id, action).await {
                    Ok(()) => match action {
                        MailAction::Delete => self.registry.increment_deleted(handle, 1),
                        MailAction::Archive => self.registry.increment_archived(handle, 1),
                        MailAction::Keep => {}
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, msg_id = %envelope.msg_id, "failed to apply action");
                    }
                }
            }

            DedupLedgerEntry::mark_processed(account, &envelope.msg_id, run_id).await?;

            *tallies.entry((Dimension::Category, category)).or_insert(0) += 1;
            *tallies
                .entry((Dimension::Sender, envelope.from.clone()))
                .or_insert(0) += 1;
            *tallies.entry((Dimension::Domain, domain)).or_insert(0) += 1;

            processed += 1;
            self.registry.increment_categorized(handle, 1);
            self.registry.increment_processed(handle, 1);
            self.registry.update(
                handle,
                RunState::Labeling,
                "labeling",
                Some(Progress {
                    current: processed,
                    total,
                }),
                None,
            );
        }

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, account, "error closing mail session");
        }

        // Step 6: Aggregate.
        let deltas: Vec<AggregateDelta> = tallies
            .into_iter()
            .map(|((dimension, dimension_key), count)| AggregateDelta {
                day: today.clone(),
                dimension,
                dimension_key,
                count,
            })
            .collect();
        if !deltas.is_empty() {
            Aggregate::upsert_many(account, deltas).await?;
        }

        Ok(())
    }

    /// Calls the classifier with exponential backoff; on exhausting
    /// `MAX_CLASSIFY_ATTEMPTS` the message is categorized `Other` instead of
    /// aborting the run (spec §4.E step 5, §7 "classifier unavailable"). The
    /// returned bool is `true` when retries were exhausted, so the caller can
    /// bump the per-message error counter (spec §4.E step 5a, invariant 3).
    async fn classify_with_fallback(&self, text: &str) -> (String, bool) {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(CLASSIFY_BACKOFF_BASE)
            .with_max_interval(CLASSIFY_BACKOFF_CAP)
            .with_max_elapsed_time(None)
            .build();
        let attempt = std::cell::Cell::new(0u32);

        let result = retry(policy, || async {
            attempt.set(attempt.get() + 1);
            match self.classifier.classify(text).await {
                Ok(category) => Ok(category),
                Err(e) if attempt.get() < MAX_CLASSIFY_ATTEMPTS => Err(BackoffError::transient(e)),
                Err(e) => Err(BackoffError::permanent(e)),
            }
        })
        .await;

        match result {
            Ok(category) => (category, false),
            Err(e) => {
                tracing::warn!(error = %e, "classifier exhausted retries, falling back to Other");
                (CATEGORY_FALLBACK.to_string(), true)
            }
        }
    }

    async fn policy_snapshot(&self) -> PipelineResult<PolicySnapshot> {
        if let Some(cached) = self.policy_cache.get(&()).await {
            return Ok((*cached).clone());
        }
        let snapshot = self.policy.snapshot().await?;
        self.policy_cache.set((), Arc::new(snapshot.clone())).await;
        Ok(snapshot)
    }
}

/// Process-wide pipeline instance wiring together the global Registry,
/// Publisher, Gate, and token cache with placeholder collaborators (spec
/// §6.4). A deployment that needs real mail/classifier/policy/OAuth
/// integrations replaces the four `Unconfigured*` constructions below with
/// its own types before building from source — the composition root is
/// deliberately this one spot.
pub static PIPELINE: LazyLock<Arc<Pipeline>> = LazyLock::new(|| {
    Arc::new(Pipeline::new(
        Arc::new(UnconfiguredMailStore),
        Arc::new(UnconfiguredClassifier),
        Arc::new(UnconfiguredPolicy),
        Arc::new(UnconfiguredTokenRefresher),
        TOKEN_CACHE.clone(),
        REGISTRY.clone(),
        PUBLISHER.clone(),
        GATE.clone(),
        SETTINGS.cat_emails_lookback_hours,
        Duration::from_secs(SETTINGS.cat_emails_run_timeout_secs),
    ))
});

/// The start of the fetch window: the account's last successful scan, or
/// `default_hours` before now for an account that has never completed one
/// (spec §4.E step 2, clamped to 1-168h by the settings layer).
fn lookback_since(last_scan_at: Option<i64>, default_hours: u32) -> i64 {
    match last_scan_at {
        Some(t) => t,
        None => utc_now!() - (default_hours as i64) * 3_600_000,
    }
}

/// UTC calendar day bucket used for aggregate keys (DESIGN.md: day-bucketing
/// timezone open question resolved as UTC).
fn today_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::modules::collaborators::{ConnectCredential, MailSession};
    use crate::modules::credential::{RefreshedToken, TokenCache, TokenRefresher};
    use crate::modules::gate::RateGate;
    use crate::modules::publisher::Publisher;
    use crate::modules::registry::StatusRegistry;

    struct FailingClassifier {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> PipelineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::Classifier {
                message: "classifier unreachable".to_string(),
                location: snafu::Location::default(),
            })
        }
    }

    struct UnusedMailStore;

    #[async_trait]
    impl MailStore for UnusedMailStore {
        async fn connect(
            &self,
            _account: &str,
            _credential: ConnectCredential,
        ) -> PipelineResult<Box<dyn MailSession>> {
            unreachable!("not exercised by this test")
        }
    }

    struct UnusedPolicy;

    #[async_trait]
    impl Policy for UnusedPolicy {
        async fn snapshot(&self) -> PipelineResult<PolicySnapshot> {
            unreachable!("not exercised by this test")
        }
    }

    struct UnusedRefresher;

    #[async_trait]
    impl TokenRefresher for UnusedRefresher {
        async fn refresh(&self, _refresh_token: &str) -> PipelineResult<RefreshedToken> {
            unreachable!("not exercised by this test")
        }
    }

    fn test_pipeline(classifier: Arc<dyn Classifier>) -> Pipeline {
        Pipeline::new(
            Arc::new(UnusedMailStore),
            classifier,
            Arc::new(UnusedPolicy),
            Arc::new(UnusedRefresher),
            Arc::new(TokenCache::new()),
            Arc::new(StatusRegistry::new(10)),
            Arc::new(Publisher::new()),
            Arc::new(RateGate::new(300)),
            2,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn classify_falls_back_to_other_after_max_attempts() {
        let classifier = Arc::new(FailingClassifier {
            calls: AtomicU32::new(0),
        });
        let pipeline = test_pipeline(classifier.clone());

        let (category, errored) = pipeline.classify_with_fallback("some message text").await;

        assert_eq!(category, CATEGORY_FALLBACK);
        assert!(errored);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), MAX_CLASSIFY_ATTEMPTS);
    }

    #[test]
    fn lookback_falls_back_to_default_window() {
        let since = lookback_since(None, 2);
        let expected = utc_now!() - 2 * 3_600_000;
        assert!((since - expected).abs() < 1000);
    }

    #[test]
    fn lookback_prefers_last_scan_timestamp() {
        assert_eq!(lookback_since(Some(42), 2), 42);
    }

    #[test]
    fn today_utc_is_a_date_string() {
        let day = today_utc();
        assert_eq!(day.len(), 10);
        assert_eq!(day.matches('-').count(), 2);
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{
    delete_impl, filter_by_secondary_key_impl, insert_impl, list_all_impl, update_impl,
};
use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::{raise_error, utc_now};

/// `ProcessingRun.state` (data model §3). Carried as a string column in the
/// embedded store (native_db secondary keys need `ToKey`, and `String` gets
/// us filterable equality for free) but surfaced over the wire as an enum.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Enum)]
pub enum RunOutcome {
    Started,
    Completed,
    Error,
}

impl RunOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Started => "started",
            RunOutcome::Completed => "completed",
            RunOutcome::Error => "error",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "completed" => RunOutcome::Completed,
            "error" => RunOutcome::Error,
            _ => RunOutcome::Started,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Object)]
pub struct RunCounters {
    pub emails_found: u64,
    pub emails_processed: u64,
    pub emails_categorized: u64,
    pub emails_skipped: u64,
    pub emails_deleted: u64,
    pub emails_archived: u64,
    /// Messages whose classifier call exhausted every retry and fell back to
    /// `Other` (spec §4.E step 5a, §7 `ErrClassifier`, invariant 3).
    pub emails_errors: u64,
}

impl RunCounters {
    fn merge(&mut self, delta: &RunCounters) {
        self.emails_found += delta.emails_found;
        self.emails_processed += delta.emails_processed;
        self.emails_categorized += delta.emails_categorized;
        self.emails_skipped += delta.emails_skipped;
        self.emails_deleted += delta.emails_deleted;
        self.emails_archived += delta.emails_archived;
        self.emails_errors += delta.emails_errors;
    }
}

/// One audit entry per pipeline invocation (data model §3). Never re-opened
/// once a terminal state is written.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct ProcessingRun {
    #[primary_key]
    pub run_id: String,
    #[secondary_key]
    pub account: String,
    #[secondary_key]
    pub state: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub current_step: String,
    pub counters: RunCounters,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Recorded state-transition timeline `[(state, t)]`.
    pub transitions: Vec<(String, i64)>,
}

impl ProcessingRun {
    /// `StartRun(account) -> runId`: inserts a row with state=started,
    /// start=now. The insert is the transaction boundary — either the whole
    /// row lands or nothing does.
    pub async fn start(account: &str) -> PipelineResult<String> {
        let run_id = Uuid::new_v4().to_string();
        let now = utc_now!();
        let run = ProcessingRun {
            run_id: run_id.clone(),
            account: account.to_string(),
            state: RunOutcome::Started.as_str().to_string(),
            start_time: now,
            end_time: None,
            current_step: "started".to_string(),
            counters: RunCounters::default(),
            error_message: None,
            created_at: now,
            updated_at: now,
            transitions: vec![(RunOutcome::Started.as_str().to_string(), now)],
        };
        insert_impl(DB_MANAGER.audit_db(), run).await?;
        Ok(run_id)
    }

    fn fetch(
        rw: &native_db::transaction::RwTransaction,
        run_id: &str,
    ) -> PipelineResult<ProcessingRun> {
        rw.get()
            .primary::<ProcessingRun>(run_id.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
            .ok_or_else(|| {
                raise_error!(
                    format!("run '{run_id}' not found"),
                    ErrorCode::InvalidState
                )
            })
    }

    /// Merges additive counters and the current step. Fails with
    /// `ErrInvalidState` if the run is unknown or already terminal — a
    /// terminal run is never mutated again.
    pub async fn update_counters(
        run_id: &str,
        delta: RunCounters,
        step: &str,
    ) -> PipelineResult<()> {
        let run_id = run_id.to_string();
        let step = step.to_string();
        update_impl(
            DB_MANAGER.audit_db(),
            {
                let run_id = run_id.clone();
                move |rw| {
                    let current = Self::fetch(rw, &run_id)?;
                    if current.state != RunOutcome::Started.as_str() {
                        return Err(raise_error!(
                            format!("run '{run_id}' is already terminal"),
                            ErrorCode::InvalidState
                        ));
                    }
                    Ok(current)
                }
            },
            move |current| {
                let mut updated = current.clone();
                updated.counters.merge(&delta);
                updated.current_step = step.clone();
                updated.updated_at = utc_now!();
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    /// Sets end=now, a terminal state, and writes final counters in one
    /// commit — the embedded-store equivalent of "a single UPDATE with
    /// additive deltas" since native_db has no cross-row UPDATE statement.
    pub async fn complete(
        run_id: &str,
        final_counters: RunCounters,
        success: bool,
        error_message: Option<String>,
    ) -> PipelineResult<()> {
        let run_id_owned = run_id.to_string();
        let outcome = if success {
            RunOutcome::Completed
        } else {
            RunOutcome::Error
        };
        update_impl(
            DB_MANAGER.audit_db(),
            {
                let run_id = run_id_owned.clone();
                move |rw| {
                    let current = Self::fetch(rw, &run_id)?;
                    if current.state != RunOutcome::Started.as_str() {
                        return Err(raise_error!(
                            format!("run '{run_id}' is already terminal"),
                            ErrorCode::InvalidState
                        ));
                    }
                    Ok(current)
                }
            },
            move |current| {
                let mut updated = current.clone();
                let now = utc_now!();
                updated.counters = final_counters.clone();
                updated.end_time = Some(now);
                updated.state = outcome.as_str().to_string();
                updated.error_message = error_message.clone();
                updated.updated_at = now;
                updated.transitions.push((outcome.as_str().to_string(), now));
                Ok(updated)
            },
        )
        .await?;
        Ok(())
    }

    pub async fn list(filter: RunFilter) -> PipelineResult<Vec<ProcessingRun>> {
        let mut runs = match &filter.account {
            Some(account) => {
                filter_by_secondary_key_impl::<ProcessingRun>(
                    DB_MANAGER.audit_db(),
                    ProcessingRunKey::account,
                    account.clone(),
                )
                .await?
            }
            None => list_all_impl(DB_MANAGER.audit_db()).await?,
        };

        if let Some(since) = filter.since {
            runs.retain(|r| r.start_time >= since);
        }
        if let Some(state) = &filter.state {
            runs.retain(|r| r.state == state.as_str());
        }
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        runs.truncate(filter.limit.unwrap_or(100).min(100));
        Ok(runs)
    }

    pub(crate) async fn delete_for_account(account: &str) -> PipelineResult<()> {
        let runs = filter_by_secondary_key_impl::<ProcessingRun>(
            DB_MANAGER.audit_db(),
            ProcessingRunKey::account,
            account.to_string(),
        )
        .await?;
        for run in runs {
            let run_id = run.run_id.clone();
            delete_impl(DB_MANAGER.audit_db(), move |rw| Self::fetch(rw, &run_id)).await?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunFilter {
    pub account: Option<String>,
    pub since: Option<i64>,
    pub state: Option<RunOutcome>,
    pub limit: Option<usize>,
}

/// `GetConnectionStatus()`: a cheap liveness probe for `/api/health`.
pub async fn connection_status() -> (bool, String, Option<String>) {
    match DB_MANAGER.audit_db().r_transaction() {
        Ok(_) => (true, "connected".to_string(), None),
        Err(e) => (false, "disconnected".to_string(), Some(format!("{e:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_round_trips_through_string() {
        assert_eq!(RunOutcome::parse("completed"), RunOutcome::Completed);
        assert_eq!(RunOutcome::parse("error"), RunOutcome::Error);
        assert_eq!(RunOutcome::parse("started"), RunOutcome::Started);
        assert_eq!(RunOutcome::parse("garbage"), RunOutcome::Started);
    }

    #[test]
    fn counters_merge_additively() {
        let mut counters = RunCounters {
            emails_found: 3,
            ..Default::default()
        };
        counters.merge(&RunCounters {
            emails_processed: 2,
            ..Default::default()
        });
        assert_eq!(counters.emails_found, 3);
        assert_eq!(counters.emails_processed, 2);
    }
}

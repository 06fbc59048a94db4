// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{
    delete_impl, filter_by_secondary_key_impl, find_impl, insert_impl,
};
use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::{raise_error, utc_now};

fn dedup_key(account: &str, msg_id: &str) -> String {
    format!("{account}|{msg_id}")
}

/// Tracks which messages a run has already acted on so a retried or
/// overlapping pass never re-labels or re-deletes the same message twice
/// (data model §3 DedupLedger, invariant "idempotent within a run").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 4, version = 1)]
#[native_db]
pub struct DedupLedgerEntry {
    #[primary_key]
    pub key: String,
    #[secondary_key]
    pub account: String,
    pub msg_id: String,
    pub run_id: String,
    pub processed_at: i64,
}

impl DedupLedgerEntry {
    /// `MarkProcessed(account, msgId, runId)`: records that a message has
    /// been handled. A second call for the same `(account, msgId)` is a
    /// silent no-op — callers rely on `filter_unprocessed` to avoid ever
    /// reaching this path for an already-seen message, but idempotency holds
    /// either way.
    pub async fn mark_processed(account: &str, msg_id: &str, run_id: &str) -> PipelineResult<()> {
        let key = dedup_key(account, msg_id);
        if find_impl::<DedupLedgerEntry>(DB_MANAGER.audit_db(), &key)?.is_some() {
            return Ok(());
        }
        insert_impl(
            DB_MANAGER.audit_db(),
            DedupLedgerEntry {
                key,
                account: account.to_string(),
                msg_id: msg_id.to_string(),
                run_id: run_id.to_string(),
                processed_at: utc_now!(),
            },
        )
        .await
    }

    /// `FilterUnprocessed(account, msgIds) -> msgIds`: the subset of message
    /// ids not yet recorded for this account, used by the pipeline's Filter
    /// step (§4.E) to skip messages a prior run already finished.
    pub async fn filter_unprocessed(
        account: &str,
        msg_ids: Vec<String>,
    ) -> PipelineResult<Vec<String>> {
        let mut unprocessed = Vec::with_capacity(msg_ids.len());
        for msg_id in msg_ids {
            let key = dedup_key(account, &msg_id);
            if find_impl::<DedupLedgerEntry>(DB_MANAGER.audit_db(), &key)?.is_none() {
                unprocessed.push(msg_id);
            }
        }
        Ok(unprocessed)
    }

    pub(crate) async fn delete_for_account(account: &str) -> PipelineResult<()> {
        let rows = filter_by_secondary_key_impl::<DedupLedgerEntry>(
            DB_MANAGER.audit_db(),
            DedupLedgerEntryKey::account,
            account.to_string(),
        )
        .await?;
        for row in rows {
            let key = row.key.clone();
            delete_impl(DB_MANAGER.audit_db(), move |rw| {
                rw.get()
                    .primary::<DedupLedgerEntry>(key.clone())
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("dedup entry '{key}' not found"),
                            ErrorCode::InternalError
                        )
                    })
            })
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_scoped_per_account() {
        let a = dedup_key("a@example.com", "msg-1");
        let b = dedup_key("b@example.com", "msg-1");
        assert_ne!(a, b);
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use native_db::*;
use native_model::{native_model, Model};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{
    delete_impl, filter_by_secondary_key_impl, insert_impl, update_impl,
};
use crate::modules::error::{code::ErrorCode, PipelineResult};
use crate::{raise_error, utc_now};

/// CategoryAggregate, SenderAggregate, and DomainAggregate (data model §3) are
/// three views over the same shape — a count bucketed by account, day, and
/// one dimension key. Folded into one table distinguished by `dimension`
/// rather than three near-identical ones.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Enum)]
pub enum Dimension {
    Category,
    Sender,
    Domain,
}

impl Dimension {
    fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Sender => "sender",
            Dimension::Domain => "domain",
        }
    }
}

fn composite_key(account: &str, day: &str, dimension: Dimension, key: &str) -> String {
    format!("{account}|{day}|{}|{key}", dimension.as_str())
}

/// One bucket: how many messages of `dimension = key` were seen for `account`
/// on `day` (day bucketing is UTC — the source leaves the timezone
/// unspecified, see DESIGN.md).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[native_model(id = 3, version = 1)]
#[native_db]
pub struct Aggregate {
    #[primary_key]
    pub key: String,
    #[secondary_key]
    pub account: String,
    pub day: String,
    pub dimension: Dimension,
    pub dimension_key: String,
    pub count: u64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Object)]
pub struct AggregateDelta {
    pub day: String,
    pub dimension: Dimension,
    pub dimension_key: String,
    pub count: u64,
}

impl Aggregate {
    /// `UpsertAggregates(deltas)`: each delta either creates its bucket or
    /// adds to the existing count. One delta, one transaction — callers
    /// batch these (see `audit::aggregate::upsert_many`) when the pipeline
    /// finishes a run.
    pub async fn upsert(account: &str, delta: AggregateDelta) -> PipelineResult<()> {
        let key = composite_key(account, &delta.day, delta.dimension, &delta.dimension_key);
        let account = account.to_string();
        let day = delta.day.clone();
        let dimension = delta.dimension;
        let dimension_key = delta.dimension_key.clone();
        let added = delta.count;

        let existing = {
            let key = key.clone();
            crate::modules::database::find_impl::<Aggregate>(DB_MANAGER.audit_db(), &key)?
        };

        match existing {
            Some(_) => {
                update_impl(
                    DB_MANAGER.audit_db(),
                    {
                        let key = key.clone();
                        move |rw| {
                            rw.get()
                                .primary::<Aggregate>(key.clone())
                                .map_err(|e| {
                                    raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
                                })?
                                .ok_or_else(|| {
                                    raise_error!(
                                        format!("aggregate '{key}' vanished"),
                                        ErrorCode::InternalError
                                    )
                                })
                        }
                    },
                    move |current| {
                        let mut updated = current.clone();
                        updated.count += added;
                        updated.updated_at = utc_now!();
                        Ok(updated)
                    },
                )
                .await?;
            }
            None => {
                insert_impl(
                    DB_MANAGER.audit_db(),
                    Aggregate {
                        key,
                        account,
                        day,
                        dimension,
                        dimension_key,
                        count: added,
                        updated_at: utc_now!(),
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    pub async fn upsert_many(account: &str, deltas: Vec<AggregateDelta>) -> PipelineResult<()> {
        for delta in deltas {
            Self::upsert(account, delta).await?;
        }
        Ok(())
    }

    /// `GET /api/accounts/{addr}/categories/top`: the highest-count category
    /// buckets for an account, most recent day first among ties.
    pub async fn top(
        account: &str,
        dimension: Dimension,
        limit: usize,
    ) -> PipelineResult<Vec<Aggregate>> {
        let mut rows = filter_by_secondary_key_impl::<Aggregate>(
            DB_MANAGER.audit_db(),
            AggregateKey::account,
            account.to_string(),
        )
        .await?;
        rows.retain(|r| r.dimension == dimension);
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.day.cmp(&a.day)));
        rows.truncate(limit);
        Ok(rows)
    }

    pub(crate) async fn delete_for_account(account: &str) -> PipelineResult<()> {
        let rows = filter_by_secondary_key_impl::<Aggregate>(
            DB_MANAGER.audit_db(),
            AggregateKey::account,
            account.to_string(),
        )
        .await?;
        for row in rows {
            let key = row.key.clone();
            delete_impl(DB_MANAGER.audit_db(), move |rw| {
                rw.get()
                    .primary::<Aggregate>(key.clone())
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                    .ok_or_else(|| {
                        raise_error!(
                            format!("aggregate '{key}' not found"),
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
    fn composite_key_distinguishes_dimensions() {
        let category = composite_key("u@example.com", "2026-07-29", Dimension::Category, "news");
        let sender = composite_key("u@example.com", "2026-07-29", Dimension::Sender, "news");
        assert_ne!(category, sender);
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `GET /api/processing/*` (spec §6.1): reads against the Status Registry
//! (spec §4.B). The history endpoint reads from the in-memory ring rather
//! than the Audit Store — one of the spec's explicit Open Questions (§9),
//! resolved in DESIGN.md in favor of the memory path the source actually
//! exposes over HTTP.

use poem_openapi::param::Query;
use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::modules::registry::{AccountStatus, Statistics, REGISTRY};
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Clone, Debug, Object)]
pub struct RunHistory {
    pub runs: Vec<AccountStatus>,
}

#[derive(Clone, Debug, Object)]
pub struct CurrentStatusResponse {
    pub current: Option<AccountStatus>,
    pub recent_runs: Option<Vec<AccountStatus>>,
    pub statistics: Option<Statistics>,
}

pub struct ProcessingApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Processing")]
impl ProcessingApi {
    /// The currently live run, if any. With no `account` filter, returns
    /// whichever live session was most recently updated.
    #[oai(
        path = "/processing/status",
        method = "get",
        operation_id = "processing_status"
    )]
    async fn status(
        &self,
        /// Restrict to one account's live status.
        account: Query<Option<String>>,
    ) -> ApiResult<Json<Option<AccountStatus>>> {
        Ok(Json(REGISTRY.current(account.0.as_deref())))
    }

    /// Most recently completed runs, newest first, capped at 100 per call.
    #[oai(
        path = "/processing/history",
        method = "get",
        operation_id = "processing_history"
    )]
    async fn history(
        &self,
        /// Maximum number of runs to return (default 50, capped at 100).
        limit: Query<Option<usize>>,
    ) -> ApiResult<Json<RunHistory>> {
        let limit = limit.0.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        Ok(Json(RunHistory {
            runs: REGISTRY.recent_runs(limit),
        }))
    }

    /// Aggregate success/error counts and average duration over the recent-runs ring.
    #[oai(
        path = "/processing/statistics",
        method = "get",
        operation_id = "processing_statistics"
    )]
    async fn statistics(&self) -> ApiResult<Json<Statistics>> {
        Ok(Json(REGISTRY.statistics()))
    }

    /// Combined snapshot: current status plus optionally recent runs and statistics,
    /// saving callers a round trip when a dashboard needs all three at once.
    #[oai(
        path = "/processing/current-status",
        method = "get",
        operation_id = "processing_current_status"
    )]
    async fn current_status(
        &self,
        account: Query<Option<String>>,
        include_recent: Query<Option<bool>>,
        include_stats: Query<Option<bool>>,
    ) -> ApiResult<Json<CurrentStatusResponse>> {
        let recent_runs = if include_recent.0.unwrap_or(false) {
            Some(REGISTRY.recent_runs(DEFAULT_HISTORY_LIMIT))
        } else {
            None
        };
        let statistics = if include_stats.0.unwrap_or(false) {
            Some(REGISTRY.statistics())
        } else {
            None
        };
        Ok(Json(CurrentStatusResponse {
            current: REGISTRY.current(account.0.as_deref()),
            recent_runs,
            statistics,
        }))
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `POST|GET|PUT|DELETE /api/accounts*` and the force-process trigger
//! (spec §6.1). The force-process endpoint is deliberately async: it asks
//! the Gate (§4.D) for a lease and, once granted, hands the run to a
//! detached task so the REST call returns 202 immediately rather than
//! blocking for the whole pipeline invocation (spec "Force-process is
//! async").

use poem::web::Path;
use poem_openapi::param::Query;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};

use crate::modules::account::entity::{Account, AccountCreateRequest, AccountSummary};
use crate::modules::audit::aggregate::{Aggregate, Dimension};
use crate::modules::error::{code::ErrorCode, PipelineError};
use crate::modules::pipeline::PIPELINE;
use crate::modules::registry::REGISTRY;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::utils::canonical_address;
use crate::raise_error;

const DEFAULT_TOP_LIMIT: usize = 10;
const MIN_OVERRIDE_HOURS: u32 = 1;
const MAX_OVERRIDE_HOURS: u32 = 168;

#[derive(Clone, Debug, Object)]
pub struct AccountListResponse {
    pub total_count: usize,
    pub accounts: Vec<AccountSummary>,
}

#[derive(Clone, Debug, Object)]
pub struct ProcessAccepted {
    pub account: String,
    pub message: String,
}

#[derive(Clone, Debug, Object)]
pub struct BusyBody {
    pub message: String,
    pub state: Option<crate::modules::registry::RunState>,
    pub current_step: Option<String>,
}

#[derive(Clone, Debug, Object)]
pub struct TooSoonBody {
    pub message: String,
    pub retry_after: i64,
}

#[derive(ApiResponse)]
pub enum ForceProcessResponse {
    #[oai(status = 202)]
    Accepted(Json<ProcessAccepted>),
    #[oai(status = 409)]
    Busy(Json<BusyBody>),
    #[oai(status = 429)]
    TooSoon(Json<TooSoonBody>),
}

#[derive(ApiResponse)]
pub enum CreateAccountResponse {
    #[oai(status = 201)]
    Created(Json<AccountSummary>),
}

#[derive(ApiResponse)]
pub enum DeleteAccountResponse {
    #[oai(status = 204)]
    Deleted,
}

#[derive(Clone, Debug, Object)]
pub struct CategoryRankingEntry {
    pub day: String,
    pub category: String,
    pub count: u64,
}

pub struct AccountApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Account")]
impl AccountApi {
    /// Registers a new mailbox account. 409 if the address already exists.
    #[oai(path = "/accounts", method = "post", operation_id = "create_account")]
    async fn create_account(
        &self,
        payload: Json<AccountCreateRequest>,
    ) -> ApiResult<CreateAccountResponse> {
        let account = payload.0.into_account()?.create().await?;
        Ok(CreateAccountResponse::Created(Json(AccountSummary::from(
            &account,
        ))))
    }

    /// Lists every registered account, active or deactivated.
    #[oai(path = "/accounts", method = "get", operation_id = "list_accounts")]
    async fn list_accounts(&self) -> ApiResult<Json<AccountListResponse>> {
        let accounts: Vec<AccountSummary> = Account::list_all()
            .await?
            .iter()
            .map(AccountSummary::from)
            .collect();
        Ok(Json(AccountListResponse {
            total_count: accounts.len(),
            accounts,
        }))
    }

    /// Deactivates an account: the scheduler skips it, but records and
    /// aggregates are retained. Does not delete the account.
    #[oai(
        path = "/accounts/:address/deactivate",
        method = "put",
        operation_id = "deactivate_account"
    )]
    async fn deactivate_account(
        &self,
        address: Path<String>,
    ) -> ApiResult<Json<AccountSummary>> {
        let address = canonical_address(&address.0);
        Account::deactivate(&address).await?;
        let account = Account::get(&address).await?;
        Ok(Json(AccountSummary::from(&account)))
    }

    /// Deletes an account and cascades its processing runs, aggregates, and dedup ledger.
    #[oai(
        path = "/accounts/:address",
        method = "delete",
        operation_id = "delete_account"
    )]
    async fn delete_account(&self, address: Path<String>) -> ApiResult<DeleteAccountResponse> {
        let address = canonical_address(&address.0);
        Account::delete(&address).await?;
        crate::modules::credential::TOKEN_CACHE.evict(&address);
        Ok(DeleteAccountResponse::Deleted)
    }

    /// Force-processes an account outside the scheduler's normal sweep,
    /// subject to the same Gate (single-flight, manual-trigger cooldown) as
    /// the scheduler itself.
    #[oai(
        path = "/accounts/:address/process",
        method = "post",
        operation_id = "force_process_account"
    )]
    async fn force_process(
        &self,
        address: Path<String>,
        /// Overrides the account's lookback window for this one run (1-168h).
        hours: Query<Option<u32>>,
    ) -> ApiResult<ForceProcessResponse> {
        if let Some(hours) = hours.0 {
            if !(MIN_OVERRIDE_HOURS..=MAX_OVERRIDE_HOURS).contains(&hours) {
                return Err(raise_error!(
                    format!(
                        "hours must be between {MIN_OVERRIDE_HOURS} and {MAX_OVERRIDE_HOURS}, got {hours}"
                    ),
                    ErrorCode::InvalidParameter
                )
                .into());
            }
        }

        let address = canonical_address(&address.0);
        match PIPELINE.trigger(&address, hours.0).await {
            Ok(()) => Ok(ForceProcessResponse::Accepted(Json(ProcessAccepted {
                account: address,
                message: "processing started".to_string(),
            }))),
            Err(PipelineError::Busy { message, .. }) => {
                let status = REGISTRY.current(Some(&address));
                Ok(ForceProcessResponse::Busy(Json(BusyBody {
                    message,
                    state: status.as_ref().map(|s| s.state),
                    current_step: status.map(|s| s.current_step),
                })))
            }
            Err(PipelineError::TooSoon {
                message,
                retry_after_secs,
                ..
            }) => Ok(ForceProcessResponse::TooSoon(Json(TooSoonBody {
                message,
                retry_after: retry_after_secs,
            }))),
            Err(e) => Err(e.into()),
        }
    }

    /// The highest-count categories seen for this account, most recent day first among ties.
    #[oai(
        path = "/accounts/:address/categories/top",
        method = "get",
        operation_id = "top_categories"
    )]
    async fn top_categories(
        &self,
        address: Path<String>,
        limit: Query<Option<usize>>,
    ) -> ApiResult<Json<Vec<CategoryRankingEntry>>> {
        let address = canonical_address(&address.0);
        let limit = limit.0.unwrap_or(DEFAULT_TOP_LIMIT);
        let rows = Aggregate::top(&address, Dimension::Category, limit).await?;
        Ok(Json(
            rows.into_iter()
                .map(|row| CategoryRankingEntry {
                    day: row.day,
                    category: row.dimension_key,
                    count: row.count,
                })
                .collect(),
        ))
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `GET /api/health` (spec §6.1): a liveness probe covering the embedded
//! audit store and the scheduler, following the teacher's `system.rs`
//! convention of one small `Object` per consolidated health view.

use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::modules::audit::run::connection_status;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::scheduler::SCHEDULER;

#[derive(Clone, Debug, Object)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Object)]
pub struct SchedulerHealth {
    pub running: bool,
    pub next_execution_at: Option<i64>,
}

#[derive(Clone, Debug, Object)]
pub struct HealthResponse {
    pub status: String,
    pub database: DatabaseHealth,
    pub scheduler: SchedulerHealth,
}

pub struct HealthApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Health")]
impl HealthApi {
    /// Liveness check: reports the embedded audit store's connection status
    /// and whether the background scheduler is currently running.
    #[oai(path = "/health", method = "get", operation_id = "get_health")]
    async fn health(&self) -> ApiResult<Json<HealthResponse>> {
        let (connected, message, error) = connection_status().await;
        let status = if connected { "ok" } else { "degraded" };
        Ok(Json(HealthResponse {
            status: status.to_string(),
            database: DatabaseHealth {
                connected,
                message,
                error,
            },
            scheduler: SchedulerHealth {
                running: SCHEDULER.running(),
                next_execution_at: SCHEDULER.next_execution_at(),
            },
        }))
    }
}

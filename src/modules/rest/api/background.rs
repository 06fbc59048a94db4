// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `GET /api/background/{start|stop|status|next-execution}` (spec §6.1):
//! scheduler control. `Stop` awaits the graceful shutdown described in
//! spec §4.F before replying, so a 200 response always means the current
//! account (if any) has already finished.

use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::scheduler::SCHEDULER;

#[derive(Clone, Debug, Object)]
pub struct SchedulerStatus {
    pub running: bool,
    pub next_execution_at: Option<i64>,
}

fn status() -> SchedulerStatus {
    SchedulerStatus {
        running: SCHEDULER.running(),
        next_execution_at: SCHEDULER.next_execution_at(),
    }
}

pub struct BackgroundApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Background")]
impl BackgroundApi {
    /// Starts the scheduler loop. A no-op if it is already running.
    #[oai(
        path = "/background/start",
        method = "get",
        operation_id = "start_scheduler"
    )]
    async fn start(&self) -> ApiResult<Json<SchedulerStatus>> {
        SCHEDULER.start();
        Ok(Json(status()))
    }

    /// Stops the scheduler loop, waiting for the currently running account
    /// (if any) to finish before returning.
    #[oai(
        path = "/background/stop",
        method = "get",
        operation_id = "stop_scheduler"
    )]
    async fn stop(&self) -> ApiResult<Json<SchedulerStatus>> {
        SCHEDULER.stop().await;
        Ok(Json(status()))
    }

    /// Current scheduler running state.
    #[oai(
        path = "/background/status",
        method = "get",
        operation_id = "scheduler_status"
    )]
    async fn scheduler_status(&self) -> ApiResult<Json<SchedulerStatus>> {
        Ok(Json(status()))
    }

    /// Timestamp (epoch millis) of the next scheduled tick, `None` while stopped.
    #[oai(
        path = "/background/next-execution",
        method = "get",
        operation_id = "next_execution"
    )]
    async fn next_execution(&self) -> ApiResult<Json<SchedulerStatus>> {
        Ok(Json(status()))
    }
}

// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! The HTTP Surface (spec §4.G): one `OpenApiService` mounted at `/api`, a
//! raw `get(ws_status)` route for `/ws/status`, and the same middleware
//! stack the teacher wraps its own API in (`ApiGuard`, `ErrorCapture`,
//! `Timeout`, `Tracing`) plus CORS, optional compression, and `CatchPanic`.
//! No swagger/redoc/embedded-frontend/gRPC surface ships here — this crate
//! has no bundled web UI and no versioned `/api/v1` namespace to document.

use std::time::Duration;

use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Compression};
use poem::{get, middleware::Cors, EndpointExt, Route, Server};
use tracing::info;

use crate::modules::common::auth::ApiGuard;
use crate::modules::common::error::ErrorCapture;
use crate::modules::common::log::Tracing as RequestTracing;
use crate::modules::common::timeout::{Timeout, TIMEOUT_HEADER};
use crate::modules::error::{code::ErrorCode, handler::error_handler, PipelineResult};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::utils::shutdown::shutdown_signal;
use crate::raise_error;

use self::api::create_openapi_service;
use self::ws::ws_status;

use super::error::ApiErrorResponse;

pub mod api;
pub mod ws;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

fn cors_origins() -> Vec<String> {
    let origins: Vec<String> = SETTINGS
        .cat_emails_cors_origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

pub async fn start_http_server() -> PipelineResult<()> {
    let listener = TcpListener::bind((
        SETTINGS.cat_emails_bind_ip.clone(),
        SETTINGS.cat_emails_http_port,
    ));

    let api_service = create_openapi_service()
        .summary(
            "Ingests, classifies and labels mail across multiple accounts, exposing live \
            progress and historical audit data over REST and WebSocket.",
        )
        .with(ApiGuard)
        .with(ErrorCapture)
        .with(Timeout)
        .with(RequestTracing);

    let cors = Cors::new()
        .allow_origins(cors_origins())
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type", "Authorization", TIMEOUT_HEADER])
        .expose_headers(vec!["Accept"])
        .max_age(3600);

    let route = Route::new()
        .nest_no_strip("/api", api_service)
        .at("/ws/status", get(ws_status))
        .with(cors)
        .with_if(
            SETTINGS.cat_emails_http_compression_enabled,
            Compression::new(),
        )
        .with(CatchPanic::new());

    let server = Server::new(listener)
        .name("cat-emails")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            route.catch_all_error(error_handler),
            shutdown_signal(),
            Some(Duration::from_secs(5)),
        );
    info!(
        "cat-emails HTTP/WebSocket surface is now running on port {}",
        SETTINGS.cat_emails_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}

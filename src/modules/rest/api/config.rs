// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `GET /api/config` (spec §6.1): the effective runtime configuration with
//! secrets redacted — no credential key, API key, or OAuth client secret
//! ever leaves the process.

use poem_openapi::payload::Json;
use poem_openapi::{Object, OpenApi};

use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::settings::cli::SETTINGS;

#[derive(Clone, Debug, Object)]
pub struct EffectiveConfig {
    pub scan_interval_secs: u64,
    pub lookback_hours: u32,
    pub min_interval_secs: u64,
    pub run_timeout_secs: u64,
    pub max_recent_runs: usize,
    pub http_port: u16,
    pub api_key_configured: bool,
    pub classifier_endpoint_configured: bool,
    pub classifier_fallback_configured: bool,
    pub oauth_configured: bool,
}

pub struct ConfigApi;

#[OpenApi(prefix_path = "/api", tag = "ApiTags::Config")]
impl ConfigApi {
    /// Effective configuration this process was started with. Secrets are
    /// reported as booleans ("is one configured?") rather than echoed back.
    #[oai(path = "/config", method = "get", operation_id = "get_config")]
    async fn config(&self) -> ApiResult<Json<EffectiveConfig>> {
        Ok(Json(EffectiveConfig {
            scan_interval_secs: SETTINGS.cat_emails_scan_interval_secs,
            lookback_hours: SETTINGS.cat_emails_lookback_hours,
            min_interval_secs: SETTINGS.cat_emails_min_interval_secs,
            run_timeout_secs: SETTINGS.cat_emails_run_timeout_secs,
            max_recent_runs: SETTINGS.cat_emails_max_recent_runs,
            http_port: SETTINGS.cat_emails_http_port,
            api_key_configured: SETTINGS.cat_emails_api_key.is_some(),
            classifier_endpoint_configured: SETTINGS.cat_emails_classifier_endpoint.is_some(),
            classifier_fallback_configured: SETTINGS
                .cat_emails_classifier_fallback_endpoint
                .is_some(),
            oauth_configured: SETTINGS.cat_emails_oauth_client_id.is_some()
                && SETTINGS.cat_emails_oauth_token_endpoint.is_some(),
        }))
    }
}

use poem::{Endpoint, Middleware, Request, Result};

use crate::modules::error::{code::ErrorCode, PipelineError};
use crate::modules::settings::cli::SETTINGS;

const API_KEY_HEADER: &str = "X-API-Key";

/// Checks the `X-API-Key` header against the configured key. Enforcement is only active
/// when an API key is configured; an unconfigured key means every request is accepted.
pub struct ApiGuard;

pub struct ApiGuardEndpoint<E> {
    ep: E,
}

impl<E: Endpoint> Middleware<E> for ApiGuard {
    type Output = ApiGuardEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        ApiGuardEndpoint { ep }
    }
}

impl<E: Endpoint> Endpoint for ApiGuardEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        if let Some(expected) = &SETTINGS.cat_emails_api_key {
            let provided = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok());
            if provided != Some(expected.as_str()) {
                return Err(PipelineError::Generic {
                    message: "missing or invalid X-API-Key header".into(),
                    location: snafu::Location::default(),
                    code: ErrorCode::PermissionDenied,
                }
                .into());
            }
        }
        self.ep.call(req).await
    }
}

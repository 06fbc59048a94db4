use std::fmt::Formatter;

use code::ErrorCode;
use poem::http::StatusCode;
use poem::{Body, Response};
use poem_openapi::{payload::Json, ApiResponse, Object};
use snafu::{Location, Snafu};

pub mod code;
pub mod handler;

/// Errors carried as kind, not string: each taxonomy entry in the error handling design
/// gets its own variant so callers can `match` on it directly instead of inspecting text.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Credentials invalid. The run is marked error; the account stays active but is
    /// flagged for the next attempt.
    #[snafu(display("{message}"))]
    Auth {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// Transient network failure that exhausted its retries inside the step.
    #[snafu(display("{message}"))]
    Network {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A lease for this account is already held.
    #[snafu(display("{message}"))]
    Busy {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// A manual trigger arrived before `minInterval` elapsed since the previous one.
    #[snafu(display("{message}"))]
    TooSoon {
        message: String,
        retry_after_secs: i64,
        #[snafu(implicit)]
        location: Location,
    },

    /// An operation was attempted on a terminal or unknown run.
    #[snafu(display("{message}"))]
    InvalidState {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The classifier collaborator is unavailable.
    #[snafu(display("{message}"))]
    Classifier {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The audit store failed to persist a write; the pipeline aborts.
    #[snafu(display("{message}"))]
    Storage {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// The run's cancellation token fired.
    #[snafu(display("{message}"))]
    Cancelled {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// Anything else: parameter validation, configuration, not-found, internal.
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type PipelineResult<T, E = PipelineError> = std::result::Result<T, E>;

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Auth { .. } => ErrorCode::AuthInvalid,
            PipelineError::Network { .. } => ErrorCode::NetworkError,
            PipelineError::Busy { .. } => ErrorCode::Busy,
            PipelineError::TooSoon { .. } => ErrorCode::TooSoon,
            PipelineError::InvalidState { .. } => ErrorCode::InvalidState,
            PipelineError::Classifier { .. } => ErrorCode::ClassifierUnavailable,
            PipelineError::Storage { .. } => ErrorCode::StorageFailure,
            PipelineError::Cancelled { .. } => ErrorCode::Cancelled,
            PipelineError::Generic { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PipelineError::Auth { message, .. }
            | PipelineError::Network { message, .. }
            | PipelineError::Busy { message, .. }
            | PipelineError::TooSoon { message, .. }
            | PipelineError::InvalidState { message, .. }
            | PipelineError::Classifier { message, .. }
            | PipelineError::Storage { message, .. }
            | PipelineError::Cancelled { message, .. }
            | PipelineError::Generic { message, .. } => message,
        }
    }

    /// `Some(retry_after_secs)` only for the rate-limited manual-trigger case.
    pub fn retry_after_secs(&self) -> Option<i64> {
        match self {
            PipelineError::TooSoon {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct ApiError {
    pub message: String,
    pub code: u32,
    pub retry_after: Option<i64>,
}

impl ApiError {
    pub fn new(message: String, code: u32) -> Self {
        Self {
            message,
            code,
            retry_after: None,
        }
    }

    pub fn new_with_error_code<ErrorType: std::fmt::Display>(
        error: ErrorType,
        code: u32,
    ) -> ApiError {
        Self::new(format!("{:#}", error), code)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error({}): {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, ApiResponse)]
pub enum ApiErrorResponse {
    Generic(StatusCode, Json<ApiError>),
}

impl poem::error::ResponseError for PipelineError {
    fn status(&self) -> StatusCode {
        self.code().status()
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        tracing::error!(
            error_code = self.code() as u32,
            error_message = %self.message(),
            "pipeline error"
        );
        let body = Body::from_json(serde_json::json!({
            "code": self.code() as u32,
            "message": self.message(),
            "retry_after": self.retry_after_secs(),
        }))
        .expect("serializing an error body never fails");
        Response::builder().status(self.status()).body(body)
    }
}

impl From<PipelineError> for ApiErrorResponse {
    fn from(error: PipelineError) -> Self {
        let code = error.code();
        let retry_after = error.retry_after_secs();
        tracing::error!("api error: [{:?}] {}", code, error);
        let api_error = ApiError {
            message: error.message().to_string(),
            code: code as u32,
            retry_after,
        };
        ApiErrorResponse::Generic(code.status(), Json(api_error))
    }
}

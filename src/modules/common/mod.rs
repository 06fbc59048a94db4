use poem::Error;

use super::error::code::ErrorCode;
use super::error::PipelineError;

pub mod auth;
pub mod error;
pub mod log;
pub mod lru;
pub mod signal;
pub mod timeout;
pub mod validator;

#[inline]
pub fn create_api_error_response(message: &str, code: ErrorCode) -> Error {
    PipelineError::Generic {
        message: message.into(),
        location: snafu::Location::default(),
        code,
    }
    .into()
}

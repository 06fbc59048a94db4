use poem::http::StatusCode;
use poem_openapi::Enum;

#[derive(Copy, Clone, Debug, Enum, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side errors (10000-10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10010,
    RequestTimeout = 10020,
    MethodNotAllowed = 10030,

    // Authentication and authorization errors (20000-20999)
    PermissionDenied = 20000,
    AuthInvalid = 20010,

    // Resource errors (30000-30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,
    TooManyRequests = 30020,

    // Network / transient errors (40000-40999)
    NetworkError = 40000,

    // Pipeline errors (50000-50999), one per taxonomy entry
    Busy = 50000,
    TooSoon = 50010,
    InvalidState = 50020,
    ClassifierUnavailable = 50030,
    StorageFailure = 50040,
    Cancelled = 50050,

    // Internal system errors (70000-70999)
    InternalError = 70000,
    UnhandledPoemError = 70010,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidParameter | ErrorCode::MissingConfiguration => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::PermissionDenied | ErrorCode::AuthInvalid => StatusCode::UNAUTHORIZED,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::AlreadyExists | ErrorCode::Busy | ErrorCode::InvalidState => {
                StatusCode::CONFLICT
            }
            ErrorCode::TooManyRequests | ErrorCode::TooSoon => StatusCode::TOO_MANY_REQUESTS,
            // Never surfaced directly: the message loop swallows this and falls back to `Other`.
            ErrorCode::ClassifierUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NetworkError | ErrorCode::StorageFailure | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::UnhandledPoemError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

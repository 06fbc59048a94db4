pub mod encrypt;
pub mod shutdown;

#[macro_export]
macro_rules! cat_emails_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

#[macro_export]
macro_rules! utc_now {
    () => {{
        use chrono::Utc;
        Utc::now().timestamp_millis()
    }};
}

#[macro_export]
macro_rules! raise_error {
    ($msg:expr, $code:expr) => {
        $crate::modules::error::PipelineError::Generic {
            message: $msg,
            location: snafu::Location::default(),
            code: $code,
        }
    };
}

#[macro_export]
macro_rules! encrypt {
    ($plaintext:expr) => {{
        $crate::modules::utils::encrypt::encrypt_string($plaintext)
    }};
}

#[macro_export]
macro_rules! decrypt {
    ($plaintext:expr) => {{
        $crate::modules::utils::encrypt::decrypt_string($plaintext)
    }};
}

pub fn validate_email(email: &str) -> crate::modules::error::PipelineResult<()> {
    use crate::modules::error::code::ErrorCode;
    use std::str::FromStr;

    let parsed = email_address::EmailAddress::from_str(email).map_err(|_| {
        raise_error!(
            format!("invalid email address: {}", email),
            ErrorCode::InvalidParameter
        )
    })?;
    if email != parsed.email() {
        return Err(raise_error!(
            format!("invalid email address: {}", email),
            ErrorCode::InvalidParameter
        ));
    }
    Ok(())
}

/// Canonicalizes an account address the way the data model requires: lowercase, trimmed.
pub fn canonical_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

use clap::{builder::ValueParser, Parser};
use std::{path::PathBuf, sync::LazyLock};
use url::Url;

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "cat-emails",
    about = "Ingests, classifies and labels mail across multiple accounts, \
    exposing live progress and historical audit data over REST and WebSocket.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// cat-emails log level (default: "info")
    #[clap(long, default_value = "info", env, help = "Set the log level")]
    pub cat_emails_log_level: String,

    /// HTTP port for the REST/WebSocket surface (default: 8080)
    #[clap(long, default_value = "8080", env, help = "Set the HTTP port")]
    pub cat_emails_http_port: u16,

    /// The IP address the server binds to.
    #[clap(long, env, default_value = "0.0.0.0", help = "The IP address to bind to")]
    pub cat_emails_bind_ip: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub cat_emails_ansi_logs: bool,

    /// Enable log file output. If false, logs go to stdout.
    #[clap(long, default_value = "false", env, help = "Enable log file output")]
    pub cat_emails_log_to_file: bool,

    /// Enable JSON logs (default: false)
    #[clap(long, default_value = "false", env, help = "Enable JSON formatted logs")]
    pub cat_emails_json_logs: bool,

    /// Maximum number of rotated log files to retain
    #[clap(long, default_value = "5", env, help = "Maximum number of server log files")]
    pub cat_emails_max_server_log_files: usize,

    /// Encryption password used to encrypt app passwords and refresh tokens at rest.
    #[clap(
        long,
        default_value = "change-this-default-password-now",
        env,
        help = "Encryption password for stored credentials. Change this default in production!"
    )]
    pub cat_emails_credential_key: String,

    /// Directory holding the embedded audit-store database and logs.
    #[clap(
        long,
        env,
        help = "Root data directory for the embedded database and logs",
        value_parser = ValueParser::new(|s: &str| {
            let path = PathBuf::from(s);
            if !path.is_absolute() {
                return Err("Path must be an absolute directory path".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub cat_emails_root_dir: String,

    /// Cache size for the audit-store database, in bytes.
    #[clap(
        long,
        env,
        default_value = "67108864",
        help = "Cache size for the audit store database in bytes"
    )]
    pub cat_emails_db_cache_size: Option<usize>,

    /// Default scan interval between scheduler ticks, in seconds.
    #[clap(
        long,
        env,
        default_value = "300",
        help = "Default interval between scheduler ticks in seconds"
    )]
    pub cat_emails_scan_interval_secs: u64,

    /// Default lookback window applied when an account has no prior successful scan,
    /// in hours. Overridable per account in the range 1-168h.
    #[clap(
        long,
        env,
        default_value = "2",
        help = "Default lookback window in hours (1-168) for an account with no prior scan"
    )]
    pub cat_emails_lookback_hours: u32,

    /// Minimum interval between two manually-triggered runs for the same account, in seconds.
    #[clap(
        long,
        env,
        default_value = "300",
        help = "Minimum interval between manual triggers for the same account, in seconds"
    )]
    pub cat_emails_min_interval_secs: u64,

    /// Maximum wall-clock duration for one account's pipeline run before it is
    /// aborted and marked error, in seconds.
    #[clap(
        long,
        env,
        default_value = "600",
        help = "Maximum duration for a single pipeline run in seconds"
    )]
    pub cat_emails_run_timeout_secs: u64,

    /// Maximum number of completed runs retained in the global recent-runs ring.
    #[clap(
        long,
        env,
        default_value = "50",
        help = "Maximum number of recent completed runs retained in the history ring"
    )]
    pub cat_emails_max_recent_runs: usize,

    /// Optional API key required via the X-API-Key header. When unset, auth is disabled.
    #[clap(long, env, help = "Optional API key required on REST requests")]
    pub cat_emails_api_key: Option<String>,

    /// Primary classifier endpoint URL.
    #[clap(
        long,
        env,
        help = "Primary classifier endpoint URL",
        value_parser = ValueParser::new(|s: &str| -> Result<String, String> {
            Url::parse(s).map_err(|_| format!("invalid URL for classifier endpoint: {}", s))?;
            Ok(s.to_string())
        })
    )]
    pub cat_emails_classifier_endpoint: Option<String>,

    /// Secondary (fallback) classifier endpoint URL.
    #[clap(
        long,
        env,
        help = "Secondary classifier endpoint URL, used when the primary is unavailable",
        value_parser = ValueParser::new(|s: &str| -> Result<String, String> {
            Url::parse(s).map_err(|_| format!("invalid URL for classifier endpoint: {}", s))?;
            Ok(s.to_string())
        })
    )]
    pub cat_emails_classifier_fallback_endpoint: Option<String>,

    /// OAuth2 client id used to refresh provider access tokens.
    #[clap(long, env, help = "OAuth2 client id")]
    pub cat_emails_oauth_client_id: Option<String>,

    /// OAuth2 client secret used to refresh provider access tokens.
    #[clap(long, env, help = "OAuth2 client secret")]
    pub cat_emails_oauth_client_secret: Option<String>,

    /// OAuth2 token endpoint used for refresh-token exchanges.
    #[clap(
        long,
        env,
        help = "OAuth2 token endpoint URL",
        value_parser = ValueParser::new(|s: &str| -> Result<String, String> {
            Url::parse(s).map_err(|_| format!("invalid URL for oauth token endpoint: {}", s))?;
            Ok(s.to_string())
        })
    )]
    pub cat_emails_oauth_token_endpoint: Option<String>,

    /// CORS allowed origins (comma-separated, default "*")
    #[clap(long, default_value = "*", env, help = "Allowed CORS origins, comma separated")]
    pub cat_emails_cors_origins: String,

    /// Enable response compression on the REST surface.
    #[clap(long, default_value = "true", env, help = "Enable HTTP compression")]
    pub cat_emails_http_compression_enabled: bool,
}

impl Settings {
    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            cat_emails_log_level: "info".to_string(),
            cat_emails_http_port: 8080,
            cat_emails_bind_ip: "0.0.0.0".to_string(),
            cat_emails_ansi_logs: false,
            cat_emails_log_to_file: false,
            cat_emails_json_logs: false,
            cat_emails_max_server_log_files: 5,
            cat_emails_credential_key: "test-only-credential-key-0123456789".into(),
            cat_emails_root_dir: if cfg!(windows) {
                "C:\\cat_emails_data".into()
            } else {
                "/tmp/cat_emails_data".into()
            },
            cat_emails_db_cache_size: None,
            cat_emails_scan_interval_secs: 300,
            cat_emails_lookback_hours: 2,
            cat_emails_min_interval_secs: 300,
            cat_emails_run_timeout_secs: 600,
            cat_emails_max_recent_runs: 50,
            cat_emails_api_key: None,
            cat_emails_classifier_endpoint: None,
            cat_emails_classifier_fallback_endpoint: None,
            cat_emails_oauth_client_id: None,
            cat_emails_oauth_client_secret: None,
            cat_emails_oauth_token_endpoint: None,
            cat_emails_cors_origins: "*".to_string(),
            cat_emails_http_compression_enabled: true,
        }
    }
}

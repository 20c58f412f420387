//! Error taxonomy for the binary crate: a `thiserror` enum per fallible
//! subsystem, plus a top-level `BotError` that the fatal cases in
//! `entry::run` collapse into a process exit code, the same way the
//! `database` module scopes `sqlx::Error` to itself instead of a single
//! crate-wide error type.

use thiserror::Error;

/// Webhook-socket or upstream-HTTP-client transport failures. Always logged
/// and the call/connection abandoned; never fatal on its own.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("missing or unparseable Content-Length header")]
    MissingContentLength,

    #[error("body exceeded declared Content-Length")]
    BodyOverrun,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    #[error("upstream HTTP call failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream response was not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Collapses every fatal-at-startup case into a process exit code.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("settings error: {0}")]
    Settings(String),

    #[error("failed to load TLS certificate/key: {0}")]
    TlsSetup(String),

    #[error("failed to bind the webhook port: {0}")]
    BindFailed(std::io::Error),

    #[error("could not obtain bot identity via getMe: {0}")]
    GetMeFailed(String),
}

impl BotError {
    /// Exit code for initialization failures: always 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        1
    }
}

use thiserror::Error;

/// Top-level error type for the `km3db-api` crate.
///
/// Routine degradation (expired session, empty result) is not an error:
/// the gateway logs it and hands back `None`. These variants cover the
/// failures that do propagate — broken credentials machinery, malformed
/// URLs, and the external-IP check.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No usable credential source (prompting disabled, nothing preset).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Interactive prompt failed (no TTY, EOF on stdin).
    #[error("Credential prompt failed: {0}")]
    Prompt(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Credential sources ──────────────────────────────────────────
    /// Reading the persisted cookie file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this error came out of the authentication path.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Prompt(_))
    }
}

// Transport configuration for building reqwest::Client instances.
//
// The database web frontend sits behind a certificate that routinely
// fails system verification, so the default mode accepts invalid certs.
// Switch to `TlsMode::System` to re-enable verification.

use std::time::Duration;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Accept any certificate.
    DangerAcceptInvalid,
}

/// Transport configuration for the database HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Request timeout; `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("km3db-rs/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        match self.tls {
            TlsMode::System => {}
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

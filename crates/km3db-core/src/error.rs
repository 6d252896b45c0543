use thiserror::Error;

use crate::decode::DecodeError;

/// Top-level error type for the `km3db-core` crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Transport/session failure from the gateway layer.
    #[error(transparent)]
    Api(#[from] km3db_api::Error),

    /// The stream directory could not be loaded or parsed.
    #[error("could not load the stream catalog: {0}")]
    Catalog(String),

    /// No stream with this name in the catalog.
    #[error("unknown stream '{0}'")]
    UnknownStream(String),

    /// A tabular payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A lookup index has no entry for the requested key.
    #[error("no {index} entry for key '{key}'")]
    KeyNotFound { index: &'static str, key: String },

    /// No compass module among the integration records of a CLB.
    #[error("no compass UPI found for CLB UPI '{0}'")]
    NoCompassUpi(String),
}

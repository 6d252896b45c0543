//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use km3db_core::CoreError;

/// Exit codes of the `streamds` binary.
pub mod exit_code {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const NO_DATA: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("unknown stream '{stream}'")]
    #[diagnostic(
        code(streamds::unknown_stream),
        help("Run `streamds list` to see the streams the database offers.")
    )]
    UnknownStream { stream: String },

    #[error("no data for this query")]
    #[diagnostic(
        code(streamds::no_data),
        help(
            "The server answered with an error or an empty result.\n\
             Check the selector values; `streamds info <stream>` shows\n\
             the mandatory and optional selectors."
        )
    )]
    NoData,

    #[error("selector '{raw}' is not of the form key=value")]
    #[diagnostic(code(streamds::bad_selector))]
    BadSelector { raw: String },

    #[error("invalid base URL '{url}'")]
    #[diagnostic(code(streamds::bad_url))]
    BadUrl { url: String },

    #[error(transparent)]
    #[diagnostic(code(streamds::api))]
    Core(#[from] CoreError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownStream { .. } => exit_code::NOT_FOUND,
            Self::NoData => exit_code::NO_DATA,
            Self::BadSelector { .. } | Self::BadUrl { .. } => exit_code::USAGE,
            Self::Core(CoreError::UnknownStream(_)) => exit_code::NOT_FOUND,
            Self::Core(CoreError::Api(e)) if e.is_auth() => exit_code::AUTH,
            Self::Core(_) => exit_code::GENERAL,
        }
    }
}

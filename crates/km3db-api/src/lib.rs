// km3db-api: HTTP transport and session authentication for the KM3NeT
// database web API.

pub mod client;
pub mod error;
pub mod session;
pub mod transport;

pub use client::{BASE_URL, DbClient};
pub use error::Error;
pub use session::{CredentialSource, SessionConfig, TrustedNetwork};
pub use transport::{TlsMode, TransportConfig};

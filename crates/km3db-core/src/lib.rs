//! Client-side view of the KM3NeT database data streams.
//!
//! - **[`StreamDs`]** — the stream catalog: fetched once at construction
//!   from the `streamds` directory, every listed stream becomes a named
//!   operation with selector hints for introspection. Unknown names are
//!   hard errors; empty results and server-reported errors degrade to
//!   "no data".
//!
//! - **[`decode`]** — TSV payload decoding: raw text, header-derived
//!   [`Record`]s, a rectangular [`Table`], or typed rows via serde.
//!
//! - **[`ClbMap`]** — hardware map of one detector built from the
//!   `clbmap` stream, with lazily built lookup indices (UPI, DOM ID,
//!   omkey, base module per DU) and the memoized compass-UPI join.

pub mod clb;
pub mod decode;
pub mod error;
pub mod streams;

pub use clb::{Clb, ClbMap, compass_upi};
pub use decode::{Container, DecodeError, QueryResult, Record, Table};
pub use error::CoreError;
pub use streams::{StreamDescriptor, StreamDs, StreamHandle, StreamQuery};

// Re-export the transport layer so downstream users need one import.
pub use km3db_api::{DbClient, SessionConfig, TransportConfig};

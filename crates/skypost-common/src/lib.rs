//! Common types for skypost: the AT Protocol wire values a post record is
//! made of, and the HTTP seam every XRPC call goes through.

#![warn(missing_docs)]
pub use smol_str;
pub use url;

pub mod error;
/// HTTP client abstraction used by skypost crates.
pub mod http_client;
/// Baseline AT Protocol data types used in post records.
pub mod types;
pub mod xrpc;

pub use error::{HttpError, TransportError};
pub use http_client::HttpClient;
pub use xrpc::XrpcEndpoint;

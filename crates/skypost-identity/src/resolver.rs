//! The handle → DID lookup seam.
//!
//! Resolution is a capability handed to whoever needs it, so the post
//! pipeline never knows whether a lookup went to a PDS, a cache, or a test
//! fixture.

use std::collections::HashMap;
use std::future::Future;

use http::StatusCode;
use miette::Diagnostic;
use skypost_common::error::{HttpError, TransportError};
use skypost_common::types::{Did, Handle};
use thiserror::Error;

/// Errors that can occur during handle resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum IdentityError {
    /// The request never got a response
    #[error("HTTP error: {0}")]
    #[diagnostic(
        code(skypost_identity::http),
        help("check network connectivity and TLS configuration")
    )]
    Http(#[from] TransportError),
    /// The resolver answered with a non-success status
    #[error("HTTP status {status}")]
    #[diagnostic(code(skypost_identity::http_status))]
    HttpStatus {
        /// Response status
        status: StatusCode,
        /// XRPC error name, when the body carried one
        error: Option<String>,
    },
    /// The resolver has no DID for this handle
    #[error("handle {0} not found")]
    #[diagnostic(code(skypost_identity::not_found))]
    NotFound(Handle),
    /// The response body was not a usable resolution result
    #[error("malformed resolver response: {0}")]
    #[diagnostic(
        code(skypost_identity::malformed),
        help("expected a JSON body of the form {{\"did\": \"did:...\"}}")
    )]
    Malformed(String),
}

impl IdentityError {
    /// Classify a non-success response. A 404, or an XRPC error naming a
    /// missing or unresolvable handle, is treated as not-found.
    pub fn from_http(handle: &Handle, err: HttpError) -> Self {
        let error = err.xrpc_error();
        let message = err.xrpc_message().unwrap_or_default();
        let not_found = err.status == StatusCode::NOT_FOUND
            || error.as_deref() == Some("HandleNotFound")
            || (error.as_deref() == Some("InvalidRequest")
                && message.contains("Unable to resolve handle"));
        if not_found {
            Self::NotFound(handle.clone())
        } else {
            Self::HttpStatus {
                status: err.status,
                error,
            }
        }
    }

    /// Whether the lookup succeeded in asking and got "no such handle" back.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for handle resolution
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Resolves handles to DIDs.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait HandleResolver {
    /// Resolve `handle` to the DID it currently points at.
    fn resolve_handle(&self, handle: &Handle) -> impl Future<Output = Result<Did>>;
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: HandleResolver + Sync + Send> HandleResolver for std::sync::Arc<T> {
    fn resolve_handle(&self, handle: &Handle) -> impl Future<Output = Result<Did>> + Send {
        self.as_ref().resolve_handle(handle)
    }
}

/// Fixed handle → DID table.
///
/// Handles missing from the table resolve to [`IdentityError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<Handle, Did>,
}

impl StaticResolver {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn with(mut self, handle: Handle, did: Did) -> Self {
        self.entries.insert(handle, did);
        self
    }
}

impl FromIterator<(Handle, Did)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (Handle, Did)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl HandleResolver for StaticResolver {
    async fn resolve_handle(&self, handle: &Handle) -> Result<Did> {
        self.entries
            .get(handle)
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(handle.clone()))
    }
}

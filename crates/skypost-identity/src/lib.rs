//! Handle resolution for skypost
//!
//! Turns `@handle` mentions into the DIDs a mention facet has to carry.
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use skypost_identity::{PublicResolver, resolver::HandleResolver};
//! use skypost_common::types::Handle;
//!
//! let resolver = PublicResolver::default();
//! let did = resolver.resolve_handle(&Handle::new("alice.bsky.social")?).await?;
//! println!("{did}");
//! # Ok(())
//! # }
//! ```
//!
//! Any service exposing `com.atproto.identity.resolveHandle` works: a PDS,
//! the public AppView, or a self-hosted resolver.
//!
//! ```
//! use skypost_common::XrpcEndpoint;
//! use skypost_identity::XrpcHandleResolver;
//!
//! let endpoint = XrpcEndpoint::parse("https://bsky.social").unwrap();
//! let resolver = XrpcHandleResolver::new(reqwest::Client::new(), endpoint);
//! ```

#![warn(missing_docs)]

pub mod resolver;

use serde::{Deserialize, Serialize};
use skypost_common::http_client::HttpClient;
use skypost_common::types::{Did, Handle};
use skypost_common::xrpc::{self, CallError, XrpcEndpoint};

pub use resolver::{HandleResolver, IdentityError, StaticResolver};

/// NSID of the handle resolution query
pub const RESOLVE_HANDLE: &str = "com.atproto.identity.resolveHandle";

/// Default unauthenticated resolver service
pub const PUBLIC_API: &str = "https://public.api.bsky.app";

#[derive(Serialize)]
struct ResolveHandleParams<'a> {
    handle: &'a str,
}

#[derive(Deserialize)]
struct ResolveHandleOutput {
    did: String,
}

/// Resolves handles by calling `com.atproto.identity.resolveHandle` on one
/// XRPC service.
///
/// Every failure mode (transport, status, body) comes back as an
/// [`IdentityError`]; retry and deadline policy belong to the `HttpClient`.
#[derive(Debug, Clone)]
pub struct XrpcHandleResolver<C> {
    http: C,
    endpoint: XrpcEndpoint,
}

impl<C> XrpcHandleResolver<C> {
    /// Resolver calling `endpoint` through `http`
    pub fn new(http: C, endpoint: XrpcEndpoint) -> Self {
        Self { http, endpoint }
    }

    /// The service being queried
    pub fn endpoint(&self) -> &XrpcEndpoint {
        &self.endpoint
    }

    /// The underlying HTTP client
    pub fn http(&self) -> &C {
        &self.http
    }
}

impl<C: HttpClient + Sync> XrpcHandleResolver<C> {
    fn parse_output(body: &[u8]) -> resolver::Result<Did> {
        let out: ResolveHandleOutput =
            serde_json::from_slice(body).map_err(|e| IdentityError::Malformed(e.to_string()))?;
        Did::new(&out.did).map_err(|e| IdentityError::Malformed(e.to_string()))
    }
}

impl<C: HttpClient + Sync> HandleResolver for XrpcHandleResolver<C> {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), fields(handle = %handle)))]
    async fn resolve_handle(&self, handle: &Handle) -> resolver::Result<Did> {
        let request = self.endpoint.query(
            RESOLVE_HANDLE,
            &ResolveHandleParams {
                handle: handle.as_str(),
            },
        )?;
        match xrpc::send(&self.http, request).await {
            Ok(body) => Self::parse_output(&body),
            Err(CallError::Transport(e)) => Err(IdentityError::Http(e)),
            Err(CallError::Http(e)) => Err(IdentityError::from_http(handle, e)),
        }
    }
}

/// Resolver backed by the public Bluesky AppView.
#[cfg(feature = "reqwest-client")]
pub type PublicResolver = XrpcHandleResolver<reqwest::Client>;

#[cfg(feature = "reqwest-client")]
impl Default for PublicResolver {
    fn default() -> Self {
        let endpoint = XrpcEndpoint::new(url::Url::parse(PUBLIC_API).expect("valid url"));
        Self::new(reqwest::Client::new(), endpoint)
    }
}

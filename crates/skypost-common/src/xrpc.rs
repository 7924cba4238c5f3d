//! XRPC request plumbing: where calls go, how they are authorized, and how
//! a raw response is turned into either a body or a typed failure.
//!
//! Only the handful of calls skypost makes are modelled. Queries become `GET`
//! requests with a form-encoded query string; procedures become `POST`
//! requests carrying a caller-chosen body and content type.

use bytes::Bytes;
use http::{HeaderValue, Request};
use serde::Serialize;
use smol_str::SmolStr;
use url::Url;

use crate::error::{HttpError, TransportError};
use crate::http_client::HttpClient;

/// Base URL and optional bearer token for XRPC calls against one service.
///
/// Acquiring and refreshing the token is the caller's business; this only
/// attaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrpcEndpoint {
    base: Url,
    access_jwt: Option<SmolStr>,
}

/// Failure of a single XRPC round trip.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CallError {
    /// The request never produced a response
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
    /// The service answered with a non-success status
    #[error(transparent)]
    #[diagnostic(transparent)]
    Http(#[from] HttpError),
}

impl XrpcEndpoint {
    /// Unauthenticated endpoint rooted at `base`.
    pub fn new(base: Url) -> Self {
        Self {
            base,
            access_jwt: None,
        }
    }

    /// Parse `base` and build an unauthenticated endpoint.
    pub fn parse(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(base)?))
    }

    /// Attach a bearer token sent with every request.
    pub fn with_access_jwt(mut self, token: impl Into<SmolStr>) -> Self {
        self.access_jwt = Some(token.into());
        self
    }

    /// Service base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Bearer token, if one was attached.
    pub fn access_jwt(&self) -> Option<&str> {
        self.access_jwt.as_deref()
    }

    /// `{base}/xrpc/{nsid}`, keeping any path prefix the base already has.
    pub fn method_url(&self, nsid: &str) -> Url {
        let mut url = self.base.clone();
        let mut path = url.path().trim_end_matches('/').to_owned();
        path.push_str("/xrpc/");
        path.push_str(nsid);
        url.set_path(&path);
        url.set_query(None);
        url
    }

    /// Build a `GET` query request with `params` form-encoded into the URL.
    pub fn query<Q: Serialize>(
        &self,
        nsid: &str,
        params: &Q,
    ) -> Result<Request<Vec<u8>>, TransportError> {
        let mut url = self.method_url(nsid);
        let qs = serde_html_form::to_string(params)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if !qs.is_empty() {
            url.set_query(Some(&qs));
        }
        let builder = Request::builder()
            .method(http::Method::GET)
            .uri(url.as_str())
            .header(http::header::ACCEPT, "application/json");
        self.authorize(builder)?
            .body(Vec::new())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }

    /// Build a `POST` procedure request with a raw body.
    pub fn procedure(
        &self,
        nsid: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Request<Vec<u8>>, TransportError> {
        let url = self.method_url(nsid);
        let builder = Request::builder()
            .method(http::Method::POST)
            .uri(url.as_str())
            .header(http::header::CONTENT_TYPE, content_type)
            .header(http::header::ACCEPT, "application/json");
        self.authorize(builder)?
            .body(body)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }

    /// Build a `POST` procedure request with a JSON body.
    pub fn procedure_json<B: Serialize>(
        &self,
        nsid: &str,
        body: &B,
    ) -> Result<Request<Vec<u8>>, TransportError> {
        let body =
            serde_json::to_vec(body).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.procedure(nsid, "application/json", body)
    }

    fn authorize(
        &self,
        builder: http::request::Builder,
    ) -> Result<http::request::Builder, TransportError> {
        match &self.access_jwt {
            Some(token) => {
                let hv = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                    TransportError::InvalidRequest(format!("Invalid authorization token: {}", e))
                })?;
                Ok(builder.header(http::header::AUTHORIZATION, hv))
            }
            None => Ok(builder),
        }
    }
}

/// Send `request` and return the body of a 2xx response.
pub async fn send<C>(http: &C, request: Request<Vec<u8>>) -> Result<Bytes, CallError>
where
    C: HttpClient + Sync,
{
    #[cfg(feature = "tracing")]
    tracing::debug!(method = %request.method(), uri = %request.uri(), "xrpc call");

    let response = http
        .send_http(request)
        .await
        .map_err(Into::into)?;
    let status = response.status();
    let body = Bytes::from(response.into_body());
    if status.is_success() {
        Ok(body)
    } else {
        Err(HttpError {
            status,
            body: (!body.is_empty()).then_some(body),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_keeps_base_path() {
        let ep = XrpcEndpoint::parse("https://pds.example.com/proxy/").unwrap();
        assert_eq!(
            ep.method_url("com.atproto.repo.uploadBlob").as_str(),
            "https://pds.example.com/proxy/xrpc/com.atproto.repo.uploadBlob"
        );
    }

    #[test]
    fn query_encodes_params_and_skips_auth_when_absent() {
        #[derive(Serialize)]
        struct Params<'a> {
            handle: &'a str,
        }
        let ep = XrpcEndpoint::parse("https://bsky.social").unwrap();
        let req = ep
            .query(
                "com.atproto.identity.resolveHandle",
                &Params {
                    handle: "itodd.dev",
                },
            )
            .unwrap();
        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(
            req.uri().to_string(),
            "https://bsky.social/xrpc/com.atproto.identity.resolveHandle?handle=itodd.dev"
        );
        assert!(req.headers().get(http::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn procedure_sets_bearer_and_content_type() {
        let ep = XrpcEndpoint::parse("https://bsky.social")
            .unwrap()
            .with_access_jwt("acc1");
        let req = ep
            .procedure("com.atproto.repo.uploadBlob", "image/png", vec![1, 2, 3])
            .unwrap();
        assert_eq!(req.method(), http::Method::POST);
        assert_eq!(req.headers()[http::header::AUTHORIZATION], "Bearer acc1");
        assert_eq!(req.headers()[http::header::CONTENT_TYPE], "image/png");
        assert_eq!(req.body(), &vec![1, 2, 3]);
    }

    #[derive(Debug, thiserror::Error)]
    enum Flaky {
        #[error("deadline elapsed")]
        Deadline,
        #[error("connection reset")]
        Reset,
    }

    impl From<Flaky> for TransportError {
        fn from(err: Flaky) -> Self {
            match err {
                Flaky::Deadline => TransportError::Timeout,
                other => TransportError::other(other),
            }
        }
    }

    struct FlakyClient(fn() -> Flaky);

    impl HttpClient for FlakyClient {
        type Error = Flaky;

        fn send_http(
            &self,
            _request: Request<Vec<u8>>,
        ) -> impl core::future::Future<
            Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>,
        > + Send {
            let err = (self.0)();
            async move { Err(err) }
        }
    }

    #[tokio::test]
    async fn client_errors_keep_their_transport_kind() {
        let ep = XrpcEndpoint::parse("https://bsky.social").unwrap();
        let request = || ep.procedure("com.atproto.repo.uploadBlob", "image/png", vec![]).unwrap();

        let err = send(&FlakyClient(|| Flaky::Deadline), request())
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Transport(TransportError::Timeout)), "{err:?}");

        let err = send(&FlakyClient(|| Flaky::Reset), request())
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Transport(TransportError::Other(_))), "{err:?}");
    }

    #[cfg(feature = "reqwest-client")]
    #[tokio::test]
    async fn reqwest_timeout_maps_to_timeout() {
        // the kernel completes the handshake but nothing ever answers
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let ep = XrpcEndpoint::parse(&format!("http://{}", silent.local_addr().unwrap())).unwrap();
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();

        let request = ep
            .query("com.atproto.identity.resolveHandle", &[("handle", "itodd.dev")])
            .unwrap();
        let err = send(&client, request).await.unwrap_err();
        assert!(matches!(err, CallError::Transport(TransportError::Timeout)), "{err:?}");
    }

    #[cfg(feature = "reqwest-client")]
    #[tokio::test]
    async fn reqwest_refused_connection_maps_to_connect() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let ep = XrpcEndpoint::parse(&format!("http://{addr}")).unwrap();
        let request = ep
            .query("com.atproto.identity.resolveHandle", &[("handle", "itodd.dev")])
            .unwrap();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let err = send(&client, request).await.unwrap_err();
        assert!(matches!(err, CallError::Transport(TransportError::Connect(_))), "{err:?}");
    }
}

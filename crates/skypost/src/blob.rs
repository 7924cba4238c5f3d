//! Blob storage: where normalized images go before a record can point at them.

use std::future::Future;

use bytes::Bytes;
use serde::Deserialize;
use skypost_common::http_client::HttpClient;
use skypost_common::types::{Blob, MimeType};
use skypost_common::xrpc::{self, CallError, XrpcEndpoint};
use skypost_common::{HttpError, TransportError};

/// NSID of the blob upload procedure
pub const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";

/// A failed upload.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum UploadError {
    /// The request never completed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
    /// The store refused the blob
    #[error(transparent)]
    #[diagnostic(
        code(skypost::blob::rejected),
        help("uploads need a valid access token for the target PDS")
    )]
    Http(#[from] HttpError),
    /// The store answered with something that is not a blob reference
    #[error("malformed uploadBlob response: {0}")]
    #[diagnostic(code(skypost::blob::malformed))]
    Malformed(String),
}

impl From<CallError> for UploadError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(e) => Self::Transport(e),
            CallError::Http(e) => Self::Http(e),
        }
    }
}

/// Stores image bytes and hands back a reference usable in an embed.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait BlobStore {
    /// Upload `bytes`, declared as `mime_type`.
    fn upload_blob(
        &self,
        bytes: Bytes,
        mime_type: MimeType,
    ) -> impl Future<Output = Result<Blob, UploadError>>;
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: BlobStore + Sync + Send> BlobStore for std::sync::Arc<T> {
    fn upload_blob(
        &self,
        bytes: Bytes,
        mime_type: MimeType,
    ) -> impl Future<Output = Result<Blob, UploadError>> + Send {
        self.as_ref().upload_blob(bytes, mime_type)
    }
}

#[derive(Deserialize)]
struct UploadBlobOutput {
    blob: Blob,
}

/// Uploads through `com.atproto.repo.uploadBlob` on one PDS.
///
/// The endpoint must carry an access token; the store does not log in.
#[derive(Debug, Clone)]
pub struct XrpcBlobStore<C> {
    http: C,
    endpoint: XrpcEndpoint,
}

impl<C> XrpcBlobStore<C> {
    /// Store uploading to `endpoint` through `http`
    pub fn new(http: C, endpoint: XrpcEndpoint) -> Self {
        Self { http, endpoint }
    }

    /// The PDS being uploaded to
    pub fn endpoint(&self) -> &XrpcEndpoint {
        &self.endpoint
    }
}

impl<C: HttpClient + Sync> BlobStore for XrpcBlobStore<C> {
    #[tracing::instrument(level = "debug", skip(self, bytes), fields(size = bytes.len(), mime = %mime_type))]
    async fn upload_blob(&self, bytes: Bytes, mime_type: MimeType) -> Result<Blob, UploadError> {
        let request = self
            .endpoint
            .procedure(UPLOAD_BLOB, mime_type.as_str(), bytes.to_vec())?;
        let body = xrpc::send(&self.http, request).await?;
        let out: UploadBlobOutput =
            serde_json::from_slice(&body).map_err(|e| UploadError::Malformed(e.to_string()))?;
        tracing::debug!(cid = out.blob.r#ref.as_str(), "uploaded blob");
        Ok(out.blob)
    }
}

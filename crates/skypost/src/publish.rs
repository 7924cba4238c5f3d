//! Writing an assembled post to a repository.

use serde::Deserialize;
use skypost_common::http_client::HttpClient;
use skypost_common::xrpc::{self, CallError, XrpcEndpoint};
use skypost_common::{HttpError, TransportError};
use smol_str::SmolStr;

use crate::record::PostRecord;

/// NSID of the record creation procedure
pub const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Where the new record lives.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecord {
    /// `at://` URI of the post
    pub uri: SmolStr,
    /// CID of the stored record
    pub cid: SmolStr,
}

/// A record that was not written.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PublishError {
    /// The request never completed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
    /// The PDS rejected the record
    #[error("createRecord failed with {}: {}", .0.status, .0.xrpc_error().unwrap_or_default())]
    #[diagnostic(
        code(skypost::publish::rejected),
        help("check the access token and that `repo` names the authenticated account")
    )]
    Rejected(#[source] HttpError),
    /// The PDS answered with something other than a record reference
    #[error("malformed createRecord response: {0}")]
    #[diagnostic(code(skypost::publish::malformed))]
    Malformed(String),
}

impl PublishError {
    /// The server's `error` field, when it sent one
    pub fn xrpc_error(&self) -> Option<String> {
        match self {
            Self::Rejected(e) => e.xrpc_error(),
            _ => None,
        }
    }

    /// The server's `message` field, when it sent one
    pub fn xrpc_message(&self) -> Option<String> {
        match self {
            Self::Rejected(e) => e.xrpc_message(),
            _ => None,
        }
    }
}

/// Create `record` in `repo` (a DID or handle) on the PDS behind `endpoint`.
///
/// `endpoint` must carry an access token for that account.
#[tracing::instrument(level = "debug", skip(http, endpoint, record))]
pub async fn create_post<C>(
    http: &C,
    endpoint: &XrpcEndpoint,
    repo: &str,
    record: &PostRecord,
) -> Result<CreatedRecord, PublishError>
where
    C: HttpClient + Sync,
{
    let request = endpoint.procedure_json(CREATE_RECORD, &record.to_create_request(repo))?;
    let body = match xrpc::send(http, request).await {
        Ok(body) => body,
        Err(CallError::Transport(e)) => return Err(e.into()),
        Err(CallError::Http(e)) => return Err(PublishError::Rejected(e)),
    };
    let created: CreatedRecord =
        serde_json::from_slice(&body).map_err(|e| PublishError::Malformed(e.to_string()))?;
    tracing::debug!(uri = %created.uri, "created post");
    Ok(created)
}

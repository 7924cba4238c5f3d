//! Mention resolution: scanned handles in, mention facets out.
//!
//! Resolution is best effort per mention. A handle that fails to resolve for
//! any reason loses its facet and is reported to the fault sink; the other
//! mentions and the rest of the build carry on.

use futures::future::join_all;
use skypost_common::types::{Did, Handle, InvalidStr};
use skypost_identity::{HandleResolver, IdentityError};

use crate::error::Stage;
use crate::facet::Facet;
use crate::observe::{Fault, FaultSink};
use crate::richtext::Candidate;

/// Why a single mention was dropped.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ResolutionFault {
    /// The scanned text is not a handle the resolver can be asked about
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidHandle(#[from] InvalidStr),
    /// The lookup itself failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lookup(#[from] IdentityError),
}

/// Resolve one scanned handle (without its `@`).
pub async fn resolve_mention<R>(resolver: &R, handle: &str) -> Result<Did, ResolutionFault>
where
    R: HandleResolver + Sync,
{
    let handle = Handle::new(handle)?;
    Ok(resolver.resolve_handle(&handle).await?)
}

/// Resolve every mention concurrently and return the facets that survived,
/// in the order the mentions appear in the text.
#[tracing::instrument(level = "debug", skip_all, fields(mentions = mentions.len()))]
pub async fn resolve_mentions<R>(
    resolver: &R,
    mentions: &[Candidate<'_>],
    sink: &dyn FaultSink,
) -> Vec<Facet>
where
    R: HandleResolver + Sync,
{
    let lookups = mentions
        .iter()
        .map(|candidate| async move { (candidate, resolve_mention(resolver, candidate.value).await) });

    // join_all yields in input order however the lookups interleave
    join_all(lookups)
        .await
        .into_iter()
        .filter_map(|(candidate, outcome)| match outcome {
            Ok(did) => {
                tracing::debug!(handle = candidate.value, %did, "resolved mention");
                Some(Facet::mention(candidate, did))
            }
            Err(fault) => {
                sink.report(&Fault::new(Stage::Resolve, candidate.value, &fault));
                None
            }
        })
        .collect()
}

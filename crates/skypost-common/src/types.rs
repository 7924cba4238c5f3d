/// Blob references and MIME types
pub mod blob;
/// RFC 3339 timestamps
pub mod datetime;
/// Decentralized identifiers
pub mod did;
/// Account handles
pub mod handle;

pub use blob::{Blob, BlobRef, CidLink, MimeType};
pub use datetime::Datetime;
pub use did::Did;
pub use handle::Handle;

/// Error constructing one of the validated string types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("invalid {kind} {value:?}: {reason}")]
#[diagnostic(code(skypost_common::types::invalid))]
pub struct InvalidStr {
    /// Which type rejected the value
    pub kind: &'static str,
    /// The rejected input
    pub value: smol_str::SmolStr,
    /// What was wrong with it
    pub reason: &'static str,
}

impl InvalidStr {
    pub(crate) fn new(kind: &'static str, value: &str, reason: &'static str) -> Self {
        Self {
            kind,
            value: value.into(),
            reason,
        }
    }
}

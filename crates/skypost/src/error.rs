//! Build failures surfaced to the caller

use std::fmt;

use crate::blob::UploadError;
use crate::image::NormalizeError;
use crate::record::AssemblyError;

/// Pipeline stage, used to label faults and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving mention handles
    Resolve,
    /// Fitting images under the size ceiling
    Normalize,
    /// Uploading image blobs
    Upload,
    /// Assembling the record
    Assemble,
}

impl Stage {
    /// Lowercase stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Normalize => "normalize",
            Stage::Upload => "upload",
            Stage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build that produced no record.
///
/// Image and assembly failures are fatal to the whole post. Mention lookups
/// never end up here; see [`crate::resolve`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum BuildError {
    /// An image could not be decoded or brought under the size ceiling
    #[error("image {index} could not be normalized")]
    #[diagnostic(code(skypost::build::normalize))]
    Normalize {
        /// Position of the image in the draft
        index: usize,
        /// What went wrong
        #[source]
        #[diagnostic_source]
        source: NormalizeError,
    },
    /// The blob store rejected or failed an image upload
    #[error("image {index} upload failed")]
    #[diagnostic(code(skypost::build::upload))]
    Upload {
        /// Position of the image in the draft
        index: usize,
        /// What went wrong
        #[source]
        #[diagnostic_source]
        source: UploadError,
    },
    /// The image worker task panicked or was cancelled
    #[error("image {index} worker failed: {message}")]
    #[diagnostic(code(skypost::build::worker))]
    Worker {
        /// Position of the image in the draft
        index: usize,
        /// Rendered join error
        message: String,
    },
    /// Scanned or supplied facets did not fit the text
    #[error(transparent)]
    #[diagnostic(transparent)]
    Assembly(#[from] AssemblyError),
}

impl BuildError {
    /// Stage the build failed in
    pub fn stage(&self) -> Stage {
        match self {
            BuildError::Normalize { .. } | BuildError::Worker { .. } => Stage::Normalize,
            BuildError::Upload { .. } => Stage::Upload,
            BuildError::Assembly(_) => Stage::Assemble,
        }
    }
}

/// Result alias for builds
pub type Result<T> = std::result::Result<T, BuildError>;

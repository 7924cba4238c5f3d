//! Drafts and the pipeline that turns them into records.
//!
//! A [`PostDraft`] is a plain value: text, languages and images, grown by
//! methods that consume and return it. [`Composer::compose`] reads a draft
//! once and either produces a [`PostRecord`] or a [`BuildError`].
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use skypost::compose::{Composer, LocalImage, PostDraft};
//! use skypost::blob::XrpcBlobStore;
//! use skypost_common::XrpcEndpoint;
//! use skypost_identity::PublicResolver;
//!
//! let pds = XrpcEndpoint::parse("https://bsky.social")?.with_access_jwt("...");
//! let composer = Composer::new(
//!     PublicResolver::default(),
//!     XrpcBlobStore::new(reqwest::Client::new(), pds),
//! );
//!
//! let draft = PostDraft::new("Hello @itodd.dev, see https://go.dev ")
//!     .append("#golang")
//!     .lang("en")
//!     .image(LocalImage::from_path("gopher.png", "a gopher").await?);
//! let record = composer.compose(&draft).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use skypost_identity::HandleResolver;
use smol_str::SmolStr;

use crate::blob::BlobStore;
use crate::error::{BuildError, Result};
use crate::facet::Facet;
use crate::image::{DEFAULT_MAX_RESCALE_ROUNDS, normalize_with_rounds};
use crate::observe::{FaultSink, TracingSink};
use crate::record::{PostRecord, UploadedImage, assemble};
use crate::resolve::resolve_mentions;
use crate::richtext;

/// Largest image blob `app.bsky.embed.images` accepts, in bytes.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1_000_000;

/// Image bytes supplied by the caller, with their alt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    bytes: Bytes,
    alt: SmolStr,
}

impl LocalImage {
    /// Wrap bytes already in memory.
    pub fn new(bytes: impl Into<Bytes>, alt: impl Into<SmolStr>) -> Self {
        Self {
            bytes: bytes.into(),
            alt: alt.into(),
        }
    }

    /// Read an image file. The format is detected from content, not the
    /// file name.
    pub async fn from_path(
        path: impl AsRef<Path>,
        alt: impl Into<SmolStr>,
    ) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(Self::new(bytes, alt))
    }

    /// The raw bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The alt text
    pub fn alt(&self) -> &str {
        &self.alt
    }
}

/// Everything a post is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    text: String,
    langs: Vec<SmolStr>,
    images: Vec<LocalImage>,
}

impl PostDraft {
    /// Draft starting with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Append `text` to the end of the post.
    pub fn append(mut self, text: &str) -> Self {
        self.text.push_str(text);
        self
    }

    /// Add a language tag. Empty tags are ignored.
    pub fn lang(mut self, tag: impl Into<SmolStr>) -> Self {
        let tag = tag.into();
        if !tag.is_empty() {
            self.langs.push(tag);
        }
        self
    }

    /// Attach an image after any already attached.
    pub fn image(mut self, image: LocalImage) -> Self {
        self.images.push(image);
        self
    }

    /// The post text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Language tags, in the order added
    pub fn langs(&self) -> &[SmolStr] {
        &self.langs
    }

    /// Attached images, in the order added
    pub fn images(&self) -> &[LocalImage] {
        &self.images
    }
}

/// Tunables for [`Composer`].
///
/// ```
/// use skypost::compose::ComposeOptions;
///
/// let options = ComposeOptions::builder().max_rescale_rounds(8).build();
/// assert_eq!(options.max_image_bytes, 1_000_000);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct ComposeOptions {
    /// Size ceiling for each uploaded image
    #[builder(default = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,
    /// Rescale rounds tried before an image is rejected
    #[builder(default = DEFAULT_MAX_RESCALE_ROUNDS)]
    pub max_rescale_rounds: u32,
    /// Receives dropped mentions
    #[builder(default = Arc::new(TracingSink) as Arc<dyn FaultSink>)]
    pub fault_sink: Arc<dyn FaultSink>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builds records from drafts using a handle resolver and a blob store.
#[derive(Debug, Clone)]
pub struct Composer<R, S> {
    resolver: R,
    store: S,
    options: ComposeOptions,
}

impl<R, S> Composer<R, S> {
    /// Composer with default options.
    pub fn new(resolver: R, store: S) -> Self {
        Self::with_options(resolver, store, ComposeOptions::default())
    }

    /// Composer with explicit options.
    pub fn with_options(resolver: R, store: S, options: ComposeOptions) -> Self {
        Self {
            resolver,
            store,
            options,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }
}

impl<R, S> Composer<R, S>
where
    R: HandleResolver + Sync,
    S: BlobStore + Sync,
{
    /// Build a record from `draft`.
    ///
    /// Mentions are resolved while images are normalized and uploaded. A
    /// mention that cannot be resolved only loses its facet; any image
    /// failure fails the whole build.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(text_len = draft.text().len(), images = draft.images().len())
    )]
    pub async fn compose(&self, draft: &PostDraft) -> Result<PostRecord> {
        let text = draft.text();
        let found = richtext::detect(text);
        tracing::debug!(
            links = found.links.len(),
            mentions = found.mentions.len(),
            tags = found.tags.len(),
            "scanned text"
        );

        let sink: &dyn FaultSink = self.options.fault_sink.as_ref();
        let uploads = try_join_all(
            draft
                .images()
                .iter()
                .enumerate()
                .map(|(index, image)| self.prepare_image(index, image)),
        );
        let (mentions, images) = futures::join!(
            resolve_mentions(&self.resolver, &found.mentions, sink),
            uploads
        );
        let images = images?;

        let links = found.links.iter().map(Facet::link).collect();
        let tags = found.tags.iter().map(Facet::tag).collect();
        Ok(assemble(
            text,
            draft.langs().to_vec(),
            links,
            mentions,
            tags,
            images,
        )?)
    }

    async fn prepare_image(&self, index: usize, image: &LocalImage) -> Result<UploadedImage> {
        let raw = image.bytes().clone();
        let max_size = self.options.max_image_bytes;
        let rounds = self.options.max_rescale_rounds;
        let normalized =
            tokio::task::spawn_blocking(move || normalize_with_rounds(&raw, max_size, rounds))
                .await
                .map_err(|e| BuildError::Worker {
                    index,
                    message: e.to_string(),
                })?
                .map_err(|source| BuildError::Normalize { index, source })?;

        tracing::debug!(
            index,
            size = normalized.bytes.len(),
            width = normalized.width,
            height = normalized.height,
            "normalized image"
        );

        let blob = self
            .store
            .upload_blob(normalized.bytes, normalized.mime_type)
            .await
            .map_err(|source| BuildError::Upload { index, source })?;

        Ok(UploadedImage {
            alt: image.alt.clone(),
            blob,
            width: normalized.width,
            height: normalized.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_accumulates_functionally() {
        let base = PostDraft::new("Hello");
        let draft = base
            .clone()
            .append(", world")
            .lang("en")
            .lang("")
            .lang("ja")
            .image(LocalImage::new(vec![1u8, 2, 3], "first"))
            .image(LocalImage::new(Bytes::from_static(b"xyz"), "second"));

        assert_eq!(base.text(), "Hello");
        assert_eq!(draft.text(), "Hello, world");
        assert_eq!(draft.langs(), &["en", "ja"]);
        let alts: Vec<_> = draft.images().iter().map(LocalImage::alt).collect();
        assert_eq!(alts, vec!["first", "second"]);
    }

    #[test]
    fn default_options() {
        let options = ComposeOptions::default();
        assert_eq!(options.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(options.max_rescale_rounds, DEFAULT_MAX_RESCALE_ROUNDS);
    }

    #[tokio::test]
    async fn local_image_from_missing_path_is_io_error() {
        let err = LocalImage::from_path("/definitely/not/here.png", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

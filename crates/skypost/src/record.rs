//! The `app.bsky.feed.post` record and its assembly.
//!
//! [`assemble`] is the last step of a build. Everything it receives has
//! already been scanned, resolved and uploaded; it only checks that the
//! facets fit the text, fixes their order and stamps the creation time.

use serde::{Deserialize, Serialize};
use skypost_common::types::{Blob, BlobRef, Datetime};
use smol_str::SmolStr;

use crate::facet::Facet;

/// NSID of the post record type, also its collection
pub const POST_NSID: &str = "app.bsky.feed.post";

/// A post record, ready to be written to a repository.
///
/// Optional fields are `None` rather than empty; a `None` field is left out
/// of the JSON entirely.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    /// The post text
    pub text: SmolStr,
    /// When the record was assembled
    pub created_at: Datetime,
    /// BCP-47 language tags
    #[serde(skip_serializing_if = "Option::is_none")]
    pub langs: Option<Vec<SmolStr>>,
    /// Links, then mentions, then tags, each group in text order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<Vec<Facet>>,
    /// Attached media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<PostEmbed>,
}

/// Media attached to a post.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "$type")]
pub enum PostEmbed {
    /// One or more images
    #[serde(rename = "app.bsky.embed.images")]
    Images(Images),
}

/// `app.bsky.embed.images`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Images {
    /// Images in the order they were attached
    pub images: Vec<ImageEmbed>,
}

/// One embedded image.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageEmbed {
    /// Alt text, possibly empty
    pub alt: SmolStr,
    /// The uploaded blob
    pub image: BlobRef,
    /// Pixel dimensions of the uploaded bytes
    pub aspect_ratio: AspectRatio,
}

/// Width and height of an image, in pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// An image that has been normalized and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Alt text from the draft
    pub alt: SmolStr,
    /// Reference returned by the blob store
    pub blob: Blob,
    /// Width of the stored bytes
    pub width: u32,
    /// Height of the stored bytes
    pub height: u32,
}

impl From<UploadedImage> for ImageEmbed {
    fn from(image: UploadedImage) -> Self {
        Self {
            alt: image.alt,
            image: image.blob.into(),
            aspect_ratio: AspectRatio {
                width: image.width,
                height: image.height,
            },
        }
    }
}

/// A facet that does not describe a piece of the text.
///
/// Scanner output never triggers this; it guards facets built by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum AssemblyError {
    /// Empty, reversed or past the end of the text
    #[error("facet span {start}..{end} is invalid for text of {len} bytes")]
    #[diagnostic(
        code(skypost::record::invalid_span),
        help("spans are half-open byte ranges with start < end <= text length")
    )]
    InvalidSpan {
        /// Span start
        start: usize,
        /// Span end
        end: usize,
        /// Text length in bytes
        len: usize,
    },
    /// Splits a multi-byte character
    #[error("facet span {start}..{end} does not fall on UTF-8 character boundaries")]
    #[diagnostic(code(skypost::record::char_boundary))]
    NotCharBoundary {
        /// Span start
        start: usize,
        /// Span end
        end: usize,
    },
    /// Carries no features
    #[error("facet span {start}..{end} has no features")]
    #[diagnostic(code(skypost::record::empty_facet))]
    NoFeatures {
        /// Span start
        start: usize,
        /// Span end
        end: usize,
    },
}

fn check_facet(text: &str, facet: &Facet) -> Result<(), AssemblyError> {
    let (start, end) = (facet.index.byte_start, facet.index.byte_end);
    if start >= end || end > text.len() {
        return Err(AssemblyError::InvalidSpan {
            start,
            end,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return Err(AssemblyError::NotCharBoundary { start, end });
    }
    if facet.features.is_empty() {
        return Err(AssemblyError::NoFeatures { start, end });
    }
    Ok(())
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Build the record.
///
/// Facets are emitted links first, then mentions, then tags, each group in
/// the order given. Overlapping spans across groups are kept as they are.
/// `created_at` is read from the clock on every call.
pub fn assemble(
    text: &str,
    langs: Vec<SmolStr>,
    links: Vec<Facet>,
    mentions: Vec<Facet>,
    tags: Vec<Facet>,
    images: Vec<UploadedImage>,
) -> Result<PostRecord, AssemblyError> {
    let facets: Vec<Facet> = links.into_iter().chain(mentions).chain(tags).collect();
    for facet in &facets {
        check_facet(text, facet)?;
    }

    let embed = non_empty(images).map(|images| {
        PostEmbed::Images(Images {
            images: images.into_iter().map(ImageEmbed::from).collect(),
        })
    });

    Ok(PostRecord {
        text: text.into(),
        created_at: Datetime::now(),
        langs: non_empty(langs),
        facets: non_empty(facets),
        embed,
    })
}

/// A record wrapped with its `$type`, as repositories store it.
#[derive(Serialize, Debug)]
pub struct TypedRecord<'r> {
    #[serde(rename = "$type")]
    r#type: &'static str,
    #[serde(flatten)]
    record: &'r PostRecord,
}

/// Body of `com.atproto.repo.createRecord` for a post.
#[derive(Serialize, Debug)]
pub struct CreateRecordRequest<'r> {
    /// DID or handle of the repository to write to
    pub repo: &'r str,
    /// Always `app.bsky.feed.post`
    pub collection: &'static str,
    /// The record itself
    pub record: TypedRecord<'r>,
}

impl PostRecord {
    /// The record with its `$type` attached.
    pub fn typed(&self) -> TypedRecord<'_> {
        TypedRecord {
            r#type: POST_NSID,
            record: self,
        }
    }

    /// The `createRecord` body that writes this post to `repo`.
    pub fn to_create_request<'r>(&'r self, repo: &'r str) -> CreateRecordRequest<'r> {
        CreateRecordRequest {
            repo,
            collection: POST_NSID,
            record: self.typed(),
        }
    }
}

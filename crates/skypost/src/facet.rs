//! `app.bsky.richtext.facet` wire types

use std::ops::Range;

use serde::{Deserialize, Serialize};
use skypost_common::types::Did;
use smol_str::SmolStr;

use crate::richtext::Candidate;

///Specifies the sub-string range a facet feature applies to. Start index is inclusive, end index is exclusive. Indices are zero-indexed, counting bytes of the UTF-8 encoded text.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    /// First byte, inclusive
    pub byte_start: usize,
    /// Last byte, exclusive
    pub byte_end: usize,
}

impl ByteSlice {
    /// Half-open range this slice covers
    pub fn range(&self) -> Range<usize> {
        self.byte_start..self.byte_end
    }
}

impl From<Range<usize>> for ByteSlice {
    fn from(range: Range<usize>) -> Self {
        Self {
            byte_start: range.start,
            byte_end: range.end,
        }
    }
}

///A single facet feature. Serialized with its lexicon `$type`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "$type")]
pub enum Feature {
    ///Facet feature for a URL.
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link {
        /// The linked URL
        uri: SmolStr,
    },
    ///Facet feature for mention of another account. The text is usually a handle, including a '@' prefix, but the facet reference is a DID.
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention {
        /// The mentioned account
        did: Did,
    },
    ///Facet feature for a hashtag. The text usually includes a '#' prefix, but the facet reference should not.
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag {
        /// Tag text without the leading `#`
        tag: SmolStr,
    },
}

///Annotation of a sub-string within rich text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Facet {
    /// The annotated bytes
    pub index: ByteSlice,
    /// What the bytes are; never empty for facets built here
    pub features: Vec<Feature>,
}

impl Facet {
    /// Facet carrying exactly one feature
    pub fn new(range: Range<usize>, feature: Feature) -> Self {
        Self {
            index: range.into(),
            features: vec![feature],
        }
    }

    /// Link facet from a scanned link
    pub fn link(candidate: &Candidate<'_>) -> Self {
        Self::new(
            candidate.range.clone(),
            Feature::Link {
                uri: candidate.value.into(),
            },
        )
    }

    /// Mention facet for a resolved handle
    pub fn mention(candidate: &Candidate<'_>, did: Did) -> Self {
        Self::new(candidate.range.clone(), Feature::Mention { did })
    }

    /// Tag facet from a scanned tag
    pub fn tag(candidate: &Candidate<'_>) -> Self {
        Self::new(
            candidate.range.clone(),
            Feature::Tag {
                tag: candidate.value.into(),
            },
        )
    }
}

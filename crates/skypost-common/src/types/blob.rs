use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::convert::Infallible;
use std::{fmt, ops::Deref, str::FromStr};

/// Content identifier link, serialized as `{"$link": "bafk..."}` in JSON.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CidLink {
    /// The CID string
    #[serde(rename = "$link")]
    pub link: SmolStr,
}

impl CidLink {
    /// Wrap a CID string
    pub fn new(cid: impl Into<SmolStr>) -> Self {
        Self { link: cid.into() }
    }

    /// Get the CID as a string slice
    pub fn as_str(&self) -> &str {
        &self.link
    }
}

/// Blob reference for binary data stored by a PDS
///
/// Returned by the blob store after an upload and embedded as-is in records.
/// In JSON the blob reads `{"$type":"blob","ref":{"$link":..},"mimeType":..,"size":..}`;
/// the `$type` tag is supplied by [`BlobRef`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// Content reference to the stored bytes
    pub r#ref: CidLink,
    /// MIME type the store recorded for the blob
    pub mime_type: MimeType,
    /// Size of the blob in bytes, as declared by the store
    pub size: usize,
}

/// Tagged blob reference with `$type` field for serde
///
/// This enum provides the `{"$type": "blob"}` wrapper expected by AT Protocol's JSON format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "$type", rename_all = "lowercase")]
pub enum BlobRef {
    /// Blob variant with embedded blob data
    Blob(Blob),
}

impl BlobRef {
    /// Get the inner blob reference
    pub fn blob(&self) -> &Blob {
        match self {
            BlobRef::Blob(blob) => blob,
        }
    }
}

impl From<BlobRef> for Blob {
    fn from(blob_ref: BlobRef) -> Self {
        match blob_ref {
            BlobRef::Blob(blob) => blob,
        }
    }
}

impl From<Blob> for BlobRef {
    fn from(blob: Blob) -> Self {
        BlobRef::Blob(blob)
    }
}

/// MIME type identifier for blob data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MimeType(pub SmolStr);

impl MimeType {
    /// `image/png`
    pub const PNG: &'static str = "image/png";
    /// `image/jpeg`
    pub const JPEG: &'static str = "image/jpeg";
    /// `image/gif`
    pub const GIF: &'static str = "image/gif";

    /// Constructor, takes ownership
    pub fn new(mime_type: impl AsRef<str>) -> Self {
        Self(SmolStr::new(mime_type.as_ref()))
    }

    /// Constructor for static strings, doesn't allocate
    pub const fn new_static(mime_type: &'static str) -> Self {
        Self(SmolStr::new_static(mime_type))
    }

    /// Get the MIME type as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MimeType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MimeType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for MimeType {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_ref_json_shape() {
        let blob = BlobRef::Blob(Blob {
            r#ref: CidLink::new("bafkreibabalobzn6cd366ukcsjycp4yymjymgfxcv6xczmlgpemzkz3cfa"),
            mime_type: MimeType::new_static(MimeType::PNG),
            size: 760898,
        });
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "$type": "blob",
                "ref": {"$link": "bafkreibabalobzn6cd366ukcsjycp4yymjymgfxcv6xczmlgpemzkz3cfa"},
                "mimeType": "image/png",
                "size": 760898
            })
        );
        let back: BlobRef = serde_json::from_value(json).unwrap();
        assert_eq!(back, blob);
    }
}

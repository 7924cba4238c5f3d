use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::SmolStr;
use std::fmt;
use std::{ops::Deref, str::FromStr};

use super::InvalidStr;

/// Decentralized identifier, the durable identity a handle resolves to.
///
/// Validated against the AT Protocol DID syntax:
/// `did:<method>:<identifier>`, lowercase method, identifier characters
/// `[a-zA-Z0-9._:%-]`, not ending in `:` or `%`, at most 2048 bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Did(SmolStr);

const MAX_DID_LEN: usize = 2048;

fn validate(did: &str) -> Result<(), &'static str> {
    if did.len() > MAX_DID_LEN {
        return Err("longer than 2048 bytes");
    }
    let rest = did.strip_prefix("did:").ok_or("missing did: prefix")?;
    let (method, ident) = rest.split_once(':').ok_or("missing method separator")?;
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err("method must be lowercase ascii letters");
    }
    let last = ident.bytes().last().ok_or("empty identifier")?;
    let allowed = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'%' | b'-');
    if !ident.bytes().all(allowed) {
        return Err("identifier contains invalid characters");
    }
    if matches!(last, b':' | b'%') {
        return Err("identifier may not end in ':' or '%'");
    }
    Ok(())
}

impl Did {
    /// Fallible constructor, validates, takes ownership
    pub fn new(did: impl AsRef<str>) -> Result<Self, InvalidStr> {
        let did = did.as_ref();
        validate(did).map_err(|reason| InvalidStr::new("did", did, reason))?;
        Ok(Self(SmolStr::new(did)))
    }

    /// Fallible constructor for static strings, doesn't allocate
    pub fn new_static(did: &'static str) -> Result<Self, InvalidStr> {
        validate(did).map_err(|reason| InvalidStr::new("did", did, reason))?;
        Ok(Self(SmolStr::new_static(did)))
    }

    /// The DID method, e.g. `plc` for `did:plc:...`
    pub fn method(&self) -> &str {
        self.0
            .strip_prefix("did:")
            .and_then(|rest| rest.split(':').next())
            .unwrap_or_default()
    }

    /// Get the DID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Did {
    type Err = InvalidStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: SmolStr = Deserialize::deserialize(deserializer)?;
        Self::new(&value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}", self.0)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Did {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

use std::fmt;
use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::SmolStr;

use super::InvalidStr;

/// Human-readable account name such as `alice.bsky.social`.
///
/// Validation is syntactic only: two or more dot-separated labels of 1-63
/// characters from `[a-zA-Z0-9-]`, no label starting or ending with a hyphen,
/// and a final label starting with a letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
pub struct Handle(SmolStr);

const MAX_HANDLE_LEN: usize = 253;

fn valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= 63
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

fn validate(handle: &str) -> Result<(), &'static str> {
    if handle.len() > MAX_HANDLE_LEN {
        return Err("longer than 253 bytes");
    }
    let (domain, tld) = handle.rsplit_once('.').ok_or("needs at least two labels")?;
    if !domain.split('.').all(valid_label) {
        return Err("invalid domain label");
    }
    if !valid_label(tld) || !tld.as_bytes()[0].is_ascii_alphabetic() {
        return Err("final label must start with a letter");
    }
    Ok(())
}

impl Handle {
    /// Fallible constructor, validates, takes ownership
    ///
    /// Accepts (and strips) a preceding '@' if present
    pub fn new(handle: impl AsRef<str>) -> Result<Self, InvalidStr> {
        let handle = handle.as_ref();
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        validate(handle).map_err(|reason| InvalidStr::new("handle", handle, reason))?;
        Ok(Self(SmolStr::new(handle)))
    }

    /// Fallible constructor for static strings, doesn't allocate
    pub fn new_static(handle: &'static str) -> Result<Self, InvalidStr> {
        validate(handle).map_err(|reason| InvalidStr::new("handle", handle, reason))?;
        Ok(Self(SmolStr::new_static(handle)))
    }

    /// Get the handle as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Handle {
    type Err = InvalidStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: SmolStr = Deserialize::deserialize(deserializer)?;
        Self::new(&value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Handle {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_handles() {
        assert_eq!(Handle::new("itodd.dev").unwrap().as_str(), "itodd.dev");
        assert_eq!(Handle::new("@golang.org").unwrap().as_str(), "golang.org");
        assert!(Handle::new("alice.bsky.social").is_ok());
        assert!(Handle::new("xn--ls8h.test").is_ok());
        assert_eq!(
            Handle::new("alice.bsky.social").unwrap().to_string(),
            "@alice.bsky.social"
        );
    }

    #[test]
    fn rejects_malformed_handles() {
        assert!(Handle::new("localhost").is_err());
        assert!(Handle::new("-bad.com").is_err());
        assert!(Handle::new("bad-.com").is_err());
        assert!(Handle::new("example.1com").is_err());
        assert!(Handle::new("a..com").is_err());
        assert!(Handle::new(format!("{}.com", "a".repeat(64))).is_err());
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
use smol_str::{SmolStr, ToSmolStr};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::{cmp, str::FromStr};

/// RFC 3339 timestamp as it appears in record `createdAt` fields.
///
/// Timestamps created locally are UTC, whole-second precision, with a `Z`
/// suffix (`2024-05-01T12:30:00Z`). Parsed timestamps keep their original
/// serialization so they round-trip byte for byte.
#[derive(Clone, Debug, Eq)]
pub struct Datetime {
    serialized: SmolStr,
    dt: chrono::DateTime<chrono::FixedOffset>,
}

impl PartialEq for Datetime {
    fn eq(&self, other: &Self) -> bool {
        self.dt == other.dt
    }
}

// hash the instant only, so values equal under `PartialEq` hash alike
impl Hash for Datetime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dt.hash(state);
    }
}

impl Ord for Datetime {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.dt.cmp(&other.dt)
    }
}

impl PartialOrd for Datetime {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Datetime {
    /// The current wall-clock time in UTC.
    pub fn now() -> Self {
        Self::new(chrono::Utc::now())
    }

    /// Build from a UTC instant, truncated to whole seconds.
    pub fn new(dt: chrono::DateTime<chrono::Utc>) -> Self {
        let serialized = dt
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            .to_smolstr();
        // reparse so the stored instant matches the truncated text exactly
        let dt = chrono::DateTime::parse_from_rfc3339(&serialized)
            .unwrap_or_else(|_| dt.fixed_offset());
        Self { serialized, dt }
    }

    /// Extracts a string slice containing the entire `Datetime`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// The instant this timestamp names, in UTC.
    pub fn to_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.dt.with_timezone(&chrono::Utc)
    }
}

impl FromStr for Datetime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = chrono::DateTime::parse_from_rfc3339(s)?;
        Ok(Self {
            serialized: s.to_smolstr(),
            dt,
        })
    }
}

impl<'de> Deserialize<'de> for Datetime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: SmolStr = Deserialize::deserialize(deserializer)?;
        Self::from_str(&value).map_err(D::Error::custom)
    }
}

impl Serialize for Datetime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.serialized)
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Datetime {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self::new(dt)
    }
}

//! Media identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{MEDIA_ID_LEN, WATCH_URL_PREFIX};
use crate::error::{MuzicError, Result};

/// An opaque, validated media identifier.
///
/// Identifiers are exactly [`MEDIA_ID_LEN`] characters drawn from
/// `[A-Za-z0-9_-]`. Anything else is rejected before a resolution is
/// attempted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(String);

impl MediaId {
    /// Parses and validates an identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref();
        Self::validate(raw)?;
        Ok(Self(raw.to_string()))
    }

    fn validate(raw: &str) -> Result<()> {
        if raw.len() != MEDIA_ID_LEN {
            return Err(MuzicError::InvalidIdentifier(format!(
                "expected {} characters, got {}",
                MEDIA_ID_LEN,
                raw.len()
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(MuzicError::InvalidIdentifier(format!(
                "unexpected character {:?}",
                bad
            )));
        }
        Ok(())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the watch-page URL handed to the resolver.
    pub fn watch_url(&self) -> String {
        format!("{}{}", WATCH_URL_PREFIX, self.0)
    }
}

impl FromStr for MediaId {
    type Err = MuzicError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MediaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for MediaId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MediaId::new(raw).map_err(serde::de::Error::custom)
    }
}

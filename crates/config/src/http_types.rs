//! Thin wrappers around `http` header types so they can implement `serde::Deserialize`.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// A validated HTTP header name, deserializable from a TOML string.
#[derive(Debug, Clone)]
pub struct HeaderName(http::HeaderName);

impl HeaderName {
    /// Returns the header name as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unwraps into the underlying `http::HeaderName`.
    pub fn into_inner(self) -> http::HeaderName {
        self.0
    }
}

impl<'de> Deserialize<'de> for HeaderName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let name = http::HeaderName::try_from(s).map_err(serde::de::Error::custom)?;
        Ok(HeaderName(name))
    }
}

/// A validated HTTP header value, deserializable from a TOML string.
#[derive(Debug, Clone)]
pub struct HeaderValue(http::HeaderValue);

impl HeaderValue {
    /// Returns the header value as a string slice, if it is valid UTF-8/visible-ASCII.
    pub fn to_str(&self) -> Result<&str, http::header::ToStrError> {
        self.0.to_str()
    }

    /// Unwraps into the underlying `http::HeaderValue`.
    pub fn into_inner(self) -> http::HeaderValue {
        self.0
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.to_str() {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl<'de> Deserialize<'de> for HeaderValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = http::HeaderValue::try_from(s).map_err(serde::de::Error::custom)?;
        Ok(HeaderValue(value))
    }
}

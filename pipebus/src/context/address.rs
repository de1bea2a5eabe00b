//! Endpoint addresses.

use crate::errors::ConfigurationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s]+$").expect("address pattern is valid")
    })
}

/// An absolute endpoint address such as `rabbitmq://broker/orders`.
///
/// Addresses compare by exact string equality; no normalization, wildcard or
/// prefix matching is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parses and validates an address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the value is not of the form
    /// `scheme://location`.
    pub fn parse(value: impl Into<String>) -> Result<Self, ConfigurationError> {
        let value = value.into();
        if address_pattern().is_match(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigurationError::new(format!("Invalid address '{value}'"))
                .with_issue("address", "expected scheme://location"))
        }
    }

    /// Returns the address scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.split("://").next().unwrap_or_default()
    }

    /// The `scheme://authority` part of the address, without any path.
    #[must_use]
    pub fn root(&self) -> Self {
        match self.0.split_once("://") {
            Some((scheme, rest)) => match rest.split('/').next() {
                Some(authority) if !authority.is_empty() => Self(format!("{scheme}://{authority}")),
                _ => self.clone(),
            },
            None => self.clone(),
        }
    }

    /// Appends a path segment, inserting a single `/` separator.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        let base = self.0.trim_end_matches('/');
        let segment = segment.trim_start_matches('/');
        Self(format!("{base}/{segment}"))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let addr = Address::parse("rabbitmq://localhost/orders").unwrap();
        assert_eq!(addr.scheme(), "rabbitmq");
        assert_eq!(addr.to_string(), "rabbitmq://localhost/orders");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Address::parse("orders").is_err());
        assert!(Address::parse("").is_err());
        assert!(Address::parse("sb://has space").is_err());
    }

    #[test]
    fn test_join() {
        let base = Address::parse("sb://ns.example.com/").unwrap();
        assert_eq!(base.join("/quartz").as_str(), "sb://ns.example.com/quartz");
    }

    #[test]
    fn test_root() {
        let addr = Address::parse("rabbitmq://localhost:5672/vhost/orders").unwrap();
        assert_eq!(addr.root().as_str(), "rabbitmq://localhost:5672");
        let bare = Address::parse("loopback://local").unwrap();
        assert_eq!(bare.root(), bare);
    }

    #[test]
    fn test_exact_equality() {
        let a = Address::parse("loopback://host/a").unwrap();
        let a_slash = Address::parse("loopback://host/a/").unwrap();
        assert_ne!(a, a_slash);
    }

    #[test]
    fn test_serde_validates() {
        let ok: Address = serde_json::from_str("\"loopback://host/a\"").unwrap();
        assert_eq!(ok.as_str(), "loopback://host/a");
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}

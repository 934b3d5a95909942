//! Protocol identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier of an application-level sub-protocol, e.g. `/echo/1.0.0`.
///
/// Opaque and compared byte-for-byte. Never empty and never contains a
/// newline, since the `ls` reply lists identifiers one per line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolId(String);

impl ProtocolId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidProtocol("protocol id is empty".to_string()));
        }
        if id.contains('\n') {
            return Err(Error::InvalidProtocol(format!(
                "protocol id {id:?} contains a newline"
            )));
        }
        Ok(Self(id))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProtocolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProtocolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ProtocolId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProtocolId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl FromStr for ProtocolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for ProtocolId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProtocolId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ProtocolId> for String {
    fn from(id: ProtocolId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_id_valid() {
        let id = ProtocolId::new("/echo/1.0.0").unwrap();
        assert_eq!(id, "/echo/1.0.0");
        assert_eq!(id.to_string(), "/echo/1.0.0");
    }

    #[test]
    fn test_protocol_id_rejects_empty_and_newline() {
        assert!(ProtocolId::new("").is_err());
        assert!(ProtocolId::new("/a/1\n/b/1").is_err());
    }

    #[test]
    fn test_protocol_id_exact_equality() {
        let id: ProtocolId = "/echo/1.0.0".parse().unwrap();
        assert_ne!(id, "/echo/1.0.0/");
        assert_ne!(id, "/ECHO/1.0.0");
    }
}

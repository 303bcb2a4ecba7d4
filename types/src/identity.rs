//! Voter identities and poll identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A voter's unique account reference.
///
/// Exactly one vote is permitted per (identity, poll).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Prefix reserved for poll escrow accounts.
    pub const ESCROW_PREFIX: &'static str = "poll:";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The escrow account that holds a poll's staked credits.
    ///
    /// Voters grant their token allowance to this account.
    pub fn escrow(poll: &PollId) -> Self {
        Self(format!("{}{}", Self::ESCROW_PREFIX, poll.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, no surrounding whitespace.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.trim() == self.0
    }

    pub fn is_escrow(&self) -> bool {
        self.0.starts_with(Self::ESCROW_PREFIX)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A 32-byte poll identifier, derived by the registry at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PollId([u8; 32]);

impl PollId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Short form used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_id_hex_roundtrip() {
        let id = PollId::new([7u8; 32]);
        assert_eq!(PollId::from_hex(&id.to_hex()), Some(id));
        assert_eq!(PollId::from_hex("zz"), None);
        assert_eq!(PollId::from_hex("0a0b"), None);
    }

    #[test]
    fn escrow_identity_is_distinct_per_poll() {
        let a = Identity::escrow(&PollId::new([1u8; 32]));
        let b = Identity::escrow(&PollId::new([2u8; 32]));
        assert_ne!(a, b);
        assert!(a.is_escrow());
        assert!(!Identity::new("alice").is_escrow());
    }

    #[test]
    fn identity_validity() {
        assert!(Identity::new("alice").is_valid());
        assert!(!Identity::new("").is_valid());
        assert!(!Identity::new(" alice").is_valid());
    }
}

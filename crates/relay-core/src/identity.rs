//! Client identities.
//!
//! Every accepted connection is named by a short random token. Tokens are
//! only required to be unique among connections that are open at the same
//! time; the registry rejects a collision and the connection handler asks
//! for a fresh one.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{IdentityError, IdentityResult};

// ============================================================================
// Type-Safe Identifier
// ============================================================================

/// URL-safe alphabet used for client ids (64 symbols, 6 bits each).
pub const CLIENT_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Number of symbols in a client id (60 bits of entropy).
pub const CLIENT_ID_LENGTH: usize = 10;

/// Identity assigned to a connection at accept time.
///
/// Immutable once assigned. Always exactly [`CLIENT_ID_LENGTH`] ASCII
/// symbols from [`CLIENT_ID_ALPHABET`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh random id from the thread-local CSPRNG.
    ///
    /// With 60 bits of entropy the birthday bound for a collision among
    /// a million concurrent connections is below one in a million.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..CLIENT_ID_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..CLIENT_ID_ALPHABET.len());
                CLIENT_ID_ALPHABET.get(idx).copied().map(char::from).unwrap_or('_')
            })
            .collect();
        Self(id)
    }

    /// Parses and validates an id received from elsewhere (tests, logs).
    pub fn parse(s: &str) -> IdentityResult<Self> {
        let length = s.chars().count();
        if length != CLIENT_ID_LENGTH {
            return Err(IdentityError::InvalidLength {
                length,
                expected: CLIENT_ID_LENGTH,
            });
        }

        if let Some(symbol) = s
            .chars()
            .find(|c| !c.is_ascii() || !CLIENT_ID_ALPHABET.contains(&(*c as u8)))
        {
            return Err(IdentityError::InvalidSymbol { symbol });
        }

        Ok(Self(s.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_has_fixed_length() {
        let id = ClientId::generate();
        assert_eq!(id.as_str().len(), CLIENT_ID_LENGTH);
    }

    #[test]
    fn test_generated_id_uses_alphabet() {
        for _ in 0..100 {
            let id = ClientId::generate();
            assert!(id
                .as_str()
                .bytes()
                .all(|b| CLIENT_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: HashSet<ClientId> = (0..10_000).map(|_| ClientId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_generated_id_round_trips_through_parse() {
        let id = ClientId::generate();
        let parsed: ClientId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = ClientId::parse("short").unwrap_err();
        assert_eq!(
            err,
            IdentityError::InvalidLength {
                length: 5,
                expected: CLIENT_ID_LENGTH
            }
        );
    }

    #[test]
    fn test_parse_rejects_foreign_symbols() {
        let err = ClientId::parse("abc:efghij").unwrap_err();
        assert_eq!(err, IdentityError::InvalidSymbol { symbol: ':' });

        let err = ClientId::parse("abcdéfghij").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidSymbol { symbol: 'é' }));
    }

    #[test]
    fn test_display_is_raw_token() {
        let id = ClientId::parse("V1StGXR8_Z").unwrap();
        assert_eq!(id.to_string(), "V1StGXR8_Z");
        assert_eq!(format!("{id}: hi"), "V1StGXR8_Z: hi");
    }
}

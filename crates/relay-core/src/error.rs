//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when handling client identities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Identity has the wrong number of symbols
    #[error("Invalid client id length: {length} (expected {expected})")]
    InvalidLength { length: usize, expected: usize },

    /// Identity contains a symbol outside the id alphabet
    #[error("Invalid client id symbol: {symbol:?}")]
    InvalidSymbol { symbol: char },
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

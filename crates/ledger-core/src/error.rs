use thiserror::Error;

/// Failures of the token registry. Every check runs before any write, so an
/// error never leaves a partially applied operation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token `{0}` already exists")]
    DuplicateToken(String),
    #[error("token `{0}` does not exist")]
    UnknownToken(String),
    #[error("insufficient `{token}` balance for {address}: requested {requested}, available {available}")]
    InsufficientBalance {
        token: String,
        address: String,
        requested: u64,
        available: u64,
    },
    #[error("minting would overflow the supply of `{token}`")]
    SupplyOverflow { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MineError {
    #[error("proof-of-work search for block {index} cancelled after {attempts} attempts")]
    Cancelled { index: u64, attempts: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("difficulty must be between 1 and {max}, got {0}", max = crate::constants::MAX_DIFFICULTY)]
    Difficulty(u32),
}

/// First integrity violation found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {index}: {kind}")]
pub struct ChainViolation {
    pub index: u64,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("previous_hash {found} does not match predecessor fingerprint {expected}")]
    BrokenLink { expected: String, found: String },
    #[error("fingerprint {fingerprint} does not meet the difficulty target")]
    InsufficientWork { fingerprint: String },
}

//! One-way password hashing.

use anyhow::Context;

/// bcrypt work factor for stored credentials.
pub const DEFAULT_COST: u32 = 10;

/// Hashes and verifies passwords with bcrypt.
///
/// The salt is random per hash and embedded in the output string, so the
/// stored value alone is enough to verify against.
#[derive(Debug, Clone, Copy)]
pub struct PasswordCodec {
    cost: u32,
}

impl PasswordCodec {
    pub fn new() -> Self {
        Self { cost: DEFAULT_COST }
    }

    /// Codec with a non-default work factor, clamped to bcrypt's 4..=31.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plaintext: &str) -> anyhow::Result<String> {
        bcrypt::hash(plaintext, self.cost).context("bcrypt hashing failed")
    }

    /// True iff `hash` was derived from `plaintext`. A malformed hash is a
    /// mismatch, not an error.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }
}

impl Default for PasswordCodec {
    fn default() -> Self {
        Self::new()
    }
}

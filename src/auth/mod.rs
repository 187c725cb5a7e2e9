//! Credentials, tokens and accounts.
//!
//! Provides:
//! - Password hashing with bcrypt (cost 10, per-hash salt)
//! - HS256 bearer tokens with a 1-hour validity window
//! - Account CRUD over a file-backed collection with unique usernames
//! - A gate that admits requests carrying a valid token
//!
//! ## Design Decisions
//! - The signing key is an explicit value handed to [`TokenIssuer`] at
//!   construction; nothing reads it from ambient state.
//! - Tokens are stateless: validity is signature + expiry, nothing is stored.
//! - Hashing runs before the collection lock is taken so writers hold it
//!   only for load → edit → save.

pub mod directory;
pub mod gate;
pub mod password;
pub mod token;

pub use directory::{Account, AccountDirectory, AccountPatch, Role};
pub use gate::{AccessGate, AuthenticatedSubject};
pub use password::PasswordCodec;
pub use token::{SigningKey, TokenClaims, TokenError, TokenIssuer};

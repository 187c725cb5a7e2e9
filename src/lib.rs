//! Account and item records over flat JSON files, with bcrypt credentials
//! and HS256 bearer tokens.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod items;
pub mod store;

pub use config::Config;
pub use error::ServiceError;

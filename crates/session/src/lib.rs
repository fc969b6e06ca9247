//! Session persistence for the campus mini-app client
//!
//! Typed access to the tokens, user record and device identifier kept in a
//! persistent key-value store. The request pipeline only ever reads and
//! writes session state through [`CredentialStore`]; the store behind it is
//! any [`KeyValueStore`] implementation.
//!
//! Session lifecycle:
//! 1. Login writes access token, refresh token and user in one batch
//! 2. Requests read the access token on every dispatch
//! 3. A successful refresh rewrites the tokens, keeping the user
//! 4. A failed refresh (or logout) removes all three in one batch
//! 5. The device identifier is created on first read and never changes

pub mod constants;
pub mod credentials;
pub mod error;
pub mod kv;

pub use constants::*;
pub use credentials::{CredentialStore, Credentials, UserRecord};
pub use error::{Error, Result};
pub use kv::{FileStore, KeyValueStore, MemoryStore};

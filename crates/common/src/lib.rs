//! Types shared by the campus mini-app crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

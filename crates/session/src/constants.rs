//! Storage keys for session state
//!
//! Each value is addressable on its own in the underlying store so other
//! tooling can inspect or wipe a single entry.

/// Key holding the current bearer access token
pub const ACCESS_TOKEN_KEY: &str = "miniapp.auth.accessToken";

/// Key holding the refresh token used to mint new access tokens
pub const REFRESH_TOKEN_KEY: &str = "miniapp.auth.refreshToken";

/// Key holding the signed-in user record (JSON)
pub const USER_KEY: &str = "miniapp.auth.user";

/// Key holding the per-install device identifier
pub const DEVICE_ID_KEY: &str = "miniapp.auth.deviceId";

/// Prefix of generated device identifiers
pub const DEVICE_ID_PREFIX: &str = "wx";

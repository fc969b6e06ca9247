//! Authenticated request pipeline for the campus mini-app API
//!
//! Every API call goes through [`ApiClient`]: the path is resolved against
//! the configured base URL, the stored access token is attached, and the
//! response status is interpreted. When an authenticated call is rejected
//! with 401/403 the client asks the [`RefreshCoordinator`] for a new token
//! and retries the call exactly once.
//!
//! Request flow:
//! 1. `UrlResolver::resolve()` turns the path into a full URL
//! 2. The access token from `session::CredentialStore` becomes a Bearer header
//! 3. The [`Transport`] sends the request (or multipart upload)
//! 4. 2xx returns the decoded body
//! 5. 401/403 triggers `RefreshCoordinator::refresh()`; at most one refresh
//!    exchange is in flight no matter how many calls fail together
//! 6. A refreshed token retries the call once; anything else is a typed [`Error`]

pub mod client;
pub mod error;
pub mod metrics;
pub mod refresh;
pub mod transport;
pub mod upload;
pub mod url;

#[cfg(test)]
mod testing;

pub use client::{ApiClient, RequestOptions};
pub use error::{Error, Result};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshPolicy, RefreshState};
pub use transport::{
    RequestBody, ReqwestTransport, Transport, TransportFuture, TransportRequest,
    TransportResponse, UploadRequest,
};
pub use upload::{UploadFileEntry, UploadPlan, UploadedImage, decode_upload_body};
pub use url::UrlResolver;

/// Login endpoint; never triggers a refresh retry.
pub const LOGIN_PATH: &str = "/auth/login";

/// Refresh-token exchange endpoint; never triggers a refresh retry.
pub const REFRESH_PATH: &str = "/auth/refresh";

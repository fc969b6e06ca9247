//! Request URL resolution against the configured base URL

use reqwest::Url;

/// Default base URL when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1";

/// Builds request URLs from API paths and absolute URLs from asset paths.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    base_url: String,
}

impl UrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for an API path.
    ///
    /// Absolute `http(s)://` URLs pass through. Relative paths are joined to
    /// the base with exactly one `/` between them.
    pub fn resolve(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        format!("{}{}", self.base_url, with_leading_slash(path))
    }

    /// Directly fetchable URL for a server-relative asset path.
    ///
    /// Relative paths resolve against the base origin only, dropping any
    /// base path (`/files/a.png` on `https://x.test/api/v1` gives
    /// `https://x.test/files/a.png`). If the base cannot be parsed the
    /// normalized relative path is returned.
    pub fn to_absolute(&self, path: &str) -> String {
        let value = path.trim();
        if value.is_empty() {
            return String::new();
        }
        if is_absolute(value) {
            return value.to_string();
        }
        let normalized = with_leading_slash(value);
        match Url::parse(&self.base_url) {
            Ok(base) if base.origin().is_tuple() => {
                format!("{}{}", base.origin().ascii_serialization(), normalized)
            }
            _ => normalized,
        }
    }
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

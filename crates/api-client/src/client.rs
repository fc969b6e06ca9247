//! Authenticated request pipeline
//!
//! [`ApiClient`] is the single entry point for API calls. It attaches the
//! stored access token, interprets the response status, and on a 401/403
//! from an authenticated endpoint obtains a new token from the
//! [`RefreshCoordinator`] and retries the call exactly once.

use std::path::Path;
use std::sync::Arc;

use common::Secret;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use session::CredentialStore;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::metrics;
use crate::refresh::{RefreshCoordinator, RefreshOutcome, RefreshPolicy};
use crate::transport::{
    RequestBody, Transport, TransportRequest, TransportResponse, UploadRequest,
};
use crate::upload::{
    UploadFileEntry, UploadPlan, UploadedImage, decode_upload_body, first_uploaded_image,
};
use crate::url::UrlResolver;
use crate::{LOGIN_PATH, REFRESH_PATH};

/// Field name used for assistant image uploads.
const IMAGE_FIELD: &str = "files";

/// How a single call is sent.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    /// Extra headers; a `content-type` here replaces the default.
    pub headers: Vec<(String, String)>,
    pub requires_auth: bool,
    pub allow_refresh_retry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: RequestBody::Empty,
            headers: Vec::new(),
            requires_auth: true,
            allow_refresh_retry: true,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: RequestBody::Json(body),
            ..Self::default()
        }
    }

    /// POST with `application/x-www-form-urlencoded` fields.
    pub fn form(fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            body: RequestBody::Form(fields),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send without a Bearer token; auth failures are plain rejections.
    pub fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn without_refresh_retry(mut self) -> Self {
        self.allow_refresh_retry = false;
        self
    }
}

/// Client for the campus API.
///
/// Cheap to clone; clones share the transport, the credential store and the
/// refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    resolver: UrlResolver,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        resolver: UrlResolver,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
    ) -> Self {
        Self::with_refresh_policy(resolver, transport, credentials, RefreshPolicy::default())
    }

    pub fn with_refresh_policy(
        resolver: UrlResolver,
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        policy: RefreshPolicy,
    ) -> Self {
        let refresh = RefreshCoordinator::new(
            transport.clone(),
            credentials.clone(),
            resolver.clone(),
            policy,
        );
        Self {
            resolver,
            transport,
            credentials,
            refresh,
        }
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Send one call and return its decoded body.
    ///
    /// A 2xx body decodes as JSON; an empty body is `null` and non-JSON text
    /// is returned as a string. Multipart bodies go through the upload path
    /// and decode with [`decode_upload_body`].
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value> {
        let mut options = options;
        let mut token: Option<Secret<String>> = None;
        loop {
            let bearer = token.as_ref().map(|t| t.expose().as_str());
            let response = self.dispatch(path, &options, bearer).await?;
            if response.is_success() {
                return decode_body(&response.body, options.body.is_multipart());
            }
            if !should_refresh(path, &options, response.status) {
                return Err(rejection(&options, &response));
            }

            debug!(status = response.status, "access token rejected, refreshing");
            match self.refresh.refresh().await {
                RefreshOutcome::Refreshed(fresh) => {
                    token = Some(fresh);
                    options.allow_refresh_retry = false;
                }
                outcome => {
                    debug!(?outcome, "no refreshed token, giving up");
                    return Err(rejection(&options, &response));
                }
            }
        }
    }

    /// [`ApiClient::request`] followed by deserialization into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self.request(path, options).await?;
        serde_json::from_value(value).map_err(|e| Error::UnexpectedResponse(e.to_string()))
    }

    /// POST `fields` plus any number of files, shaped by [`UploadPlan`].
    pub async fn upload(
        &self,
        path: &str,
        entries: Vec<UploadFileEntry>,
        fields: Vec<(String, String)>,
    ) -> Result<Value> {
        let plan = UploadPlan::build(entries, fields);
        debug!(files = plan.file_count(), "uploading");
        let options = RequestOptions {
            method: Method::POST,
            body: plan.into_body(),
            ..RequestOptions::default()
        };
        self.request(path, options).await
    }

    /// Upload images one at a time, in input order, under the `files` field.
    ///
    /// Blank paths are skipped. Each result's `url` is absolute.
    pub async fn upload_images<P: AsRef<Path>>(
        &self,
        path: &str,
        files: &[P],
    ) -> Result<Vec<UploadedImage>> {
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            if file.as_os_str().is_empty() || file.to_string_lossy().trim().is_empty() {
                continue;
            }
            let document = self
                .upload(path, vec![UploadFileEntry::new(IMAGE_FIELD, file)], Vec::new())
                .await?;
            let mut image = first_uploaded_image(document, file)?;
            image.url = self.resolver.to_absolute(&image.url);
            uploaded.push(image);
        }
        Ok(uploaded)
    }

    async fn dispatch(
        &self,
        path: &str,
        options: &RequestOptions,
        bearer: Option<&str>,
    ) -> Result<TransportResponse> {
        let url = self.resolver.resolve(path);
        let headers = self.build_headers(options, bearer)?;

        let result = match &options.body {
            RequestBody::Multipart { files, fields } => {
                self.transport
                    .upload(UploadRequest {
                        url,
                        headers,
                        files: files.clone(),
                        fields: fields.clone(),
                    })
                    .await
            }
            body => {
                self.transport
                    .send(TransportRequest {
                        url,
                        method: options.method.clone(),
                        headers,
                        body: body.clone(),
                    })
                    .await
            }
        };

        match &result {
            Ok(response) => metrics::record_request(response.status, options.method.as_str()),
            Err(Error::Transport(_)) => metrics::record_transport_error(),
            Err(_) => {}
        }
        result
    }

    fn build_headers(&self, options: &RequestOptions, bearer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let Some(content_type) = default_content_type(&options.method, &options.body) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidRequest(format!("header {name}: {e}")))?;
            headers.insert(name, value);
        }

        if options.requires_auth {
            let token = match bearer {
                Some(token) => Some(token.to_string()),
                None => self.credentials.access_token()?,
            };
            if let Some(token) = token {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                        Error::InvalidRequest("access token is not a valid header".into())
                    })?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        Ok(headers)
    }
}

fn default_content_type(method: &Method, body: &RequestBody) -> Option<&'static str> {
    match body {
        RequestBody::Form(_) => Some("application/x-www-form-urlencoded"),
        RequestBody::Multipart { .. } => None,
        RequestBody::Json(_) | RequestBody::Empty
            if *method != Method::GET && *method != Method::HEAD =>
        {
            Some("application/json")
        }
        _ => None,
    }
}

fn is_auth_failure(status: u16) -> bool {
    status == 401 || status == 403
}

fn is_refresh_excluded(path: &str) -> bool {
    path.contains(LOGIN_PATH) || path.contains(REFRESH_PATH)
}

fn should_refresh(path: &str, options: &RequestOptions, status: u16) -> bool {
    options.requires_auth
        && options.allow_refresh_retry
        && is_auth_failure(status)
        && !is_refresh_excluded(path)
}

fn rejection(options: &RequestOptions, response: &TransportResponse) -> Error {
    let message = extract_message(&response.body)
        .unwrap_or_else(|| format!("request failed with status {}", response.status));
    if options.requires_auth && is_auth_failure(response.status) {
        Error::AuthExpired {
            status: response.status,
            message,
        }
    } else {
        Error::RequestRejected {
            status: response.status,
            message,
        }
    }
}

/// Human-readable `message` from an error body; arrays are joined with `"; "`.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn decode_body(body: &str, from_upload: bool) -> Result<Value> {
    if from_upload {
        return decode_upload_body(body);
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

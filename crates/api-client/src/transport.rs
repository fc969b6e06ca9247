//! One-shot HTTP transport
//!
//! [`Transport`] is the pipeline's only I/O dependency: one call, one
//! terminal result. HTTP error statuses are ordinary responses; only a
//! failed connection attempt is an error. Nothing is retried here.
//!
//! Uses `Pin<Box<dyn Future>>` return types so the pipeline can hold an
//! `Arc<dyn Transport>` and tests can substitute a scripted transport.

use std::future::Future;
use std::pin::Pin;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::error::{Error, Result};
use crate::upload::UploadFileEntry;

/// Boxed future returned by [`Transport`] calls.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + 'a>>;

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// File parts plus text fields; dispatched through [`Transport::upload`]
    Multipart {
        files: Vec<UploadFileEntry>,
        fields: Vec<(String, String)>,
    },
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart { .. })
    }
}

/// A single non-multipart request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// A single multipart upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub files: Vec<UploadFileEntry>,
    pub fields: Vec<(String, String)>,
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues exactly one request or upload per call.
pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest) -> TransportFuture<'_>;

    fn upload(&self, request: UploadRequest) -> TransportFuture<'_>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let builder = self
                .client
                .request(request.method.clone(), &request.url)
                .headers(request.headers);

            let builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(&value),
                RequestBody::Form(fields) => builder.form(&fields),
                RequestBody::Multipart { .. } => {
                    return Err(Error::InvalidRequest(
                        "multipart bodies must be sent with upload".into(),
                    ));
                }
            };

            debug!(method = %request.method, url = %request.url, "sending request");
            let response = builder
                .send()
                .await
                .map_err(|e| Error::Transport(format!("request to {} failed: {e}", request.url)))?;
            read_response(response).await
        })
    }

    fn upload(&self, request: UploadRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut form = Form::new();
            for (name, value) in request.fields {
                form = form.text(name, value);
            }
            for file in request.files {
                let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                    Error::Io(format!("reading upload file {}: {e}", file.path.display()))
                })?;
                let file_name = file
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "file".to_string());
                form = form.part(file.field_key, Part::bytes(bytes).file_name(file_name));
            }

            // The multipart body carries its own boundary content type.
            let mut headers = request.headers;
            headers.remove(CONTENT_TYPE);

            debug!(url = %request.url, "sending multipart upload");
            let response = self
                .client
                .post(&request.url)
                .headers(headers)
                .multipart(form)
                .send()
                .await
                .map_err(|e| Error::Transport(format!("upload to {} failed: {e}", request.url)))?;
            read_response(response).await
        })
    }
}

async fn read_response(response: reqwest::Response) -> Result<TransportResponse> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
    Ok(TransportResponse { status, body })
}

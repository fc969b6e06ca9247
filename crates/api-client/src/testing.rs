//! Scripted transport and session fixtures shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use session::{CredentialStore, Credentials, MemoryStore};

use crate::REFRESH_PATH;
use crate::error::Result;
use crate::transport::{
    RequestBody, Transport, TransportFuture, TransportRequest, TransportResponse, UploadRequest,
};

pub(crate) const BASE: &str = "https://x.test/api/v1";

type Responder = Box<dyn Fn(&RecordedCall) -> Result<TransportResponse> + Send + Sync>;

/// A call as the transport saw it. Uploads are recorded as POST with a
/// `Multipart` body.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub is_upload: bool,
}

impl RecordedCall {
    /// URL with the test base stripped.
    pub fn path(&self) -> &str {
        self.url.strip_prefix(BASE).unwrap_or(&self.url)
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Transport answering from a closure, recording every call in dispatch order.
pub(crate) struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responder: Responder,
    delay: Duration,
    refresh_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new(
        responder: impl Fn(&RecordedCall) -> Result<TransportResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: Duration::from_millis(5),
            refresh_delay: Duration::from_millis(20),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path() == path).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn handle(&self, call: RecordedCall) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(call.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = if call.path() == REFRESH_PATH {
            self.refresh_delay
        } else {
            self.delay
        };
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(&call)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
        Box::pin(self.handle(RecordedCall {
            url: request.url,
            method: request.method,
            headers: request.headers,
            body: request.body,
            is_upload: false,
        }))
    }

    fn upload(&self, request: UploadRequest) -> TransportFuture<'_> {
        Box::pin(self.handle(RecordedCall {
            url: request.url,
            method: Method::POST,
            headers: request.headers,
            body: RequestBody::Multipart {
                files: request.files,
                fields: request.fields,
            },
            is_upload: true,
        }))
    }
}

pub(crate) fn respond(status: u16, body: serde_json::Value) -> Result<TransportResponse> {
    Ok(TransportResponse::new(status, body.to_string()))
}

pub(crate) fn refreshed(access: &str, refresh: Option<&str>) -> Result<TransportResponse> {
    let mut data = serde_json::json!({ "accessToken": access });
    if let Some(refresh) = refresh {
        data["refreshToken"] = serde_json::Value::String(refresh.to_string());
    }
    respond(200, serde_json::json!({ "data": data }))
}

pub(crate) fn unauthorized() -> Result<TransportResponse> {
    respond(401, serde_json::json!({"statusCode": 401, "message": "Unauthorized"}))
}

/// Credential store seeded with `at_old` / `rt_old` and a user record.
pub(crate) fn signed_in_store() -> CredentialStore {
    let store = CredentialStore::new(Arc::new(MemoryStore::new()));
    let user = serde_json::from_value(serde_json::json!({
        "id": "u-1",
        "username": "alice",
        "role": "STUDENT"
    }))
    .unwrap();
    store
        .set(&Credentials::new("at_old", "rt_old", Some(user)))
        .unwrap();
    store
}

pub(crate) fn empty_store() -> CredentialStore {
    CredentialStore::new(Arc::new(MemoryStore::new()))
}

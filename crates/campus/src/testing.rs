//! Stub transport for endpoint tests

use std::sync::{Arc, Mutex};

use api_client::{
    ApiClient, RequestBody, Result, Transport, TransportFuture, TransportRequest,
    TransportResponse, UploadRequest, UrlResolver,
};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use session::{CredentialStore, Credentials, MemoryStore};

pub(crate) const BASE: &str = "https://campus.test/api/v1";

/// A call as the stub saw it, with the base URL stripped.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Sent {
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> &serde_json::Value {
        match &self.body {
            RequestBody::Json(value) => value,
            other => panic!("expected JSON body, got {other:?}"),
        }
    }
}

type Responder = Box<dyn Fn(&Sent) -> TransportResponse + Send + Sync>;

pub(crate) struct StubTransport {
    responder: Responder,
    sent: Mutex<Vec<Sent>>,
}

impl StubTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn answer(&self, sent: Sent) -> Result<TransportResponse> {
        let response = (self.responder)(&sent);
        self.sent.lock().unwrap().push(sent);
        Ok(response)
    }
}

impl Transport for StubTransport {
    fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
        let sent = Sent {
            path: strip_base(&request.url),
            method: request.method,
            headers: request.headers,
            body: request.body,
        };
        Box::pin(async move {
            tokio::task::yield_now().await;
            self.answer(sent)
        })
    }

    fn upload(&self, request: UploadRequest) -> TransportFuture<'_> {
        let sent = Sent {
            path: strip_base(&request.url),
            method: Method::POST,
            headers: request.headers,
            body: RequestBody::Multipart {
                files: request.files,
                fields: request.fields,
            },
        };
        Box::pin(async move { self.answer(sent) })
    }
}

fn strip_base(url: &str) -> String {
    url.strip_prefix(BASE).unwrap_or(url).to_string()
}

pub(crate) fn ok(body: serde_json::Value) -> TransportResponse {
    TransportResponse::new(200, body.to_string())
}

/// Client over a stub transport with a signed-in in-memory session.
pub(crate) fn stub_client(
    responder: impl Fn(&Sent) -> TransportResponse + Send + Sync + 'static,
) -> (ApiClient, Arc<StubTransport>) {
    let transport = Arc::new(StubTransport {
        responder: Box::new(responder),
        sent: Mutex::new(Vec::new()),
    });
    let store = CredentialStore::new(Arc::new(MemoryStore::new()));
    store
        .set(&Credentials::new("at_1", "rt_1", None))
        .unwrap();
    let client = ApiClient::new(UrlResolver::new(BASE), transport.clone(), store);
    (client, transport)
}

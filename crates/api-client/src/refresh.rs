//! Single-flight refresh-token exchange
//!
//! When several in-flight calls are rejected with 401/403 at the same time,
//! each of them asks for a fresh token. Only the first starts an exchange
//! against the refresh endpoint; the rest await the same shared pending
//! result. The pending handle lives in a cell owned by the coordinator and
//! is removed as soon as the exchange finishes, so the next auth failure
//! starts a new exchange.
//!
//! Transitions:
//! - Idle → Refreshing (first caller installs the pending exchange)
//! - Refreshing → Refreshing (later callers join it)
//! - Refreshing → Idle (exchange finished, cell emptied before delivery)

use std::sync::Arc;

use common::Secret;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use session::{CredentialStore, Credentials};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::REFRESH_PATH;
use crate::metrics;
use crate::transport::{RequestBody, Transport, TransportRequest};
use crate::url::UrlResolver;

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Result of one refresh exchange, shared by every caller that awaited it.
///
/// Only `Refreshed` carries a usable token.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(Secret<String>),
    /// No refresh token stored; nothing was sent.
    NoRefreshToken,
    /// Non-2xx response, or a 2xx without a new access token. Credentials
    /// were cleared.
    Rejected { status: u16 },
    /// The exchange never got a response.
    TransportFailed(String),
    /// Reading or writing the session store failed.
    StorageFailed(String),
}

impl RefreshOutcome {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            RefreshOutcome::Refreshed(token) => Some(token.expose().as_str()),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed(_) => "refreshed",
            RefreshOutcome::NoRefreshToken => "no_refresh_token",
            RefreshOutcome::Rejected { .. } => "rejected",
            RefreshOutcome::TransportFailed(_) => "transport_failed",
            RefreshOutcome::StorageFailed(_) => "storage_failed",
        }
    }
}

/// How a failed exchange treats the stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Clear credentials when the exchange fails at the connection level,
    /// not only when the server rejects the refresh token.
    pub clear_on_transport_error: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            clear_on_transport_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Coordinates refresh-token exchanges so at most one is in flight.
///
/// Clones share the same in-flight cell.
#[derive(Clone)]
pub struct RefreshCoordinator {
    exchange: Arc<Exchange>,
    in_flight: Arc<Mutex<Option<PendingRefresh>>>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        resolver: UrlResolver,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            exchange: Arc::new(Exchange {
                transport,
                credentials,
                resolver,
                policy,
            }),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Obtain a fresh access token, joining the in-flight exchange if any.
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let pending = self.start().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    pub async fn state(&self) -> RefreshState {
        if self.in_flight.lock().await.is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    fn start(&self) -> BoxFuture<'static, RefreshOutcome> {
        let exchange = self.exchange.clone();
        let slot = self.in_flight.clone();
        async move {
            let outcome = exchange.run().await;
            slot.lock().await.take();
            metrics::record_refresh(outcome.label());
            debug!(outcome = outcome.label(), "token refresh finished");
            outcome
        }
        .boxed()
    }
}

struct Exchange {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    resolver: UrlResolver,
    policy: RefreshPolicy,
}

#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    data: Option<RefreshTokens>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl Exchange {
    async fn run(&self) -> RefreshOutcome {
        let refresh_token = match self.credentials.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return RefreshOutcome::NoRefreshToken,
            Err(e) => return RefreshOutcome::StorageFailed(e.to_string()),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let request = TransportRequest {
            url: self.resolver.resolve(REFRESH_PATH),
            method: Method::POST,
            headers,
            body: RequestBody::Json(serde_json::json!({ "refreshToken": refresh_token })),
        };

        info!("exchanging refresh token");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_transport_error();
                if self.policy.clear_on_transport_error
                    && let Err(clear_err) = self.credentials.clear()
                {
                    return RefreshOutcome::StorageFailed(clear_err.to_string());
                }
                return RefreshOutcome::TransportFailed(e.to_string());
            }
        };
        metrics::record_request(response.status, Method::POST.as_str());

        let tokens = if response.is_success() {
            parse_tokens(&response.body)
        } else {
            None
        };
        let Some((access_token, rotated_refresh)) = tokens else {
            if let Err(e) = self.credentials.clear() {
                return RefreshOutcome::StorageFailed(e.to_string());
            }
            return RefreshOutcome::Rejected {
                status: response.status,
            };
        };

        let user = match self.credentials.user() {
            Ok(user) => user,
            Err(e) => return RefreshOutcome::StorageFailed(e.to_string()),
        };
        let rotated = rotated_refresh.is_some();
        let credentials = Credentials::new(
            access_token.clone(),
            rotated_refresh.unwrap_or(refresh_token),
            user,
        );
        if let Err(e) = self.credentials.set(&credentials) {
            return RefreshOutcome::StorageFailed(e.to_string());
        }

        info!(rotated, "token refresh succeeded");
        RefreshOutcome::Refreshed(Secret::new(access_token))
    }
}

/// New access token and optional rotated refresh token from `data`.
fn parse_tokens(body: &str) -> Option<(String, Option<String>)> {
    let envelope: RefreshEnvelope = serde_json::from_str(body).ok()?;
    let data = envelope.data?;
    let access = data.access_token.filter(|t| !t.is_empty())?;
    let refresh = data.refresh_token.filter(|t| !t.is_empty());
    Some((access, refresh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{
        BASE, MockTransport, empty_store, refreshed, respond, signed_in_store, unauthorized,
    };
    use futures_util::future::join_all;

    fn coordinator(
        transport: Arc<MockTransport>,
        credentials: CredentialStore,
        policy: RefreshPolicy,
    ) -> RefreshCoordinator {
        RefreshCoordinator::new(transport, credentials, UrlResolver::new(BASE), policy)
    }

    #[test]
    fn parse_tokens_reads_data_envelope() {
        assert_eq!(
            parse_tokens(r#"{"data":{"accessToken":"at","refreshToken":"rt"}}"#),
            Some(("at".into(), Some("rt".into())))
        );
        assert_eq!(
            parse_tokens(r#"{"data":{"accessToken":"at"}}"#),
            Some(("at".into(), None))
        );
        assert_eq!(parse_tokens(r#"{"data":{"accessToken":""}}"#), None);
        assert_eq!(parse_tokens(r#"{"data":null}"#), None);
        assert_eq!(parse_tokens("not json"), None);
    }

    #[tokio::test]
    async fn without_refresh_token_nothing_is_sent() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", None)));
        let refresher = coordinator(transport.clone(), empty_store(), RefreshPolicy::default());

        let outcome = refresher.refresh().await;

        assert_eq!(outcome, RefreshOutcome::NoRefreshToken);
        assert!(transport.calls().is_empty());
        assert_eq!(refresher.state().await, RefreshState::Idle);
    }

    #[tokio::test]
    async fn success_stores_rotated_tokens_and_keeps_user() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", Some("rt_new"))));
        let store = signed_in_store();
        let refresher = coordinator(transport.clone(), store.clone(), RefreshPolicy::default());

        let outcome = refresher.refresh().await;

        assert_eq!(outcome.access_token(), Some("at_new"));
        let creds = store.get().unwrap().unwrap();
        assert_eq!(creds.access_token.expose(), "at_new");
        assert_eq!(creds.refresh_token.expose(), "rt_new");
        assert_eq!(creds.user.unwrap().id.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn success_without_rotation_keeps_old_refresh_token() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", None)));
        let store = signed_in_store();
        let refresher = coordinator(transport, store.clone(), RefreshPolicy::default());

        refresher.refresh().await;

        let creds = store.get().unwrap().unwrap();
        assert_eq!(creds.access_token.expose(), "at_new");
        assert_eq!(creds.refresh_token.expose(), "rt_old");
    }

    #[tokio::test]
    async fn exchange_posts_refresh_token_as_json() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", None)));
        let refresher = coordinator(transport.clone(), signed_in_store(), RefreshPolicy::default());

        refresher.refresh().await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, format!("{BASE}/auth/refresh"));
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].content_type(), Some("application/json"));
        assert_eq!(calls[0].authorization(), None);
        assert_eq!(
            calls[0].body,
            RequestBody::Json(serde_json::json!({"refreshToken": "rt_old"}))
        );
    }

    #[tokio::test]
    async fn rejection_clears_credentials() {
        let transport = Arc::new(MockTransport::new(|_| unauthorized()));
        let store = signed_in_store();
        let refresher = coordinator(transport, store.clone(), RefreshPolicy::default());

        let outcome = refresher.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Rejected { status: 401 });
        assert!(store.get().unwrap().is_none());
        assert!(store.user().unwrap().is_none());
    }

    #[tokio::test]
    async fn success_without_access_token_clears_credentials() {
        let transport = Arc::new(MockTransport::new(|_| {
            respond(200, serde_json::json!({"data": {}}))
        }));
        let store = signed_in_store();
        let refresher = coordinator(transport, store.clone(), RefreshPolicy::default());

        let outcome = refresher.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Rejected { status: 200 });
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_failure_clears_by_default() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(Error::Transport("connection reset".into()))
        }));
        let store = signed_in_store();
        let refresher = coordinator(transport, store.clone(), RefreshPolicy::default());

        let outcome = refresher.refresh().await;

        assert!(matches!(outcome, RefreshOutcome::TransportFailed(_)));
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_failure_can_keep_the_session() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(Error::Transport("connection reset".into()))
        }));
        let store = signed_in_store();
        let policy = RefreshPolicy {
            clear_on_transport_error: false,
        };
        let refresher = coordinator(transport, store.clone(), policy);

        let outcome = refresher.refresh().await;

        assert!(matches!(outcome, RefreshOutcome::TransportFailed(_)));
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("rt_old"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", Some("rt_new"))));
        let refresher = coordinator(transport.clone(), signed_in_store(), RefreshPolicy::default());

        let outcomes = join_all((0..10).map(|_| refresher.refresh())).await;

        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        for outcome in outcomes {
            assert_eq!(outcome.access_token(), Some("at_new"));
        }
    }

    #[tokio::test]
    async fn state_is_refreshing_while_exchange_is_pending() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", None)));
        let refresher = Arc::new(coordinator(
            transport,
            signed_in_store(),
            RefreshPolicy::default(),
        ));

        let background = {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.refresh().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(refresher.state().await, RefreshState::Refreshing);

        background.await.unwrap();
        assert_eq!(refresher.state().await, RefreshState::Idle);
    }

    #[tokio::test]
    async fn next_failure_after_completion_starts_a_new_exchange() {
        let transport = Arc::new(MockTransport::new(|_| refreshed("at_new", None)));
        let refresher = coordinator(transport.clone(), signed_in_store(), RefreshPolicy::default());

        refresher.refresh().await;
        refresher.refresh().await;

        assert_eq!(transport.calls_to(REFRESH_PATH), 2);
    }

    #[test]
    fn refreshed_outcome_redacts_token_in_debug() {
        let outcome = RefreshOutcome::Refreshed(Secret::new("at_secret".into()));
        assert!(!format!("{outcome:?}").contains("at_secret"));
    }
}

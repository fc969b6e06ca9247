//! Client-side request metrics
//!
//! - `api_requests_total` (counter): labels `status`, `method`
//! - `api_token_refresh_total` (counter): label `outcome`
//! - `api_transport_errors_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

/// Record a completed exchange with its status code and method.
pub fn record_request(status: u16, method: &str) {
    metrics::counter!(
        "api_requests_total",
        "status" => status.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Record the result of one refresh-token exchange.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("api_token_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a connection-level failure.
pub fn record_transport_error() {
    metrics::counter!("api_transport_errors_total").increment(1);
}

//! Campus API endpoints on top of [`api_client::ApiClient`]
//!
//! Each module wraps one area of the server API. All calls go through the
//! authenticated pipeline, so token refresh and session expiry behave the
//! same everywhere.

pub mod assignments;
pub mod assistant;
pub mod auth;
pub mod courses;
pub mod scores;
pub mod submissions;

#[cfg(test)]
mod testing;

pub use api_client::{Error, Result};
pub use assignments::AssignmentSummary;
pub use assistant::ChatOptions;
pub use courses::CourseSummary;
pub use scores::ScoreItem;
pub use submissions::{AnswerFile, SubmissionUpload};

use api_client::{ApiClient, RequestOptions};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct ItemsEnvelope<T> {
    items: Option<Vec<T>>,
}

/// GET `path` and return its `items` array; a missing array is empty.
pub(crate) async fn list_items<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
) -> Result<Vec<T>> {
    let body = client.request(path, RequestOptions::get()).await?;
    if body.is_null() {
        return Ok(Vec::new());
    }
    let envelope: ItemsEnvelope<T> =
        serde_json::from_value(body).map_err(|e| Error::UnexpectedResponse(e.to_string()))?;
    Ok(envelope.items.unwrap_or_default())
}

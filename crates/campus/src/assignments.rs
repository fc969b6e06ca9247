//! Assignment listing and detail endpoints

use api_client::{ApiClient, RequestOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, list_items};

/// One row of an assignment listing.
///
/// Only the fields the client inspects are typed; everything else is kept
/// in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Every assignment visible to the student.
pub async fn list_all(client: &ApiClient) -> Result<Vec<AssignmentSummary>> {
    list_items(client, "/assignments/all-list").await
}

/// Assignments currently accepting submissions.
pub async fn list_open(client: &ApiClient) -> Result<Vec<AssignmentSummary>> {
    list_items(client, "/assignments/open").await
}

pub async fn get(client: &ApiClient, assignment_id: &str) -> Result<Value> {
    client
        .request(&format!("/assignments/{assignment_id}"), RequestOptions::get())
        .await
}

/// Question snapshot used to render the submission form.
pub async fn snapshot(client: &ApiClient, assignment_id: &str) -> Result<Value> {
    client
        .request(
            &format!("/assignments/{assignment_id}/snapshot"),
            RequestOptions::get(),
        )
        .await
}

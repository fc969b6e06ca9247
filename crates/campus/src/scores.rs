//! The student's own scores

use api_client::{ApiClient, RequestOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, list_items};

/// Grading status of a score that has been released.
pub const GRADED: &str = "GRADED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ScoreItem {
    pub fn is_graded(&self) -> bool {
        self.status.as_deref() == Some(GRADED)
    }
}

pub async fn list_mine(client: &ApiClient) -> Result<Vec<ScoreItem>> {
    list_items(client, "/scores/me").await
}

pub async fn detail(client: &ApiClient, assignment_id: &str) -> Result<Value> {
    client
        .request(&format!("/scores/me/{assignment_id}"), RequestOptions::get())
        .await
}

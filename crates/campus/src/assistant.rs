//! Study assistant chat and image attachments

use std::path::Path;

use api_client::{ApiClient, RequestOptions, UploadedImage};
use serde_json::Value;

use crate::Result;

const CHAT_PATH: &str = "/assistant/chat";
const UPLOAD_PATH: &str = "/assistant/upload";
const DEFAULT_THINKING: &str = "disabled";

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Continue an existing conversation; empty starts a new one.
    pub session_id: Option<String>,
    /// Reasoning mode; `disabled` when unset.
    pub thinking: Option<String>,
    /// Images uploaded with [`upload_images`].
    pub images: Vec<UploadedImage>,
}

pub async fn send_message(
    client: &ApiClient,
    question: &str,
    options: ChatOptions,
) -> Result<Value> {
    let body = serde_json::json!({
        "question": question,
        "sessionId": options.session_id.unwrap_or_default(),
        "thinking": options.thinking.as_deref().unwrap_or(DEFAULT_THINKING),
        "images": options.images,
    });
    client.request(CHAT_PATH, RequestOptions::post(body)).await
}

/// Upload images for a chat message, one at a time in input order.
pub async fn upload_images<P: AsRef<Path>>(
    client: &ApiClient,
    paths: &[P],
) -> Result<Vec<UploadedImage>> {
    client.upload_images(UPLOAD_PATH, paths).await
}

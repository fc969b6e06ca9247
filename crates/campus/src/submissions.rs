//! Submission history and upload

use std::path::PathBuf;

use api_client::{ApiClient, Error, UploadFileEntry};
use serde_json::Value;

use crate::{Result, list_items};

const UPLOAD_PATH: &str = "/submissions/upload";

/// A local file answering one question of the submission form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFile {
    pub question_id: String,
    pub path: PathBuf,
}

impl AnswerFile {
    pub fn new(question_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            question_id: question_id.into(),
            path: path.into(),
        }
    }
}

/// Everything a student hands in for one assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionUpload {
    pub assignment_id: String,
    /// Answers keyed by question id; sent as JSON text.
    pub answers: Value,
    pub files: Vec<AnswerFile>,
}

/// Latest submission per question for `assignment_id`.
pub async fn list_latest(client: &ApiClient, assignment_id: &str) -> Result<Vec<Value>> {
    list_items(client, &format!("/submissions/latest/{assignment_id}")).await
}

/// Submit answers and attachments. Without attachments this is a plain
/// form request; every attachment is sent under `files[<question id>]`.
pub async fn upload(client: &ApiClient, submission: SubmissionUpload) -> Result<Value> {
    let answers = serde_json::to_string(&submission.answers)
        .map_err(|e| Error::InvalidRequest(format!("answers are not serializable: {e}")))?;
    let fields = vec![
        ("assignmentId".to_string(), submission.assignment_id),
        ("answers".to_string(), answers),
    ];
    let entries = submission
        .files
        .iter()
        .map(|file| UploadFileEntry::for_question(&file.question_id, &file.path))
        .collect();
    client.upload(UPLOAD_PATH, entries, fields).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok, stub_client};
    use api_client::{RequestBody, TransportResponse};
    use reqwest::Method;

    fn submission(files: Vec<AnswerFile>) -> SubmissionUpload {
        SubmissionUpload {
            assignment_id: "a-1".into(),
            answers: serde_json::json!({"q1": "B"}),
            files,
        }
    }

    fn expected_fields() -> Vec<(String, String)> {
        vec![
            ("assignmentId".into(), "a-1".into()),
            ("answers".into(), r#"{"q1":"B"}"#.into()),
        ]
    }

    #[tokio::test]
    async fn list_latest_reads_items() {
        let (client, transport) =
            stub_client(|_| ok(serde_json::json!({"items": [{"questionId": "q1"}]})));

        let items = list_latest(&client, "a-1").await.unwrap();

        assert_eq!(items[0]["questionId"], "q1");
        assert_eq!(transport.sent()[0].path, "/submissions/latest/a-1");
    }

    #[tokio::test]
    async fn answers_only_is_a_form_post() {
        let (client, transport) = stub_client(|_| ok(serde_json::json!({"id": "s-1"})));

        let body = upload(&client, submission(vec![])).await.unwrap();

        assert_eq!(body["id"], "s-1");
        let sent = &transport.sent()[0];
        assert_eq!(sent.path, UPLOAD_PATH);
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.body, RequestBody::Form(expected_fields()));
    }

    #[tokio::test]
    async fn attachments_are_keyed_by_question() {
        let (client, transport) =
            stub_client(|_| TransportResponse::new(201, r#"{"id":"s-2","status":"SUBMITTED"}"#));

        let body = upload(
            &client,
            submission(vec![
                AnswerFile::new("q2", "/tmp/q2.jpg"),
                AnswerFile::new("q3", "/tmp/q3.pdf"),
            ]),
        )
        .await
        .unwrap();

        assert_eq!(body["status"], "SUBMITTED");
        let RequestBody::Multipart { files, fields } = &transport.sent()[0].body else {
            panic!("expected multipart upload");
        };
        let keys: Vec<_> = files.iter().map(|f| f.field_key.as_str()).collect();
        assert_eq!(keys, vec!["files[q2]", "files[q3]"]);
        assert_eq!(fields, &expected_fields());
    }
}

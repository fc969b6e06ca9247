//! Upload request shaping and upload response decoding
//!
//! Submissions carry zero or more files, each answering one form question.
//! [`UploadPlan`] picks the request shape from the file count; the server
//! maps every file back to its question through the part's field key, so
//! entries never share a generic key.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::transport::RequestBody;

/// A local file and the form field it is submitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileEntry {
    pub field_key: String,
    pub path: PathBuf,
}

impl UploadFileEntry {
    pub fn new(field_key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            field_key: field_key.into(),
            path: path.into(),
        }
    }

    /// Entry answering form question `question_id`: field `files[<id>]`.
    pub fn for_question(question_id: &str, path: impl AsRef<Path>) -> Self {
        Self::new(format!("files[{question_id}]"), path.as_ref())
    }
}

/// Request shape for a submission, chosen by attachment count.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadPlan {
    /// No attachments: a plain form-encoded request.
    Form { fields: Vec<(String, String)> },
    /// One multipart file part under the entry's own key.
    SingleFile {
        entry: UploadFileEntry,
        fields: Vec<(String, String)>,
    },
    /// One multipart file part per entry, each under its own key.
    MultiFile {
        entries: Vec<UploadFileEntry>,
        fields: Vec<(String, String)>,
    },
}

impl UploadPlan {
    pub fn build(mut entries: Vec<UploadFileEntry>, fields: Vec<(String, String)>) -> Self {
        match entries.len() {
            0 => UploadPlan::Form { fields },
            1 => UploadPlan::SingleFile {
                entry: entries.remove(0),
                fields,
            },
            _ => UploadPlan::MultiFile { entries, fields },
        }
    }

    /// Number of file parts the request will carry.
    pub fn file_count(&self) -> usize {
        match self {
            UploadPlan::Form { .. } => 0,
            UploadPlan::SingleFile { .. } => 1,
            UploadPlan::MultiFile { entries, .. } => entries.len(),
        }
    }

    pub fn into_body(self) -> RequestBody {
        match self {
            UploadPlan::Form { fields } => RequestBody::Form(fields),
            UploadPlan::SingleFile { entry, fields } => RequestBody::Multipart {
                files: vec![entry],
                fields,
            },
            UploadPlan::MultiFile { entries, fields } => RequestBody::Multipart {
                files: entries,
                fields,
            },
        }
    }
}

/// Decode an upload response body.
///
/// The upload endpoint answers with a JSON document delivered as text; an
/// empty body decodes to `{}`.
pub fn decode_upload_body(body: &str) -> Result<serde_json::Value> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(body).map_err(|e| Error::UploadDecode(e.to_string()))
}

/// An uploaded image, ready to reference from a chat message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadedImage {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFiles {
    #[serde(default)]
    files: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Extract the first uploaded file from an image upload response.
///
/// The returned `url` is still server-relative; the caller makes it absolute.
pub(crate) fn first_uploaded_image(
    document: serde_json::Value,
    local_path: &Path,
) -> Result<UploadedImage> {
    let parsed: UploadedFiles =
        serde_json::from_value(document).map_err(|e| Error::UploadDecode(e.to_string()))?;
    let first = parsed.files.into_iter().next();
    let Some(UploadedFile {
        name,
        url: Some(url),
    }) = first.filter(|file| file.url.as_deref().is_some_and(|u| !u.is_empty()))
    else {
        return Err(Error::UploadDecode(
            "upload response is missing the image url".into(),
        ));
    };

    let name = name
        .filter(|n| !n.is_empty())
        .or_else(|| {
            local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "image".to_string());
    Ok(UploadedImage { name, url })
}

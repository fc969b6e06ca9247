//! Typed credential access over a key-value store
//!
//! [`CredentialStore`] is the only writer of session state. Tokens and the
//! user record are always written and removed as one batch, so a reader sees
//! either a full session or none at all.

use std::sync::Arc;

use common::Secret;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::constants::{
    ACCESS_TOKEN_KEY, DEVICE_ID_KEY, DEVICE_ID_PREFIX, REFRESH_TOKEN_KEY, USER_KEY,
};
use crate::error::{Error, Result};
use crate::kv::KeyValueStore;

/// The signed-in user as returned by the login endpoint.
///
/// Fields the client does not model are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Numeric ids are kept in their decimal string form.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// A complete session: both tokens plus the user they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub user: Option<UserRecord>,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: Option<UserRecord>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            user,
        }
    }
}

/// Typed accessors for tokens, user record and device identifier.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Current session, or `None` when either token is missing.
    pub fn get(&self) -> Result<Option<Credentials>> {
        let (Some(access_token), Some(refresh_token)) =
            (self.access_token()?, self.refresh_token()?)
        else {
            return Ok(None);
        };
        Ok(Some(Credentials {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            user: self.user()?,
        }))
    }

    /// Current access token. Empty stored values read as absent.
    pub fn access_token(&self) -> Result<Option<String>> {
        self.read_token(ACCESS_TOKEN_KEY)
    }

    /// Current refresh token. Empty stored values read as absent.
    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.read_token(REFRESH_TOKEN_KEY)
    }

    /// Stored user record, if any.
    pub fn user(&self) -> Result<Option<UserRecord>> {
        match self.kv.get(USER_KEY)? {
            Some(raw) if !raw.trim().is_empty() && raw.trim() != "null" => {
                let user = serde_json::from_str(&raw)
                    .map_err(|e| Error::Parse(format!("stored user record: {e}")))?;
                Ok(Some(user))
            }
            _ => Ok(None),
        }
    }

    /// Replace the whole session in one batch.
    pub fn set(&self, credentials: &Credentials) -> Result<()> {
        let user = match &credentials.user {
            Some(user) => Some(
                serde_json::to_string(user)
                    .map_err(|e| Error::Parse(format!("serializing user record: {e}")))?,
            ),
            None => None,
        };
        self.kv.apply(&[
            (ACCESS_TOKEN_KEY, Some(credentials.access_token.expose().as_str())),
            (REFRESH_TOKEN_KEY, Some(credentials.refresh_token.expose().as_str())),
            (USER_KEY, user.as_deref()),
        ])?;
        debug!(has_user = credentials.user.is_some(), "stored credentials");
        Ok(())
    }

    /// Remove tokens and user in one batch.
    pub fn clear(&self) -> Result<()> {
        self.kv
            .apply(&[(ACCESS_TOKEN_KEY, None), (REFRESH_TOKEN_KEY, None), (USER_KEY, None)])?;
        info!("cleared credentials");
        Ok(())
    }

    /// Per-install device identifier, generated and persisted on first read.
    pub fn device_id(&self) -> Result<String> {
        if let Some(existing) = self.kv.get(DEVICE_ID_KEY)?
            && !existing.is_empty()
        {
            return Ok(existing);
        }
        let id = generate_device_id();
        self.kv.set(DEVICE_ID_KEY, &id)?;
        info!(device_id = %id, "generated device id");
        Ok(id)
    }

    fn read_token(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.get(key)?.filter(|value| !value.is_empty()))
    }
}

/// `wx-<unix millis>-<8 random hex chars>`
fn generate_device_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{DEVICE_ID_PREFIX}-{millis}-{}", &random[..8])
}

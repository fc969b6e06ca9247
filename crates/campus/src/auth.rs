//! Sign-in, profile and sign-out

use api_client::{ApiClient, Error, LOGIN_PATH, RequestOptions};
use serde::Deserialize;
use serde_json::Value;
use session::{Credentials, UserRecord};
use tracing::info;

use crate::Result;

const ME_PATH: &str = "/auth/me";

#[derive(Deserialize)]
struct LoginEnvelope {
    data: Option<LoginData>,
}

#[derive(Deserialize)]
struct LoginData {
    token: Option<TokenPair>,
    user: Option<UserRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Sign in and persist the session. Returns the signed-in user.
///
/// The device identifier is sent along so the server can bind the session
/// to this install.
pub async fn login(client: &ApiClient, username: &str, password: &str) -> Result<UserRecord> {
    let device_id = client.credentials().device_id()?;
    let body = serde_json::json!({
        "username": username,
        "password": password,
        "deviceId": device_id,
    });
    let response = client
        .request(LOGIN_PATH, RequestOptions::post(body).without_auth())
        .await?;

    let (access_token, refresh_token, user) = parse_login(response)?;
    client.credentials().set(&Credentials::new(
        access_token,
        refresh_token,
        Some(user.clone()),
    ))?;

    info!(user_id = ?user.id, "signed in");
    Ok(user)
}

/// Profile of the signed-in user.
pub async fn me(client: &ApiClient) -> Result<Value> {
    client.request(ME_PATH, RequestOptions::get()).await
}

/// Forget the stored session. The device identifier is kept.
pub fn logout(client: &ApiClient) -> Result<()> {
    client.credentials().clear()?;
    Ok(())
}

/// Access token, refresh token and user from a login response.
fn parse_login(response: Value) -> Result<(String, String, UserRecord)> {
    let envelope = serde_json::from_value::<LoginEnvelope>(response).map_err(|e| {
        Error::UnexpectedResponse(format!("login response could not be decoded: {e}"))
    })?;
    complete_login(envelope)
        .ok_or_else(|| Error::UnexpectedResponse("login response is incomplete".into()))
}

fn complete_login(envelope: LoginEnvelope) -> Option<(String, String, UserRecord)> {
    let data = envelope.data?;
    let token = data.token?;
    let access = token.access_token.filter(|t| !t.is_empty())?;
    let refresh = token.refresh_token.filter(|t| !t.is_empty())?;
    let user = data.user?;
    Some((access, refresh, user))
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::content::OpaqueBody;

// -- Auth --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// OAuth2-shaped password form. Clients send the full grant form, so unknown
/// fields (grant_type, scope, client_id, ...) must be tolerated here.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// -- Directory --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LookupRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserId {
    pub id: i64,
}

/// One directory entry: the pair a client needs to match a server account
/// against a locally trusted key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserBase {
    pub username: String,
    pub email: String,
}

// -- Messages --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: OpaqueBody,
}

/// A transcript or preview entry as it crosses the wire. `time_sent` is the
/// server's naive local timestamp, serialized ISO-8601 with no zone suffix.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConversationMessage {
    pub sender: String,
    pub recipient: String,
    pub content: OpaqueBody,
    pub time_sent: NaiveDateTime,
}

//! Typed calls against the Alcove REST surface.

use anyhow::{Context, bail};

use alcove_types::OpaqueBody;
use alcove_types::api::{
    ConversationMessage, LookupRequest, RegisterRequest, SendMessageRequest, TokenResponse,
    UserBase, UserId,
};

pub struct HttpService {
    base_url: String,
    http: reqwest::Client,
    token: Option<TokenResponse>,
}

impl HttpService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            token: None,
        }
    }

    fn bearer(&self) -> anyhow::Result<&str> {
        self.token
            .as_ref()
            .map(|t| t.access_token.as_str())
            .context("You must be logged in first.")
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(format!("{}/register", self.base_url))
            .json(&RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        expect_ok(resp).await?;
        Ok(())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> anyhow::Result<()> {
        // The login endpoint speaks the OAuth2 password form.
        let form = [
            ("grant_type", ""),
            ("username", username),
            ("password", password),
            ("scope", ""),
            ("client_id", ""),
            ("client_secret", ""),
        ];

        let resp = self
            .http
            .post(format!("{}/login", self.base_url))
            .form(&form)
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        self.token = Some(resp.json::<TokenResponse>().await?);
        Ok(())
    }

    /// Resolve a correspondent to their numeric id. Anything containing an
    /// `@` is treated as an email, otherwise as a username.
    pub async fn lookup(&self, ident: &str) -> anyhow::Result<i64> {
        let payload = if ident.contains('@') {
            LookupRequest {
                username: None,
                email: Some(ident.to_string()),
            }
        } else {
            LookupRequest {
                username: Some(ident.to_string()),
                email: None,
            }
        };

        let resp = self
            .http
            .post(format!("{}/lookup/", self.base_url))
            .bearer_auth(self.bearer()?)
            .json(&payload)
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        Ok(resp.json::<UserId>().await?.id)
    }

    pub async fn previews(&self) -> anyhow::Result<Vec<ConversationMessage>> {
        let resp = self
            .http
            .get(format!("{}/messages/", self.base_url))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        Ok(resp.json().await?)
    }

    pub async fn transcript(&self, friend_id: i64) -> anyhow::Result<Vec<ConversationMessage>> {
        let resp = self
            .http
            .get(format!("{}/messages/{}", self.base_url, friend_id))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        Ok(resp.json().await?)
    }

    /// Submit sealed content; the server answers with the refreshed
    /// transcript.
    pub async fn send_message(
        &self,
        friend_id: i64,
        content: OpaqueBody,
    ) -> anyhow::Result<Vec<ConversationMessage>> {
        let resp = self
            .http
            .post(format!("{}/messages/{}", self.base_url, friend_id))
            .bearer_auth(self.bearer()?)
            .json(&SendMessageRequest { content })
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        Ok(resp.json().await?)
    }

    pub async fn directory(&self) -> anyhow::Result<Vec<UserBase>> {
        let resp = self
            .http
            .get(format!("{}/friends", self.base_url))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        let resp = expect_ok(resp).await?;

        Ok(resp.json().await?)
    }
}

/// Surface the server's `detail` string when a call fails; fall back to the
/// bare status when the body is not the usual error shape.
async fn expect_ok(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let detail = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| status.to_string());
    bail!("{}", detail)
}

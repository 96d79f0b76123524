use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::RwLock;

/// Connection settings for the HRMS backend.
#[derive(Debug, Clone)]
pub struct HrmsConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Employee id used when a tool call carries no actor context.
    pub default_employee_id: i64,
}

/// Authenticated HTTP client for the HRMS API.
///
/// Login is a two-step handshake: credentials are first encrypted through the
/// server's `/encrypt` endpoint, then exchanged for a bearer token. The token
/// is cached and refreshed once on a 401.
///
/// The HRMS deployment sits behind a self-signed certificate, so certificate
/// validation is disabled for this client only.
pub struct HrmsClient {
    http: reqwest::Client,
    config: HrmsConfig,
    token: RwLock<Option<String>>,
}

impl HrmsClient {
    pub fn new(config: HrmsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build HRMS http client")?;
        Ok(Self {
            http,
            config,
            token: RwLock::new(None),
        })
    }

    pub fn default_employee_id(&self) -> i64 {
        self.config.default_employee_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn encrypt_value(&self, value: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/encrypt"))
            .json(&value)
            .send()
            .await
            .context("encrypt request failed")?;
        if !response.status().is_success() {
            bail!("encrypt endpoint returned HTTP {}", response.status());
        }
        let body = response.text().await?;
        Ok(body.trim().trim_matches('"').to_string())
    }

    async fn login(&self) -> Result<String> {
        tracing::debug!("authenticating with HRMS");
        let username = self.encrypt_value(&self.config.username).await?;
        let password = self.encrypt_value(&self.config.password).await?;

        let response = self
            .http
            .post(self.url("/api/ControlPanel/Access/login"))
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .context("HRMS login request failed")?;
        if !response.status().is_success() {
            bail!("HRMS login failed with HTTP {}", response.status());
        }

        let body: Value = response.json().await.context("HRMS login returned invalid JSON")?;
        let token = body
            .get("token")
            .or_else(|| body.get("access_token"))
            .or_else(|| body.get("accessToken"))
            .and_then(Value::as_str)
            .context("HRMS login response carried no token")?;
        Ok(token.to_string())
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        let token = self.login().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    async fn send_authed(
        &self,
        build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let token = self.token().await?;
        let response = build(&self.http, &token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        // Stale token, refresh once and retry.
        self.invalidate_token().await;
        let token = self.token().await?;
        Ok(build(&self.http, &token).send().await?)
    }

    /// GET with bearer auth and query parameters, returning the response body
    /// as text together with the status code.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<(StatusCode, String)> {
        let url = self.url(path);
        let response = self
            .send_authed(|http, token| http.get(&url).bearer_auth(token).query(query))
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// POST a JSON body with bearer auth.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<(StatusCode, String)> {
        let url = self.url(path);
        let response = self
            .send_authed(|http, token| http.post(&url).bearer_auth(token).json(body))
            .await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// POST an urlencoded form with bearer auth. The leave submission endpoint
    /// only accepts form data.
    pub async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<(StatusCode, String)> {
        let url = self.url(path);
        let response = self
            .send_authed(|http, token| http.post(&url).bearer_auth(token).form(form))
            .await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

// # AdGuard Home Rewrite Client
//
// This crate provides the `RewriteApi` implementation for the AdGuard Home
// control API.
//
// ## Behaviour
//
// - One HTTP request per trait call
// - HTTP basic authentication on every request
// - Configurable timeout and TLS verification
// - Any status other than 200 is an error carrying the response body
// - No retries and no caching: the reconciler decides what to call
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
//
// ## API Reference
//
// - List rewrites: GET `/control/rewrite/list`
// - Add rewrite: POST `/control/rewrite/add` `{"domain": ..., "answer": ...}`
// - Delete rewrite: POST `/control/rewrite/delete` `{"domain": ..., "answer": ...}`

use adguard_core::{
    ConnectionOptions, Error, Result, Rewrite, RewriteApi, RewriteApiFactory, ServerConfig,
};
use async_trait::async_trait;
use reqwest::StatusCode;

const LIST_PATH: &str = "/control/rewrite/list";
const ADD_PATH: &str = "/control/rewrite/add";
const DELETE_PATH: &str = "/control/rewrite/delete";

/// Client for one AdGuard Home server
pub struct AdGuardClient {
    /// Base URL without trailing slash
    base_url: String,

    /// Basic auth username
    username: String,

    /// Basic auth password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for AdGuardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdGuardClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl AdGuardClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `server`: Base URL and credentials
    /// - `options`: Timeout and TLS verification settings
    ///
    /// # Errors
    ///
    /// Fails if the URL is empty or the HTTP client cannot be built.
    pub fn new(server: &ServerConfig, options: &ConnectionOptions) -> Result<Self> {
        let base_url = server.url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("AdGuard Home URL cannot be empty"));
        }

        if !options.validate_certs {
            tracing::warn!("TLS certificate verification disabled for {}", base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.validate_certs)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            username: server.username.clone(),
            password: server.password.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a rewrite body to one of the mutation endpoints
    async fn post_rewrite(&self, path: &str, rewrite: &Rewrite, operation: &str) -> Result<()> {
        let url = self.url(path);
        tracing::debug!("POST {} ({})", url, rewrite);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({
                "domain": rewrite.domain,
                "answer": rewrite.answer,
            }))
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        ensure_ok(response, operation).await?;
        Ok(())
    }
}

/// Map any status other than 200 to an error
async fn ensure_ok(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    let error_text = error_text.trim();

    match status.as_u16() {
        401 | 403 => Err(Error::auth(format!(
            "Failed to {}: invalid username or password. Status: {}",
            operation, status
        ))),
        500..=599 => Err(Error::api(
            status.as_u16(),
            format!("Failed to {}: AdGuard Home server error: {}", operation, error_text),
        )),
        code => Err(Error::api(
            code,
            format!("Failed to {}: {}", operation, error_text),
        )),
    }
}

#[async_trait]
impl RewriteApi for AdGuardClient {
    /// ```http
    /// GET /control/rewrite/list
    /// Authorization: Basic <credentials>
    /// ```
    async fn list_rewrites(&self) -> Result<Vec<Rewrite>> {
        let url = self.url(LIST_PATH);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        let response = ensure_ok(response, "fetch rewrites").await?;

        // An empty list may be encoded as null
        let rewrites: Option<Vec<Rewrite>> = response
            .json()
            .await
            .map_err(|e| Error::http(format!("Failed to parse rewrite list: {}", e)))?;

        Ok(rewrites.unwrap_or_default())
    }

    async fn add_rewrite(&self, rewrite: &Rewrite) -> Result<()> {
        self.post_rewrite(ADD_PATH, rewrite, "add rewrite").await
    }

    async fn delete_rewrite(&self, rewrite: &Rewrite) -> Result<()> {
        self.post_rewrite(DELETE_PATH, rewrite, "delete rewrite").await
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// Factory for creating AdGuard Home clients
pub struct AdGuardClientFactory;

impl RewriteApiFactory for AdGuardClientFactory {
    fn create(
        &self,
        server: &ServerConfig,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn RewriteApi>> {
        Ok(Box::new(AdGuardClient::new(server, options)?))
    }
}

//! Hugging Face Hub client.
//!
//! Covers what the workflow needs from the Hub:
//! - Snapshot download of a model repository
//! - Repository creation (reusing an existing one)
//! - File upload through the preupload / LFS / commit endpoints
//! - Token validation via `whoami`
//!
//! # Module Organization
//!
//! - [`types`] - API request and response structs
//! - [`auth`] - Token resolution
//! - [`download`] - Tree listing and file download
//! - [`upload`] - Repository creation and commits

mod auth;
mod download;
mod types;
mod upload;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

pub use auth::{resolve_token, TokenSource};
pub use types::{HubOrg, HubUser};

use crate::cancel::CancellationToken;
use crate::config::{AppConfig, HubConfig};
use crate::error::{AllQuantsError, Result};
use crate::reporter::{NullReporter, Reporter};
use types::HubErrorBody;

/// The Hub operations the workflow depends on.
#[async_trait]
pub trait ModelHub: Send + Sync {
    /// Write every file of `repo_id` (branch `main`) into `dest_dir`,
    /// keeping the repository's relative paths.
    async fn download_snapshot(&self, repo_id: &str, dest_dir: &Path) -> Result<()>;

    /// Create a public model repository. An existing repository is reused.
    async fn create_repo(&self, repo_id: &str) -> Result<()>;

    /// Upload a local file to `path_in_repo` as one commit.
    async fn upload_file(&self, repo_id: &str, local_path: &Path, path_in_repo: &str)
        -> Result<()>;

    /// Upload in-memory content to `path_in_repo` as one commit.
    async fn upload_bytes(&self, repo_id: &str, content: Vec<u8>, path_in_repo: &str)
        -> Result<()>;

    /// The account the configured token belongs to.
    async fn whoami(&self) -> Result<HubUser>;
}

/// Client for the Hugging Face Hub HTTP API.
pub struct HuggingFaceClient {
    /// HTTP client for API requests (has total timeout)
    pub(super) client: Client,
    /// HTTP client for file transfers (connect timeout only)
    pub(super) transfer_client: Client,
    pub(super) endpoint: String,
    pub(super) token: Option<String>,
    pub(super) reporter: Arc<dyn Reporter>,
    pub(super) cancel: CancellationToken,
}

impl std::fmt::Debug for HuggingFaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceClient")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

impl HuggingFaceClient {
    /// Create a client for `endpoint` (e.g. `https://huggingface.co`).
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HubConfig::REQUEST_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| AllQuantsError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        // Multi-gigabyte transfers outlive any total timeout.
        let transfer_client = Client::builder()
            .connect_timeout(HubConfig::CONNECT_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| AllQuantsError::Network {
                message: format!("Failed to create transfer HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            transfer_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            reporter: Arc::new(NullReporter),
            cancel: CancellationToken::new(),
        })
    }

    /// Send transfer events to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Abort transfers when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Attach the bearer token, if any.
    pub(super) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(super) fn require_token(&self, action: &str) -> Result<()> {
        if self.token.is_none() {
            return Err(AllQuantsError::HubApi {
                message: format!("{action} requires a Hugging Face token (set HF_TOKEN or pass --token)"),
                status_code: None,
            });
        }
        Ok(())
    }

    pub(super) fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.endpoint, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ModelHub for HuggingFaceClient {
    async fn download_snapshot(&self, repo_id: &str, dest_dir: &Path) -> Result<()> {
        self.download_repo(repo_id, dest_dir).await
    }

    async fn create_repo(&self, repo_id: &str) -> Result<()> {
        self.create_model_repo(repo_id).await
    }

    async fn upload_file(
        &self,
        repo_id: &str,
        local_path: &Path,
        path_in_repo: &str,
    ) -> Result<()> {
        let source = upload::UploadSource::from_file(local_path, &self.cancel).await?;
        self.upload(repo_id, source, path_in_repo).await
    }

    async fn upload_bytes(
        &self,
        repo_id: &str,
        content: Vec<u8>,
        path_in_repo: &str,
    ) -> Result<()> {
        self.upload(repo_id, upload::UploadSource::from_bytes(content), path_in_repo)
            .await
    }

    async fn whoami(&self) -> Result<HubUser> {
        self.require_token("whoami")?;
        let response = self
            .authorize(self.client.get(self.api_url("whoami-v2")))
            .send()
            .await
            .map_err(|e| net_err("whoami request failed", e))?;
        let response = check_response(response, "whoami").await?;
        response.json::<HubUser>().await.map_err(|e| AllQuantsError::Json {
            message: format!("Failed to parse whoami response: {}", e),
            source: None,
        })
    }
}

/// Wrap a transport error with what was being attempted.
pub(super) fn net_err(context: &str, e: reqwest::Error) -> AllQuantsError {
    if e.is_timeout() {
        return AllQuantsError::Timeout(HubConfig::REQUEST_TIMEOUT);
    }
    AllQuantsError::Network {
        message: format!("{context}: {e}"),
        cause: Some(e.to_string()),
    }
}

/// Turn a non-success response into [`AllQuantsError::HubApi`].
pub(super) async fn check_response(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!("{} failed with {}: {}", context, status, body);
    Err(AllQuantsError::HubApi {
        message: describe_failure(status, context, &body),
        status_code: Some(status.as_u16()),
    })
}

fn describe_failure(status: StatusCode, context: &str, body: &str) -> String {
    let detail = serde_json::from_str::<HubErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.trim().chars().take(200).collect());

    let reason = match status {
        StatusCode::UNAUTHORIZED => "authentication failed (missing or invalid token)".to_string(),
        StatusCode::FORBIDDEN => "access denied".to_string(),
        StatusCode::NOT_FOUND => "not found".to_string(),
        _ => format!("HTTP {}", status.as_u16()),
    };

    if detail.is_empty() {
        format!("{context}: {reason}")
    } else {
        format!("{context}: {reason}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_endpoint_and_token() {
        let client = HuggingFaceClient::new("https://hub.example/", Some("  ".into())).unwrap();
        assert_eq!(client.endpoint(), "https://hub.example");
        assert!(!client.has_token());
        assert_eq!(
            client.api_url("/whoami-v2"),
            "https://hub.example/api/whoami-v2"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HuggingFaceClient::new("https://hub.example", Some("hf_secret".into())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("hf_secret"));
        assert!(debug.contains("has_token: true"));
    }

    #[test]
    fn test_require_token() {
        let client = HuggingFaceClient::new("https://hub.example", None).unwrap();
        let err = client.require_token("upload").unwrap_err();
        assert!(err.to_string().contains("requires a Hugging Face token"));
    }

    #[test]
    fn test_describe_failure() {
        let msg = describe_failure(
            StatusCode::NOT_FOUND,
            "listing org/missing",
            r#"{"error":"Repository not found"}"#,
        );
        assert_eq!(msg, "listing org/missing: not found: Repository not found");

        let msg = describe_failure(StatusCode::UNAUTHORIZED, "create repo", "");
        assert!(msg.contains("authentication failed"));

        let msg = describe_failure(StatusCode::BAD_GATEWAY, "commit", "upstream down");
        assert_eq!(msg, "commit: HTTP 502: upstream down");
    }
}

//! Repository creation and file upload.
//!
//! Uploading one file follows the Hub's commit protocol:
//! 1. `POST /api/models/{repo}/preupload/main` decides between LFS and
//!    inline ("regular") storage
//! 2. LFS files go through the git-lfs batch API (basic or multipart)
//! 3. `POST /api/models/{repo}/commit/main` records the file on `main`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::stream;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::types::{
    CommitLine, CompletedPart, CreateRepoRequest, LfsAction, LfsBatchRequest, LfsBatchResponse,
    LfsObjectId, LfsRef, LfsVerifyRequest, MultipartCompletion, PreuploadFile, PreuploadRequest,
    PreuploadResponse, UploadMode,
};
use super::{check_response, net_err, HuggingFaceClient};
use crate::cancel::CancellationToken;
use crate::config::HubConfig;
use crate::error::{AllQuantsError, Result};
use crate::reporter::{Reporter, WorkflowEvent};

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";

/// Content to upload, with the facts the Hub asks for up front.
pub(super) struct UploadSource {
    data: SourceData,
    size: u64,
    sample: Vec<u8>,
    sha256: String,
}

enum SourceData {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl UploadSource {
    pub(super) async fn from_file(path: &Path, cancel: &CancellationToken) -> Result<Self> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| AllQuantsError::io_with_path(e, path))?
            .len();

        let mut sample = vec![0u8; HubConfig::PREUPLOAD_SAMPLE_BYTES.min(size as usize)];
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AllQuantsError::io_with_path(e, path))?;
        file.read_exact(&mut sample)
            .await
            .map_err(|e| AllQuantsError::io_with_path(e, path))?;

        info!(
            "Computing SHA256 for {} (this may take a moment for large files)",
            path.display()
        );
        let sha256 = compute_sha256_async(path, cancel.clone()).await?;

        Ok(Self {
            data: SourceData::File(path.to_path_buf()),
            size,
            sample,
            sha256,
        })
    }

    pub(super) fn from_bytes(content: Vec<u8>) -> Self {
        let sample_len = HubConfig::PREUPLOAD_SAMPLE_BYTES.min(content.len());
        Self {
            size: content.len() as u64,
            sample: content[..sample_len].to_vec(),
            sha256: hex::encode(Sha256::digest(&content)),
            data: SourceData::Bytes(content),
        }
    }

    async fn read_all(&self) -> Result<Vec<u8>> {
        match &self.data {
            SourceData::Bytes(content) => Ok(content.clone()),
            SourceData::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| AllQuantsError::io_with_path(e, path)),
        }
    }

    async fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let end = (offset + len).min(self.size);
        match &self.data {
            SourceData::Bytes(content) => Ok(content[offset as usize..end as usize].to_vec()),
            SourceData::File(path) => {
                let mut file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| AllQuantsError::io_with_path(e, path))?;
                file.seek(std::io::SeekFrom::Start(offset))
                    .await
                    .map_err(|e| AllQuantsError::io_with_path(e, path))?;
                let mut buf = vec![0u8; (end - offset) as usize];
                file.read_exact(&mut buf)
                    .await
                    .map_err(|e| AllQuantsError::io_with_path(e, path))?;
                Ok(buf)
            }
        }
    }

    /// Request body that reports bytes sent as it is consumed.
    async fn body(&self, reporter: Arc<dyn Reporter>, label: &str) -> Result<reqwest::Body> {
        match &self.data {
            SourceData::Bytes(content) => Ok(reqwest::Body::from(content.clone())),
            SourceData::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| AllQuantsError::io_with_path(e, path))?;
                let label = label.to_string();
                let file_stream = stream::unfold((file, 0u64), move |(mut file, sent)| {
                    let reporter = reporter.clone();
                    let label = label.clone();
                    async move {
                        let mut buf = vec![0u8; HubConfig::UPLOAD_CHUNK_SIZE];
                        match file.read(&mut buf).await {
                            Ok(0) => None,
                            Ok(n) => {
                                buf.truncate(n);
                                let sent = sent + n as u64;
                                reporter.report(WorkflowEvent::TransferProgress {
                                    file: label,
                                    bytes: sent,
                                });
                                Some((Ok::<_, std::io::Error>(bytes::Bytes::from(buf)), (file, sent)))
                            }
                            Err(e) => Some((Err(e), (file, sent))),
                        }
                    }
                });
                Ok(reqwest::Body::wrap_stream(file_stream))
            }
        }
    }
}

impl HuggingFaceClient {
    /// `POST /api/repos/create`; HTTP 409 means the repository already exists.
    pub(super) async fn create_model_repo(&self, repo_id: &str) -> Result<()> {
        self.require_token("Creating a repository")?;
        let (organization, name) = repo_id.split_once('/').ok_or_else(|| {
            AllQuantsError::validation("repo_id", format!("'{repo_id}' is not namespace/name"))
        })?;

        let request = CreateRepoRequest {
            repo_type: "model",
            name,
            organization,
            private: false,
        };
        let response = self
            .authorize(self.client.post(self.api_url("repos/create")))
            .json(&request)
            .send()
            .await
            .map_err(|e| net_err("Create repository request failed", e))?;

        if response.status() == StatusCode::CONFLICT {
            info!("Repository {} already exists, reusing it", repo_id);
            return Ok(());
        }
        check_response(response, &format!("creating repository {repo_id}")).await?;
        info!("Created repository {}", repo_id);
        Ok(())
    }

    /// Upload `source` to `path_in_repo` and commit it to `main`.
    pub(super) async fn upload(
        &self,
        repo_id: &str,
        source: UploadSource,
        path_in_repo: &str,
    ) -> Result<()> {
        self.require_token("Uploading")?;
        self.cancel.check()?;

        let Some(mode) = self.preupload(repo_id, &source, path_in_repo).await? else {
            warn!("Hub ignores {} in {}, skipping it", path_in_repo, repo_id);
            return Ok(());
        };
        debug!("{} upload mode: {:?}", path_in_repo, mode);

        let summary = format!("Upload {path_in_repo} with allquants");
        match mode {
            UploadMode::Lfs => {
                self.upload_lfs(repo_id, &source, path_in_repo).await?;
                self.commit(
                    repo_id,
                    &summary,
                    CommitLine::LfsFile {
                        path: path_in_repo,
                        algo: "sha256",
                        oid: &source.sha256,
                    },
                )
                .await
            }
            UploadMode::Regular => {
                let content = source.read_all().await?;
                self.commit(
                    repo_id,
                    &summary,
                    CommitLine::File {
                        content: BASE64.encode(content),
                        path: path_in_repo,
                        encoding: "base64",
                    },
                )
                .await
            }
        }
    }

    /// Ask the Hub how `path_in_repo` must be stored. `None` means ignored.
    async fn preupload(
        &self,
        repo_id: &str,
        source: &UploadSource,
        path_in_repo: &str,
    ) -> Result<Option<UploadMode>> {
        let request = PreuploadRequest {
            files: vec![PreuploadFile {
                path: path_in_repo,
                size: source.size,
                sample: BASE64.encode(&source.sample),
            }],
        };
        let response = self
            .authorize(
                self.client
                    .post(self.api_url(&format!("models/{repo_id}/preupload/main"))),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| net_err("Preupload request failed", e))?;
        let response = check_response(response, &format!("preparing upload of {path_in_repo}")).await?;

        let verdicts: PreuploadResponse = response.json().await.map_err(|e| AllQuantsError::Json {
            message: format!("Failed to parse preupload response: {}", e),
            source: None,
        })?;
        let verdict = verdicts
            .files
            .into_iter()
            .find(|f| f.path == path_in_repo)
            .ok_or_else(|| AllQuantsError::HubApi {
                message: format!("preupload response did not mention {path_in_repo}"),
                status_code: None,
            })?;

        Ok((!verdict.should_ignore).then_some(verdict.upload_mode))
    }

    /// Push the object through the git-lfs batch API unless the Hub has it.
    async fn upload_lfs(&self, repo_id: &str, source: &UploadSource, path_in_repo: &str) -> Result<()> {
        let request = LfsBatchRequest {
            operation: "upload",
            transfers: &["basic", "multipart"],
            objects: vec![LfsObjectId {
                oid: &source.sha256,
                size: source.size,
            }],
            hash_algo: "sha256",
            git_ref: LfsRef { name: "main" },
        };
        let url = format!("{}/{}.git/info/lfs/objects/batch", self.endpoint, repo_id);
        let response = self
            .authorize(self.client.post(&url))
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::to_vec(&request)?)
            .send()
            .await
            .map_err(|e| net_err("LFS batch request failed", e))?;
        let response = check_response(response, &format!("LFS batch for {path_in_repo}")).await?;

        let batch: LfsBatchResponse = response.json().await.map_err(|e| AllQuantsError::Json {
            message: format!("Failed to parse LFS batch response: {}", e),
            source: None,
        })?;
        let multipart = batch.transfer.as_deref() == Some("multipart");
        let object = batch
            .objects
            .into_iter()
            .find(|o| o.oid == source.sha256)
            .ok_or_else(|| AllQuantsError::HubApi {
                message: format!("LFS batch response did not include {path_in_repo}"),
                status_code: None,
            })?;

        if let Some(error) = object.error {
            return Err(AllQuantsError::HubApi {
                message: format!("LFS upload of {path_in_repo} rejected: {}", error.message),
                status_code: Some(error.code),
            });
        }
        let Some(actions) = object.actions else {
            debug!("LFS object {} already on the Hub", object.oid);
            return Ok(());
        };

        if let Some(upload) = actions.upload {
            if multipart || upload.chunk_size().is_some() {
                self.upload_multipart(&upload, source, path_in_repo).await?;
            } else {
                self.upload_basic(&upload, source, path_in_repo).await?;
            }
        }

        if let Some(verify) = actions.verify {
            let response = self
                .authorize(self.client.post(&verify.href))
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .json(&LfsVerifyRequest {
                    oid: &source.sha256,
                    size: source.size,
                })
                .send()
                .await
                .map_err(|e| net_err("LFS verify request failed", e))?;
            check_response(response, &format!("verifying {path_in_repo}")).await?;
        }

        Ok(())
    }

    async fn upload_basic(&self, action: &LfsAction, source: &UploadSource, label: &str) -> Result<()> {
        let mut request = self
            .transfer_client
            .put(&action.href)
            .header(CONTENT_LENGTH, source.size);
        for (name, value) in &action.header {
            request = request.header(name.as_str(), value.as_str());
        }

        let body = source.body(self.reporter.clone(), label).await?;
        let send = request.body(body).send();
        let response = tokio::select! {
            response = send => response.map_err(|e| net_err("LFS upload failed", e))?,
            _ = self.cancel.cancelled() => return Err(AllQuantsError::Cancelled),
        };
        check_response(response, &format!("uploading {label}")).await?;
        Ok(())
    }

    async fn upload_multipart(
        &self,
        action: &LfsAction,
        source: &UploadSource,
        label: &str,
    ) -> Result<()> {
        let chunk_size = action.chunk_size().ok_or_else(|| AllQuantsError::HubApi {
            message: format!("multipart upload of {label} is missing chunk_size"),
            status_code: None,
        })?;
        let parts = action.multipart_urls();
        let expected_parts = source.size.div_ceil(chunk_size.max(1));
        if parts.len() as u64 != expected_parts {
            return Err(AllQuantsError::HubApi {
                message: format!(
                    "multipart upload of {label}: got {} part URLs, expected {}",
                    parts.len(),
                    expected_parts
                ),
                status_code: None,
            });
        }

        let mut completed = Vec::with_capacity(parts.len());
        let mut sent: u64 = 0;
        for (index, (part_number, url)) in parts.iter().enumerate() {
            self.cancel.check()?;
            let chunk = source.read_range(index as u64 * chunk_size, chunk_size).await?;
            let chunk_len = chunk.len() as u64;

            let send = self.transfer_client.put(url).body(chunk).send();
            let response = tokio::select! {
                response = send => response.map_err(|e| net_err("LFS part upload failed", e))?,
                _ = self.cancel.cancelled() => return Err(AllQuantsError::Cancelled),
            };
            let response =
                check_response(response, &format!("uploading part {part_number} of {label}")).await?;
            let etag = response
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| AllQuantsError::HubApi {
                    message: format!("part {part_number} of {label} returned no ETag"),
                    status_code: None,
                })?;

            sent += chunk_len;
            self.reporter.report(WorkflowEvent::TransferProgress {
                file: label.to_string(),
                bytes: sent,
            });
            completed.push(CompletedPart {
                part_number: *part_number,
                etag,
            });
        }

        let completion = MultipartCompletion {
            oid: &source.sha256,
            parts: completed,
        };
        let response = self
            .authorize(self.client.post(&action.href))
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(serde_json::to_vec(&completion)?)
            .send()
            .await
            .map_err(|e| net_err("Completing multipart upload failed", e))?;
        check_response(response, &format!("completing upload of {label}")).await?;
        Ok(())
    }

    /// `POST /api/models/{repo}/commit/main` with a header line and one operation.
    async fn commit(&self, repo_id: &str, summary: &str, operation: CommitLine<'_>) -> Result<()> {
        let body = commit_payload(summary, &operation)?;
        let response = self
            .authorize(
                self.client
                    .post(self.api_url(&format!("models/{repo_id}/commit/main"))),
            )
            .header(CONTENT_TYPE, NDJSON_MEDIA_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| net_err("Commit request failed", e))?;
        check_response(response, &format!("committing to {repo_id}")).await?;
        debug!("Committed: {}", summary);
        Ok(())
    }
}

fn commit_payload(summary: &str, operation: &CommitLine<'_>) -> Result<String> {
    let header = CommitLine::Header {
        summary,
        description: "",
    };
    let mut body = serde_json::to_string(&header)?;
    body.push('\n');
    body.push_str(&serde_json::to_string(operation)?);
    body.push('\n');
    Ok(body)
}

/// SHA256 of a file, hashed on the blocking pool.
/// Hash `path` on the blocking pool, stopping between chunks once `cancel` fires.
async fn compute_sha256_async(path: &Path, cancel: CancellationToken) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file =
            std::fs::File::open(&path).map_err(|e| AllQuantsError::io_with_path(e, &path))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HubConfig::UPLOAD_CHUNK_SIZE];
        loop {
            cancel.check()?;
            let n = std::io::Read::read(&mut file, &mut buffer)
                .map_err(|e| AllQuantsError::io_with_path(e, &path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| AllQuantsError::Other(format!("SHA256 task failed: {e}")))?
}

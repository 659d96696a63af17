//! Repository listing and snapshot download.

use std::path::{Component, Path, PathBuf};

use futures::StreamExt;
use reqwest::header::{HeaderMap, LINK};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::types::TreeEntry;
use super::{check_response, net_err, HuggingFaceClient};
use crate::config::HubConfig;
use crate::error::{AllQuantsError, Result};
use crate::reporter::WorkflowEvent;

impl HuggingFaceClient {
    /// List every file in `repo_id` on `main`, following pagination.
    pub(super) async fn list_repo_files(&self, repo_id: &str) -> Result<Vec<TreeEntry>> {
        let mut url = Some(format!(
            "{}?recursive=true",
            self.api_url(&format!("models/{repo_id}/tree/main"))
        ));
        let mut files = Vec::new();

        while let Some(page_url) = url.take() {
            self.cancel.check()?;
            debug!("Listing {}", page_url);

            let response = self
                .authorize(self.client.get(&page_url))
                .send()
                .await
                .map_err(|e| net_err("Failed to fetch repo tree", e))?;
            let response = check_response(response, &format!("listing files of {repo_id}")).await?;

            url = next_page_link(response.headers());
            let page: Vec<TreeEntry> = response.json().await.map_err(|e| AllQuantsError::Json {
                message: format!("Failed to parse file tree: {}", e),
                source: None,
            })?;
            files.extend(page.into_iter().filter(TreeEntry::is_file));
        }

        Ok(files)
    }

    /// Download all files of `repo_id` into `dest_dir`.
    pub(super) async fn download_repo(&self, repo_id: &str, dest_dir: &Path) -> Result<()> {
        let files = self.list_repo_files(repo_id).await?;
        let total_bytes: u64 = files.iter().filter_map(TreeEntry::content_size).sum();
        info!(
            "Downloading {} files ({} bytes) from {}",
            files.len(),
            total_bytes,
            repo_id
        );

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| AllQuantsError::io("creating download directory", dest_dir, e))?;

        for (index, entry) in files.iter().enumerate() {
            self.cancel.check()?;
            let relative = safe_relative_path(&entry.path)?;
            let dest = dest_dir.join(&relative);

            self.reporter.report(WorkflowEvent::TransferStarted {
                file: entry.path.clone(),
                index: index + 1,
                total: files.len(),
                size: entry.content_size(),
            });
            self.download_file(repo_id, entry, &dest).await?;
            self.reporter.report(WorkflowEvent::TransferCompleted {
                file: entry.path.clone(),
            });
        }

        Ok(())
    }

    /// Stream one file to `<dest>.part`, then rename it into place.
    async fn download_file(&self, repo_id: &str, entry: &TreeEntry, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AllQuantsError::io("creating download directory", parent, e))?;
        }

        let url = resolve_url(&self.endpoint, repo_id, &entry.path);
        let response = self
            .authorize(self.transfer_client.get(&url))
            .send()
            .await
            .map_err(|e| net_err("Download request failed", e))?;
        if !response.status().is_success() {
            return Err(AllQuantsError::DownloadFailed {
                url,
                message: format!("HTTP {}", response.status()),
            });
        }

        let expected = response.content_length().or(entry.content_size());
        let part_path = part_path(dest);
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| AllQuantsError::io_with_path(e, &part_path))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = self.cancel.cancelled() => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Err(AllQuantsError::Cancelled);
                }
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| AllQuantsError::Network {
                message: format!("Download stream error: {}", e),
                cause: Some(e.to_string()),
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| AllQuantsError::io_with_path(e, &part_path))?;
            downloaded += chunk.len() as u64;
            self.reporter.report(WorkflowEvent::TransferProgress {
                file: entry.path.clone(),
                bytes: downloaded,
            });
        }

        file.flush().await?;
        drop(file);

        if let Some(total) = expected {
            if downloaded != total {
                return Err(AllQuantsError::DownloadFailed {
                    url,
                    message: format!("Incomplete download: got {} of {} bytes", downloaded, total),
                });
            }
        }

        tokio::fs::rename(&part_path, dest)
            .await
            .map_err(|e| AllQuantsError::io("renaming downloaded file", dest, e))?;
        Ok(())
    }
}

/// `{endpoint}/{repo}/resolve/main/{path}` with each path segment encoded.
fn resolve_url(endpoint: &str, repo_id: &str, path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{endpoint}/{repo_id}/resolve/main/{}", encoded.join("/"))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(HubConfig::DOWNLOAD_TEMP_SUFFIX);
    dest.with_file_name(name)
}

/// Reject repository paths that would escape the destination directory.
fn safe_relative_path(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(AllQuantsError::HubApi {
            message: format!("refusing to write unsafe repository path '{path}'"),
            status_code: None,
        })
    }
}

/// URL of the next page from a `Link: <url>; rel="next"` header.
fn next_page_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if is_next {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_resolve_url_encodes_segments() {
        assert_eq!(
            resolve_url("https://huggingface.co", "org/m", "sub dir/model.safetensors"),
            "https://huggingface.co/org/m/resolve/main/sub%20dir/model.safetensors"
        );
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/x/config.json")),
            PathBuf::from("/x/config.json.part")
        );
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(safe_relative_path("config.json").is_ok());
        assert!(safe_relative_path("tokenizer/vocab.txt").is_ok());
        assert!(safe_relative_path("../escape").is_err());
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("").is_err());
    }

    #[test]
    fn test_next_page_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://huggingface.co/api/models/org/m/tree/main?recursive=true&cursor=abc>; rel=\"next\"",
            ),
        );
        assert_eq!(
            next_page_link(&headers).as_deref(),
            Some("https://huggingface.co/api/models/org/m/tree/main?recursive=true&cursor=abc")
        );

        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_static("<https://x/prev>; rel=\"prev\""));
        assert!(next_page_link(&headers).is_none());
        assert!(next_page_link(&HeaderMap::new()).is_none());
    }
}

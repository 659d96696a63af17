//! Hub API request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Entry from `GET /api/models/{repo}/tree/main`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub lfs: Option<TreeLfsInfo>,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "file"
    }

    /// Size of the file content, preferring the LFS object size.
    pub fn content_size(&self) -> Option<u64> {
        self.lfs.as_ref().map(|l| l.size).or(self.size)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeLfsInfo {
    pub size: u64,
}

/// Account returned by `GET /api/whoami-v2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubUser {
    pub name: String,
    #[serde(default)]
    pub orgs: Vec<HubOrg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubOrg {
    pub name: String,
}

/// Error body most hub endpoints return on failure.
#[derive(Debug, Deserialize)]
pub(crate) struct HubErrorBody {
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Repository creation
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CreateRepoRequest<'a> {
    #[serde(rename = "type")]
    pub repo_type: &'a str,
    pub name: &'a str,
    pub organization: &'a str,
    pub private: bool,
}

// ---------------------------------------------------------------------------
// Preupload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct PreuploadRequest<'a> {
    pub files: Vec<PreuploadFile<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreuploadFile<'a> {
    pub path: &'a str,
    pub size: u64,
    /// Base64 of the first bytes of the file.
    pub sample: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreuploadResponse {
    pub files: Vec<PreuploadVerdict>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PreuploadVerdict {
    pub path: String,
    pub upload_mode: UploadMode,
    #[serde(default)]
    pub should_ignore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UploadMode {
    Lfs,
    Regular,
}

// ---------------------------------------------------------------------------
// Git LFS batch API
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct LfsBatchRequest<'a> {
    pub operation: &'a str,
    pub transfers: &'a [&'a str],
    pub objects: Vec<LfsObjectId<'a>>,
    pub hash_algo: &'a str,
    #[serde(rename = "ref")]
    pub git_ref: LfsRef<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LfsRef<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LfsObjectId<'a> {
    pub oid: &'a str,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsBatchResponse {
    #[serde(default)]
    pub transfer: Option<String>,
    pub objects: Vec<LfsBatchObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsBatchObject {
    pub oid: String,
    #[serde(default)]
    pub actions: Option<LfsActions>,
    #[serde(default)]
    pub error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsObjectError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LfsActions {
    #[serde(default)]
    pub upload: Option<LfsAction>,
    #[serde(default)]
    pub verify: Option<LfsAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LfsAction {
    pub href: String,
    /// Extra request headers; for multipart transfers also `chunk_size` and
    /// one presigned URL per numbered part.
    #[serde(default)]
    pub header: BTreeMap<String, String>,
}

impl LfsAction {
    /// Part URLs ordered by part number, when this is a multipart action.
    pub fn multipart_urls(&self) -> Vec<(u32, String)> {
        let mut parts: Vec<(u32, String)> = self
            .header
            .iter()
            .filter_map(|(k, v)| k.parse::<u32>().ok().map(|n| (n, v.clone())))
            .collect();
        parts.sort_by_key(|(n, _)| *n);
        parts
    }

    pub fn chunk_size(&self) -> Option<u64> {
        self.header.get("chunk_size").and_then(|v| v.parse().ok())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LfsVerifyRequest<'a> {
    pub oid: &'a str,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct MultipartCompletion<'a> {
    pub oid: &'a str,
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

// ---------------------------------------------------------------------------
// Commit (NDJSON)
// ---------------------------------------------------------------------------

/// One line of a commit payload.
#[derive(Debug, Serialize)]
#[serde(tag = "key", content = "value")]
pub(crate) enum CommitLine<'a> {
    #[serde(rename = "header")]
    Header { summary: &'a str, description: &'a str },
    #[serde(rename = "file")]
    File {
        content: String,
        path: &'a str,
        encoding: &'a str,
    },
    #[serde(rename = "lfsFile")]
    LfsFile {
        path: &'a str,
        algo: &'a str,
        oid: &'a str,
    },
}

//! Dataset hub download
//!
//! Fetches one file from a Hugging Face style hub repository into a local
//! directory, preserving the file's path inside the repository.
//!
//! # Example
//!
//! ```no_run
//! use r2_uplink::config::HubConfig;
//! use r2_uplink::hub::{FileRequest, HubClient, RepoType};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HubClient::new(&HubConfig::default())?;
//! let request = FileRequest::new(
//!     "ibrahimhamamci/CT-RATE",
//!     "dataset/train/train_53/train_53_a/train_53_a_1.nii.gz",
//!     RepoType::Dataset,
//! );
//! let path = client.download(&request, Path::new(".")).await?;
//! println!("Downloaded to: {}", path.display());
//! # Ok(())
//! # }
//! ```

use crate::config::HubConfig;
use crate::metrics;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

mod partial;

pub use partial::PartialDownload;

/// Characters escaped inside a single URL path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Hub download errors
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required for {url} (HTTP {status}); log in or set HF_TOKEN")]
    Unauthorized { url: String, status: u16 },

    #[error("File not found: {url}")]
    NotFound { url: String },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of hub repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RepoType {
    #[default]
    Dataset,
    Model,
    Space,
}

impl RepoType {
    fn url_prefix(&self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets/",
            RepoType::Model => "",
            RepoType::Space => "spaces/",
        }
    }
}

/// One file to fetch
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub repo_id: String,
    pub filename: String,
    pub repo_type: RepoType,
    pub revision: String,
}

impl FileRequest {
    pub fn new(repo_id: impl Into<String>, filename: impl Into<String>, repo_type: RepoType) -> Self {
        Self {
            repo_id: repo_id.into(),
            filename: filename.into(),
            repo_type,
            revision: "main".to_string(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Repository-relative path as a local relative path, refusing anything
    /// that would escape the download directory
    fn relative_path(&self) -> Result<PathBuf, HubError> {
        let path = Path::new(&self.filename);
        let safe = !self.filename.is_empty()
            && path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(HubError::InvalidRequest(format!(
                "filename '{}' must be a relative path inside the repository",
                self.filename
            )));
        }
        Ok(path.to_path_buf())
    }
}

/// Dataset hub client
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("r2-uplink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token().map(str::to_string),
        })
    }

    /// Resolve URL of a file at a revision
    pub fn file_url(&self, request: &FileRequest) -> Result<String, HubError> {
        let repo_id = request.repo_id.trim();
        if repo_id.is_empty() || repo_id.split('/').any(str::is_empty) {
            return Err(HubError::InvalidRequest(format!(
                "invalid repository id '{}'",
                request.repo_id
            )));
        }
        if request.revision.trim().is_empty() {
            return Err(HubError::InvalidRequest("revision is empty".into()));
        }
        request.relative_path()?;

        let repo: Vec<String> = repo_id
            .split('/')
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        let filename: Vec<String> = request
            .filename
            .split('/')
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();

        Ok(format!(
            "{}/{}{}/resolve/{}/{}",
            self.endpoint,
            request.repo_type.url_prefix(),
            repo.join("/"),
            utf8_percent_encode(&request.revision, SEGMENT),
            filename.join("/")
        ))
    }

    /// Download the file into `local_dir`, returning the written path
    #[tracing::instrument(
        name = "hub.download",
        skip(self, request),
        fields(
            hub.repo = %request.repo_id,
            hub.file = %request.filename,
            download.bytes = tracing::field::Empty
        ),
        err
    )]
    pub async fn download(
        &self,
        request: &FileRequest,
        local_dir: &Path,
    ) -> Result<PathBuf, HubError> {
        let url = self.file_url(request)?;
        let target = local_dir.join(request.relative_path()?);

        let result = self.fetch_to(&url, &target).await;
        match &result {
            Ok(bytes) => {
                metrics::record_hub_download(true, *bytes);
                tracing::Span::current().record("download.bytes", *bytes);
                tracing::info!(path = %target.display(), bytes, "Download complete");
            }
            Err(_) => metrics::record_hub_download(false, 0),
        }
        result.map(|_| target)
    }

    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, HubError> {
        let mut builder = self.http.get(url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let mut response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let url = url.to_string();
            return Err(match status.as_u16() {
                401 | 403 => HubError::Unauthorized {
                    url,
                    status: status.as_u16(),
                },
                404 => HubError::NotFound { url },
                code => HubError::Status { url, status: code },
            });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut partial = PartialDownload::create(target).await?;
        while let Some(chunk) = response.chunk().await? {
            partial.write(&chunk).await?;
        }

        if let Some(expected) = response.content_length() {
            if expected != partial.written() {
                tracing::warn!(
                    expected,
                    received = partial.written(),
                    "Content-Length mismatch"
                );
            }
        }

        Ok(partial.persist(target).await?)
    }
}

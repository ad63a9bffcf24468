//! Public URL probe
//!
//! Checks whether an uploaded object is reachable through its public URL
//! (e.g. an `r2.dev` development URL) and whether CORS headers are present
//! for browser access.

use reqwest::header::{HeaderName, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;

/// What a probe found
#[derive(Debug, Clone, Serialize)]
pub struct UrlProbe {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub cors_allow_origin: Option<String>,
}

/// Interpretation of a probe's status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    Accessible,
    AccessDenied,
    NotFound,
    Unexpected(u16),
}

impl UrlProbe {
    pub fn verdict(&self) -> ProbeVerdict {
        match self.status {
            200 => ProbeVerdict::Accessible,
            403 => ProbeVerdict::AccessDenied,
            404 => ProbeVerdict::NotFound,
            other => ProbeVerdict::Unexpected(other),
        }
    }
}

impl ProbeVerdict {
    /// Troubleshooting text shown by the CLI
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ProbeVerdict::Accessible => None,
            ProbeVerdict::AccessDenied => Some(
                "Access denied. Usually one of:\n\
                 1. The bucket's public development URL is not enabled\n\
                 2. The object is not publicly accessible\n\
                 3. The URL is wrong",
            ),
            ProbeVerdict::NotFound => Some(
                "Not found. Check:\n\
                 1. The object path in the URL\n\
                 2. That the upload finished successfully\n\
                 3. That the bucket in the URL is the one you uploaded to",
            ),
            ProbeVerdict::Unexpected(_) => None,
        }
    }
}

/// GET `url` and report status, content headers and CORS
///
/// The body is not downloaded.
#[tracing::instrument(name = "diagnostics.probe_url", skip(client), err)]
pub async fn probe_url(client: &reqwest::Client, url: &str) -> Result<UrlProbe, reqwest::Error> {
    let response = client.get(url).send().await?;
    let headers = response.headers();

    let header_str = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Ok(UrlProbe {
        url: url.to_string(),
        status: response.status().as_u16(),
        content_type: header_str(CONTENT_TYPE),
        content_length: header_str(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
        cors_allow_origin: header_str(ACCESS_CONTROL_ALLOW_ORIGIN),
    })
}

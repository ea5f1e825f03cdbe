//! Hierarchical-namespace data lake client.
//!
//! Path-addressed file operations against the storage account's filesystem
//! REST surface. Writes go through the store's own three-step protocol -
//! create the file, append the bytes at position 0, flush at the final
//! length - and reads/lists are single GETs. All operations carry the
//! caller's bearer token.

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::credentials::AccessToken;
use crate::errors::{Error, Result};

/// Storage REST version sent with every request.
const X_MS_VERSION: &str = "2023-11-03";

/// A parsed `abfss://filesystem@account.host/path` address.
///
/// The URI scheme puts the filesystem (container) before the `@` and the
/// account's DFS endpoint host after it; the remainder is the file path
/// inside the filesystem. `abfss` maps to HTTPS; the legacy `abfs` scheme
/// maps to plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLakePath {
    pub filesystem: String,
    pub host: String,
    pub path: String,
    pub secure: bool,
}

impl DataLakePath {
    pub fn parse(uri: &str) -> Result<Self> {
        let (rest, secure) = if let Some(rest) = uri.strip_prefix("abfss://") {
            (rest, true)
        } else if let Some(rest) = uri.strip_prefix("abfs://") {
            (rest, false)
        } else {
            return Err(Error::config(format!(
                "storage path {uri:?} must use the abfss:// (or abfs://) scheme"
            )));
        };

        let (filesystem, location) = rest
            .split_once('@')
            .ok_or_else(|| Error::config(format!("storage path {uri:?} is missing the filesystem@host separator")))?;

        let (host, path) = match location.split_once('/') {
            Some((host, path)) => (host, path),
            None => (location, ""),
        };

        if filesystem.is_empty() || host.is_empty() {
            return Err(Error::config(format!("storage path {uri:?} has an empty filesystem or host")));
        }

        Ok(Self {
            filesystem: filesystem.to_string(),
            host: host.to_string(),
            path: path.trim_start_matches('/').to_string(),
            secure,
        })
    }

    fn http_scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// URL of the file itself.
    fn file_url(&self) -> String {
        format!("{}://{}/{}/{}", self.http_scheme(), self.host, self.filesystem, self.path)
    }

    /// URL of the containing filesystem.
    fn filesystem_url(&self) -> String {
        format!("{}://{}/{}", self.http_scheme(), self.host, self.filesystem)
    }
}

impl std::fmt::Display for DataLakePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = if self.secure { "abfss" } else { "abfs" };
        write!(f, "{}://{}@{}/{}", scheme, self.filesystem, self.host, self.path)
    }
}

/// One entry in a filesystem listing. The service reports lengths and flags
/// as strings; they are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEntry {
    pub name: String,
    #[serde(rename = "contentLength", default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<String>,
    #[serde(rename = "isDirectory", default, skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<String>,
    #[serde(rename = "lastModified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    paths: Vec<PathEntry>,
}

/// Client for a data lake storage account.
pub struct DataLakeClient {
    http: Client,
}

impl DataLakeClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: super::http_client(request_timeout)?,
        })
    }

    /// Create (or overwrite) the file, append `data` at position 0, and
    /// flush. Overwriting an existing probe file is the intended side
    /// effect, not an error.
    #[instrument(skip(self, token, data), fields(path = %path))]
    pub async fn write(&self, token: &AccessToken, path: &DataLakePath, data: Bytes) -> Result<()> {
        let url = path.file_url();

        let response = self
            .http
            .put(&url)
            .query(&[("resource", "file")])
            .header("x-ms-version", X_MS_VERSION)
            .bearer_auth(&token.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        let length = data.len();
        let response = self
            .http
            .patch(&url)
            .query(&[("action", "append"), ("position", "0")])
            .header("x-ms-version", X_MS_VERSION)
            .bearer_auth(&token.token)
            .body(data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        let position = length.to_string();
        let response = self
            .http
            .patch(&url)
            .query(&[("action", "flush"), ("position", position.as_str())])
            .header("x-ms-version", X_MS_VERSION)
            .bearer_auth(&token.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        Ok(())
    }

    /// Read the file's content.
    #[instrument(skip(self, token), fields(path = %path))]
    pub async fn read(&self, token: &AccessToken, path: &DataLakePath) -> Result<Bytes> {
        let response = self
            .http
            .get(path.file_url())
            .header("x-ms-version", X_MS_VERSION)
            .bearer_auth(&token.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                resource: "data lake path",
                name: path.to_string(),
            }),
            status if status.is_success() => Ok(response.bytes().await?),
            _ => Err(unexpected(response).await),
        }
    }

    /// List the filesystem root (non-recursive), the `ls` step of the
    /// write-then-read-back sequence.
    #[instrument(skip(self, token), fields(filesystem = %path.filesystem))]
    pub async fn list(&self, token: &AccessToken, path: &DataLakePath) -> Result<Vec<PathEntry>> {
        let response = self
            .http
            .get(path.filesystem_url())
            .query(&[("resource", "filesystem"), ("recursive", "false")])
            .header("x-ms-version", X_MS_VERSION)
            .bearer_auth(&token.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }

        let body = response.text().await?;
        let listing: ListResponse = serde_json::from_str(&body).map_err(|source| Error::Decode {
            what: "filesystem listing",
            source,
        })?;
        Ok(listing.paths)
    }
}

async fn unexpected(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::UnexpectedStatus {
        service: "data lake",
        status,
        body,
    }
}

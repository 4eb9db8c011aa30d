//! Dropbox provider (HTTP API v2)
//!
//! Connection string: `dropbox://dropbox.com?access_token={token}`. When the
//! token is not in the connection string, `DROPBOX_ACCESS_TOKEN` is used.

use super::{
    http_client, BackupRecord, ConnectionError, ProviderConfig, StorageError, StorageProvider,
};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

pub const PROVIDER_NAME: &str = "dropbox";

const PLACEHOLDER_TOKEN: &str = "YOUR_TOKEN_HERE_REPLACE_ME";
const API_URL: &str = "https://api.dropboxapi.com/2";
const CONTENT_URL: &str = "https://content.dropboxapi.com/2";

pub struct DropboxProvider {
    client: Client,
    access_token: String,
}

pub(crate) fn construct(
    config: &ProviderConfig,
) -> Result<Box<dyn StorageProvider>, ConnectionError> {
    Ok(Box::new(DropboxProvider::from_config(config)?))
}

/// Outcome of a Dropbox API call that reached the server
enum ApiOutcome {
    Success(Response),
    Failed { status: u16, summary: String },
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<ListEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(rename = ".tag")]
    tag: String,
    #[serde(default)]
    path_display: Option<String>,
    #[serde(default)]
    path_lower: Option<String>,
    #[serde(default)]
    server_modified: Option<String>,
}

impl DropboxProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConnectionError> {
        let descriptor = config.descriptor()?;

        if descriptor.scheme() != PROVIDER_NAME {
            return Err(ConnectionError::WrongScheme {
                expected: PROVIDER_NAME,
            });
        }

        let host = descriptor.host().unwrap_or_default().to_lowercase();
        let valid_host = host == "dropbox.com"
            || host.ends_with(".dropbox.com")
            || host.ends_with(".dropboxapi.com");
        if !valid_host {
            return Err(ConnectionError::InvalidHost {
                provider: PROVIDER_NAME,
                host,
                reason: "expected dropbox.com",
            });
        }
        if !descriptor.path_segments().is_empty() {
            return Err(ConnectionError::Invalid(
                "Dropbox connection strings take no path; set BACKUP_DIR instead".to_string(),
            ));
        }

        let access_token = descriptor
            .query_param("access_token")
            .or_else(|| config.access_token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && t != PLACEHOLDER_TOKEN)
            .ok_or_else(|| {
                ConnectionError::Invalid("DROPBOX_ACCESS_TOKEN not configured".to_string())
            })?;

        Ok(Self {
            client: http_client(PROVIDER_NAME, config.timeout)?,
            access_token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    fn execute(&self, request: RequestBuilder) -> Result<ApiOutcome, StorageError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|source| StorageError::Transport {
                provider: PROVIDER_NAME,
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(ApiOutcome::Success(response));
        }

        let body = response.text().unwrap_or_default();
        let summary = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error_summary)
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(body);

        Ok(ApiOutcome::Failed {
            status: status.as_u16(),
            summary,
        })
    }

    fn rpc(&self, endpoint: &str, body: serde_json::Value) -> Result<ApiOutcome, StorageError> {
        let request = self
            .client
            .post(format!("{}/{}", API_URL, endpoint))
            .json(&body);
        self.execute(request)
    }

    fn list_page(&self, result: ListFolderResult, records: &mut Vec<BackupRecord>) -> Result<Option<String>, StorageError> {
        for entry in result.entries {
            if entry.tag != "file" {
                continue;
            }
            let path = match entry.path_display.or(entry.path_lower) {
                Some(path) => path,
                None => continue,
            };
            let raw = entry.server_modified.unwrap_or_default();
            let modified = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| StorageError::InvalidResponse {
                    provider: PROVIDER_NAME,
                    message: format!("bad server_modified '{}' for {}: {}", raw, path, e),
                })?
                .with_timezone(&Utc);
            records.push(BackupRecord::new(path, modified));
        }

        Ok(if result.has_more {
            Some(result.cursor)
        } else {
            None
        })
    }
}

/// Dropbox paths start with '/' and have no trailing slash; the root is ""
fn dropbox_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// JSON for the Dropbox-API-Arg header, which must be pure ASCII
fn api_arg_header(value: &serde_json::Value) -> String {
    let mut out = String::new();
    for c in value.to_string().chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

fn classify_error(status: u16, summary: String) -> StorageError {
    if summary.contains("insufficient_space") {
        return StorageError::InsufficientSpace {
            provider: PROVIDER_NAME,
            message: summary,
        };
    }
    StorageError::Http {
        provider: PROVIDER_NAME,
        status,
        message: summary,
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    response.json::<T>().map_err(|e| StorageError::InvalidResponse {
        provider: PROVIDER_NAME,
        message: e.to_string(),
    })
}

impl StorageProvider for DropboxProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), StorageError> {
        let path = dropbox_path(remote_path);
        let arg = json!({
            "path": path,
            "mode": "overwrite",
            "autorename": false,
            "mute": true,
        });

        let request = self
            .client
            .post(format!("{}/files/upload", CONTENT_URL))
            .header("Dropbox-API-Arg", api_arg_header(&arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(contents.to_vec());

        match self.execute(request) {
            Ok(ApiOutcome::Success(_)) => {
                debug!("Uploaded {} bytes to dropbox {}", contents.len(), path);
                Ok(())
            }
            Ok(ApiOutcome::Failed { status, summary }) => {
                let err = classify_error(status, summary);
                warn!("Dropbox upload error for {}: {}", path, err);
                Err(err)
            }
            Err(e) => {
                warn!("Dropbox upload error for {}: {}", path, e);
                Err(e)
            }
        }
    }

    fn list_backups(&self, prefix: &str) -> Result<Vec<BackupRecord>, StorageError> {
        let folder = dropbox_path(prefix);
        let mut records = Vec::new();

        let mut outcome = self.rpc(
            "files/list_folder",
            json!({ "path": folder, "recursive": false }),
        )?;

        loop {
            let response = match outcome {
                ApiOutcome::Success(response) => response,
                ApiOutcome::Failed { summary, .. } if summary.contains("not_found") => {
                    debug!("Dropbox folder {} does not exist yet", folder);
                    return Ok(records);
                }
                ApiOutcome::Failed { status, summary } => {
                    let err = classify_error(status, summary);
                    warn!("Dropbox list error for {}: {}", folder, err);
                    return Err(err);
                }
            };

            let page: ListFolderResult = decode_json(response)?;
            match self.list_page(page, &mut records)? {
                Some(cursor) => {
                    outcome = self.rpc("files/list_folder/continue", json!({ "cursor": cursor }))?;
                }
                None => return Ok(records),
            }
        }
    }

    fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        let path = dropbox_path(remote_path);
        match self.rpc("files/delete_v2", json!({ "path": path }))? {
            ApiOutcome::Success(_) => Ok(()),
            ApiOutcome::Failed { summary, .. } if summary.starts_with("path_lookup/not_found") => {
                debug!("File {} not found for deletion", path);
                Ok(())
            }
            ApiOutcome::Failed { status, summary } => {
                let err = classify_error(status, summary);
                warn!("Dropbox delete error for {}: {}", path, err);
                Err(err)
            }
        }
    }

    fn create_directory(&self, dir_path: &str) -> Result<(), StorageError> {
        let path = dropbox_path(dir_path);
        if path.is_empty() {
            return Ok(());
        }

        match self.rpc(
            "files/create_folder_v2",
            json!({ "path": path, "autorename": false }),
        )? {
            ApiOutcome::Success(_) => {
                debug!("Created Dropbox folder: {}", path);
                Ok(())
            }
            ApiOutcome::Failed { summary, .. } if summary.starts_with("path/conflict") => Ok(()),
            ApiOutcome::Failed { status, summary } => {
                let err = classify_error(status, summary);
                warn!("Dropbox create folder error for {}: {}", path, err);
                Err(err)
            }
        }
    }
}

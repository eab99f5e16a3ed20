//! Cloudinary asset host client
//!
//! Folder listings use the Admin API with HTTP basic auth. Uploads use the signed Upload API:
//! parameters are sorted, joined as `k=v&k=v`, suffixed with the API secret and hashed with
//! SHA-256 (the account must have SHA-256 signatures enabled).

use crate::traits::{AssetHost, AssetUploadOptions, Page, RemoteAsset, StorageError, StorageResult};
use async_trait::async_trait;
use imgpress_core::{AssetHostCredentials, FolderEntry};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const FOLDER_PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
struct FolderListResponse {
    #[serde(default)]
    folders: Vec<FolderEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    credentials: AssetHostCredentials,
}

impl CloudinaryClient {
    pub fn new(credentials: AssetHostCredentials, timeout: Duration) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, credentials })
    }

    fn api_url(&self, suffix: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.credentials.api_base.trim_end_matches('/'),
            self.credentials.cloud_name,
            suffix
        )
    }

    async fn list_folders(
        &self,
        url: String,
        cursor: Option<String>,
    ) -> StorageResult<Page<FolderEntry>> {
        let start = std::time::Instant::now();

        let mut query = vec![("max_results", FOLDER_PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor));
        }

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url));
        }
        if !status.is_success() {
            let message = error_message(response).await;
            tracing::error!(status = %status, error = %message, "Cloudinary folder listing failed");
            return Err(StorageError::BackendError(format!(
                "Folder listing returned {}: {}",
                status, message
            )));
        }

        let body: FolderListResponse = response.json().await?;

        tracing::debug!(
            count = body.folders.len(),
            has_more = body.next_cursor.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary folder page fetched"
        );

        Ok(Page {
            items: body.folders,
            next_cursor: body.next_cursor,
        })
    }
}

#[async_trait]
impl AssetHost for CloudinaryClient {
    async fn root_folders(&self, cursor: Option<String>) -> StorageResult<Page<FolderEntry>> {
        self.list_folders(self.api_url("folders"), cursor).await
    }

    async fn sub_folders(
        &self,
        path: &str,
        cursor: Option<String>,
    ) -> StorageResult<Page<FolderEntry>> {
        let encoded = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        self.list_folders(self.api_url(&format!("folders/{}", encoded)), cursor)
            .await
    }

    async fn upload(
        &self,
        local_path: &Path,
        options: &AssetUploadOptions,
    ) -> StorageResult<RemoteAsset> {
        let start = std::time::Instant::now();

        let data = tokio::fs::read(local_path).await?;
        let size = data.len();
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.jpg")
            .to_string();

        let mut params = BTreeMap::new();
        if !options.folder.is_empty() {
            params.insert("folder", options.folder.clone());
        }
        if let Some(public_id) = &options.public_id {
            params.insert("public_id", public_id.clone());
        }
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        params.insert("unique_filename", options.unique_filename.to_string());
        params.insert("use_filename", options.use_filename.to_string());

        let signature = sign_params(&params, &self.credentials.api_secret);

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.credentials.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .http
            .post(self.api_url("image/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %local_path.display(), "Cloudinary upload request failed");
                StorageError::UploadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            tracing::error!(
                status = %status,
                error = %message,
                folder = %options.folder,
                "Cloudinary upload rejected"
            );
            return Err(StorageError::UploadFailed(format!("{}: {}", status, message)));
        }

        let body: UploadResponse = response.json().await?;

        tracing::info!(
            public_id = %body.public_id,
            folder = %options.folder,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary upload successful"
        );

        Ok(RemoteAsset {
            public_id: body.public_id,
            secure_url: body.secure_url,
        })
    }
}

/// Signature of an Upload API call over the already sorted parameters
pub(crate) fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let payload = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text)
}

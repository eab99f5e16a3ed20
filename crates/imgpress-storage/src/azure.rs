//! Azure Blob Storage client
//!
//! Talks to the Blob service REST API with Shared Key authorization derived from a storage
//! account connection string. Listing responses are XML; only `<Name>` and `<NextMarker>` are
//! read from them.

use crate::traits::{BlobStore, Page, StorageError, StorageResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use imgpress_core::AccessTier;
use regex::Regex;
use reqwest::{Method, StatusCode, Url};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

const API_VERSION: &str = "2021-08-06";

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Name>([^<]*)</Name>").expect("valid name regex"));
static NEXT_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<NextMarker>([^<]+)</NextMarker>").expect("valid marker regex")
});

/// Parsed storage account connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let mut fields = BTreeMap::new();
        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                StorageError::ConfigError(format!("Malformed connection string segment: {}", pair))
            })?;
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }

        let account_name = fields
            .get("AccountName")
            .cloned()
            .ok_or_else(|| StorageError::ConfigError("Connection string has no AccountName".to_string()))?;
        let account_key = fields
            .get("AccountKey")
            .cloned()
            .ok_or_else(|| StorageError::ConfigError("Connection string has no AccountKey".to_string()))?;

        let blob_endpoint = match fields.get("BlobEndpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let protocol = fields
                    .get("DefaultEndpointsProtocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = fields
                    .get("EndpointSuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{}://{}.blob.{}", protocol, account_name, suffix)
            }
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

#[derive(Clone)]
pub struct AzureBlobClient {
    http: reqwest::Client,
    account_name: String,
    key: Vec<u8>,
    endpoint: String,
}

impl AzureBlobClient {
    pub fn from_connection_string(raw: &str, timeout: Duration) -> StorageResult<Self> {
        let conn = ConnectionString::parse(raw)?;
        let key = STANDARD
            .decode(conn.account_key.as_bytes())
            .map_err(|e| StorageError::ConfigError(format!("AccountKey is not valid base64: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            account_name: conn.account_name,
            key,
            endpoint: conn.blob_endpoint,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> StorageResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.endpoint, path))
            .map_err(|e| StorageError::ConfigError(format!("Invalid blob URL: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        ms_headers: Vec<(&str, String)>,
        body: Option<(Vec<u8>, &str)>,
    ) -> StorageResult<reqwest::Response> {
        let mut headers: BTreeMap<String, String> = ms_headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        headers.insert(
            "x-ms-date".to_string(),
            chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        );
        headers.insert("x-ms-version".to_string(), API_VERSION.to_string());

        let (content_length, content_type) = match &body {
            Some((data, content_type)) => (data.len(), *content_type),
            None => (0, ""),
        };

        let to_sign = string_to_sign(
            method.as_str(),
            content_length,
            content_type,
            &headers,
            &self.account_name,
            &url,
        );
        let authorization = format!("SharedKey {}:{}", self.account_name, sign(&self.key, &to_sign)?);
        let is_put = method == Method::PUT;

        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", authorization);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match body {
            Some((data, content_type)) => request.header("Content-Type", content_type).body(data),
            None if is_put => request.body(Vec::new()),
            None => request,
        };

        Ok(request.send().await?)
    }

    async fn list_names(&self, url: Url, what: &str) -> StorageResult<Page<String>> {
        let start = std::time::Instant::now();
        let response = self.send(Method::GET, url, Vec::new(), None).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, what = %what, "Azure listing failed");
            return Err(StorageError::BackendError(format!(
                "Listing {} returned {}: {}",
                what,
                status,
                error_code(&body)
            )));
        }

        let body = response.text().await?;
        let page = parse_name_page(&body);

        tracing::debug!(
            what = %what,
            count = page.items.len(),
            has_more = page.next_cursor.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure listing page fetched"
        );

        Ok(page)
    }
}

#[async_trait]
impl BlobStore for AzureBlobClient {
    async fn list_containers(&self, marker: Option<String>) -> StorageResult<Page<String>> {
        let mut query = vec![("comp", "list")];
        if let Some(marker) = marker.as_deref() {
            query.push(("marker", marker));
        }
        let url = self.url("", &query)?;
        self.list_names(url, "containers").await
    }

    async fn create_container(&self, container: &str) -> StorageResult<bool> {
        let url = self.url(&encode_path(container), &[("restype", "container")])?;
        let response = self.send(Method::PUT, url, Vec::new(), None).await?;

        match response.status() {
            StatusCode::CREATED => {
                tracing::info!(container = %container, "Azure container created");
                Ok(true)
            }
            StatusCode::CONFLICT => {
                tracing::debug!(container = %container, "Azure container already exists");
                Ok(false)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, container = %container, "Azure container creation failed");
                Err(StorageError::BackendError(format!(
                    "Create container {} returned {}: {}",
                    container,
                    status,
                    error_code(&body)
                )))
            }
        }
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob_name: &str,
        local_path: &Path,
        content_type: &str,
    ) -> StorageResult<String> {
        let start = std::time::Instant::now();
        let data = tokio::fs::read(local_path).await?;
        let size = data.len();

        let url = self.url(
            &format!("{}/{}", encode_path(container), encode_path(blob_name)),
            &[],
        )?;
        let response = self
            .send(
                Method::PUT,
                url,
                vec![("x-ms-blob-type", "BlockBlob".to_string())],
                Some((data, content_type)),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, container = %container, blob = %blob_name, "Azure upload request failed");
                StorageError::UploadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, container = %container, blob = %blob_name, "Azure upload rejected");
            return Err(StorageError::UploadFailed(format!(
                "{}: {}",
                status,
                error_code(&body)
            )));
        }

        let request_id = response
            .headers()
            .get("x-ms-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        tracing::info!(
            container = %container,
            blob = %blob_name,
            request_id = %request_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure blob upload successful"
        );

        Ok(self.blob_url(container, blob_name))
    }

    async fn list_blobs(
        &self,
        container: &str,
        marker: Option<String>,
    ) -> StorageResult<Page<String>> {
        let mut query = vec![("restype", "container"), ("comp", "list")];
        if let Some(marker) = marker.as_deref() {
            query.push(("marker", marker));
        }
        let url = self.url(&encode_path(container), &query)?;
        self.list_names(url, container).await
    }

    async fn set_access_tier(
        &self,
        container: &str,
        blob_name: &str,
        tier: AccessTier,
    ) -> StorageResult<()> {
        let url = self.url(
            &format!("{}/{}", encode_path(container), encode_path(blob_name)),
            &[("comp", "tier")],
        )?;
        let response = self
            .send(
                Method::PUT,
                url,
                vec![("x-ms-access-tier", tier.as_str().to_string())],
                None,
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(container = %container, blob = %blob_name, tier = %tier, "Azure access tier set");
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(StorageError::NotFound(format!("{}/{}", container, blob_name)))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::BackendError(format!(
                "Set tier on {}/{} returned {}: {}",
                container,
                blob_name,
                status,
                error_code(&body)
            )))
        }
    }

    fn blob_url(&self, container: &str, blob_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            encode_path(container),
            encode_path(blob_name)
        )
    }
}

/// Shared Key string-to-sign for the Blob service
pub(crate) fn string_to_sign(
    method: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &BTreeMap<String, String>,
    account_name: &str,
    url: &Url,
) -> String {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    // Content-Encoding, Content-Language, Content-Length, Content-MD5, Content-Type, Date,
    // If-Modified-Since, If-Match, If-None-Match, If-Unmodified-Since, Range
    let standard = ["", "", length.as_str(), "", content_type, "", "", "", "", "", ""];

    let mut out = String::new();
    out.push_str(method);
    out.push('\n');
    for value in standard {
        out.push_str(value);
        out.push('\n');
    }

    for (name, value) in ms_headers.iter().filter(|(name, _)| name.starts_with("x-ms-")) {
        out.push_str(name);
        out.push(':');
        out.push_str(value.trim());
        out.push('\n');
    }

    out.push('/');
    out.push_str(account_name);
    out.push_str(url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push('\n');
        out.push_str(&name);
        out.push(':');
        out.push_str(&values.join(","));
    }

    out
}

fn sign(key: &[u8], to_sign: &str) -> StorageResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| StorageError::ConfigError(format!("Invalid account key: {}", e)))?;
    mac.update(to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn parse_name_page(xml: &str) -> Page<String> {
    let items = NAME_RE
        .captures_iter(xml)
        .map(|c| decode_entities(&c[1]))
        .collect();
    let next_cursor = NEXT_MARKER_RE
        .captures(xml)
        .map(|c| decode_entities(&c[1]));
    Page { items, next_cursor }
}

fn error_code(body: &str) -> String {
    static CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<Code>([^<]*)</Code>").expect("valid code regex"));
    CODE_RE
        .captures(body)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    // base64("secret-key")
    const KEY: &str = "c2VjcmV0LWtleQ==";

    fn client(endpoint: &str) -> AzureBlobClient {
        let conn = format!(
            "DefaultEndpointsProtocol=http;AccountName=acct;AccountKey={};BlobEndpoint={}/acct;",
            KEY, endpoint
        );
        AzureBlobClient::from_connection_string(&conn, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_connection_string_default_endpoint() {
        let conn = ConnectionString::parse(
            "DefaultEndpointsProtocol=https;AccountName=photos;AccountKey=a2V5==;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(conn.account_name, "photos");
        assert_eq!(conn.account_key, "a2V5==");
        assert_eq!(conn.blob_endpoint, "https://photos.blob.core.windows.net");
        assert!(!format!("{:?}", conn).contains("a2V5"));
    }

    #[test]
    fn test_parse_connection_string_requires_account() {
        assert!(ConnectionString::parse("AccountKey=a2V5").is_err());
        assert!(ConnectionString::parse("AccountName=x").is_err());
        assert!(ConnectionString::parse("AccountName").is_err());
    }

    #[test]
    fn test_string_to_sign_layout() {
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-version".to_string(), API_VERSION.to_string());
        headers.insert(
            "x-ms-date".to_string(),
            "Mon, 01 Jan 2024 00:00:00 GMT".to_string(),
        );
        let url = Url::parse("https://acct.blob.core.windows.net/photos?restype=container&comp=list&marker=m1")
            .unwrap();

        let to_sign = string_to_sign("GET", 0, "", &headers, "acct", &url);

        let expected = "GET\n\n\n\n\n\n\n\n\n\n\n\n\
x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
x-ms-version:2021-08-06\n\
/acct/photos\n\
comp:list\n\
marker:m1\n\
restype:container";
        assert_eq!(to_sign, expected);
    }

    #[test]
    fn test_string_to_sign_includes_length_and_type() {
        let headers = BTreeMap::new();
        let url = Url::parse("https://acct.blob.core.windows.net/photos/a.jpg").unwrap();
        let to_sign = string_to_sign("PUT", 42, "image/jpeg", &headers, "acct", &url);
        assert!(to_sign.starts_with("PUT\n\n\n42\n\nimage/jpeg\n"));
        assert!(to_sign.ends_with("/acct/photos/a.jpg"));
    }

    #[test]
    fn test_parse_name_page() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/">
  <Containers>
    <Container><Name>photos</Name><Properties><Etag>0x1</Etag></Properties></Container>
    <Container><Name>a&amp;b</Name><Properties /></Container>
  </Containers>
  <NextMarker>/acct/c3</NextMarker>
</EnumerationResults>"#;
        let page = parse_name_page(xml);
        assert_eq!(page.items, vec!["photos".to_string(), "a&b".to_string()]);
        assert_eq!(page.next_cursor.as_deref(), Some("/acct/c3"));

        let last = parse_name_page("<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>");
        assert!(last.items.is_empty());
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_create_container_conflict_means_exists() {
        let mut server = mockito::Server::new_async().await;
        let created = server
            .mock("PUT", "/acct/fresh")
            .match_query(Matcher::UrlEncoded("restype".into(), "container".into()))
            .match_header("authorization", Matcher::Regex("^SharedKey acct:".to_string()))
            .match_header("x-ms-version", API_VERSION)
            .with_status(201)
            .create_async()
            .await;
        let existing = server
            .mock("PUT", "/acct/photos")
            .match_query(Matcher::UrlEncoded("restype".into(), "container".into()))
            .with_status(409)
            .with_body("<Error><Code>ContainerAlreadyExists</Code></Error>")
            .create_async()
            .await;

        let client = client(&server.url());
        assert!(client.create_container("fresh").await.unwrap());
        assert!(!client.create_container("photos").await.unwrap());

        created.assert_async().await;
        existing.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_blob_sends_block_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.jpg");
        tokio::fs::write(&path, b"jpeg-bytes").await.unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/acct/photos/a.jpg")
            .match_header("x-ms-blob-type", "BlockBlob")
            .match_header("content-type", "image/jpeg")
            .match_body("jpeg-bytes")
            .with_status(201)
            .with_header("x-ms-request-id", "req-1")
            .create_async()
            .await;

        let client = client(&server.url());
        let url = client
            .upload_blob("photos", "a.jpg", &path, "image/jpeg")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(url, format!("{}/acct/photos/a.jpg", server.url()));
    }

    #[tokio::test]
    async fn test_list_blobs_and_set_tier() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/acct/photos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("restype".into(), "container".into()),
                Matcher::UrlEncoded("comp".into(), "list".into()),
            ]))
            .with_status(200)
            .with_body("<EnumerationResults><Blobs><Blob><Name>a.jpg</Name></Blob></Blobs><NextMarker /></EnumerationResults>")
            .create_async()
            .await;
        let tier = server
            .mock("PUT", "/acct/photos/a.jpg")
            .match_query(Matcher::UrlEncoded("comp".into(), "tier".into()))
            .match_header("x-ms-access-tier", "Cool")
            .with_status(200)
            .create_async()
            .await;

        let client = client(&server.url());
        let page = client.list_blobs("photos", None).await.unwrap();
        assert_eq!(page.items, vec!["a.jpg".to_string()]);

        client
            .set_access_tier("photos", "a.jpg", AccessTier::Cool)
            .await
            .unwrap();
        tier.assert_async().await;
    }

    #[tokio::test]
    async fn test_listing_error_surfaces_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/acct/")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("<Error><Code>AuthenticationFailed</Code></Error>")
            .create_async()
            .await;

        let client = client(&server.url());
        let err = client.list_containers(None).await.unwrap_err();
        assert!(matches!(err, StorageError::BackendError(ref msg) if msg.contains("AuthenticationFailed")));
    }
}

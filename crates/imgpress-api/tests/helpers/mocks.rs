//! In-memory backends and a counting transcoder for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use imgpress_core::{AccessTier, FolderEntry, SupportedImageType};
use imgpress_processing::{JpegTranscoder, TranscodeError, TranscodeReport, Transcoder};
use imgpress_storage::{
    AssetHost, AssetUploadOptions, BlobStore, Page, RemoteAsset, StorageError, StorageResult,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One upload received by the mock asset host
#[derive(Debug, Clone)]
pub struct HostUpload {
    pub file_name: String,
    pub options: AssetUploadOptions,
    pub is_jpeg: bool,
}

/// Asset host with a fixed folder tree that records every upload
#[derive(Default)]
pub struct MockAssetHost {
    pub tree: Vec<(String, Vec<String>)>,
    pub uploads: Mutex<Vec<HostUpload>>,
}

impl MockAssetHost {
    pub fn with_tree(tree: Vec<(&str, Vec<&str>)>) -> Self {
        Self {
            tree: tree
                .into_iter()
                .map(|(root, subs)| {
                    (
                        root.to_string(),
                        subs.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<HostUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetHost for MockAssetHost {
    async fn root_folders(&self, cursor: Option<String>) -> StorageResult<Page<FolderEntry>> {
        // One root per page
        let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let items = self
            .tree
            .get(index)
            .map(|(root, _)| vec![FolderEntry::new(root, root)])
            .unwrap_or_default();
        Ok(Page {
            items,
            next_cursor: (index + 1 < self.tree.len()).then(|| (index + 1).to_string()),
        })
    }

    async fn sub_folders(
        &self,
        path: &str,
        _cursor: Option<String>,
    ) -> StorageResult<Page<FolderEntry>> {
        let (_, subs) = self
            .tree
            .iter()
            .find(|(root, _)| root == path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        Ok(Page::last(
            subs.iter()
                .map(|s| FolderEntry::new(format!("{}/{}", path, s), s))
                .collect(),
        ))
    }

    async fn upload(
        &self,
        local_path: &Path,
        options: &AssetUploadOptions,
    ) -> StorageResult<RemoteAsset> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let name = options.public_id.clone().unwrap_or_else(|| {
            Path::new(&file_name)
                .file_stem()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        });

        self.uploads.lock().unwrap().push(HostUpload {
            file_name,
            options: options.clone(),
            is_jpeg: bytes.starts_with(&[0xFF, 0xD8]),
        });

        let public_id = if options.folder.is_empty() {
            name
        } else {
            format!("{}/{}", options.folder, name)
        };
        Ok(RemoteAsset {
            secure_url: format!("https://res.cloudinary.test/demo/image/upload/{}.jpg", public_id),
            public_id,
        })
    }
}

/// Blob store keeping containers and blob names in memory and logging every call in order
#[derive(Default)]
pub struct MockBlobStore {
    pub containers: Mutex<BTreeMap<String, Vec<String>>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockBlobStore {
    pub fn with_container(name: &str, blobs: &[&str]) -> Self {
        let store = Self::default();
        store.containers.lock().unwrap().insert(
            name.to_string(),
            blobs.iter().map(|b| b.to_string()).collect(),
        );
        store
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn list_containers(&self, _marker: Option<String>) -> StorageResult<Page<String>> {
        Ok(Page::last(
            self.containers.lock().unwrap().keys().cloned().collect(),
        ))
    }

    async fn create_container(&self, container: &str) -> StorageResult<bool> {
        self.record(format!("create:{}", container));
        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(container.to_string(), Vec::new());
        Ok(true)
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob_name: &str,
        local_path: &Path,
        content_type: &str,
    ) -> StorageResult<String> {
        assert!(local_path.exists(), "blob upload must see the transcoded file");
        self.record(format!("upload:{}/{}:{}", container, blob_name, content_type));
        self.containers
            .lock()
            .unwrap()
            .get_mut(container)
            .ok_or_else(|| StorageError::NotFound(format!("container {}", container)))?
            .push(blob_name.to_string());
        Ok(self.blob_url(container, blob_name))
    }

    async fn list_blobs(
        &self,
        container: &str,
        marker: Option<String>,
    ) -> StorageResult<Page<String>> {
        let blobs = self
            .containers
            .lock()
            .unwrap()
            .get(container)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("container {}", container)))?;
        // Two blobs per page
        let start: usize = marker.map(|m| m.parse().unwrap()).unwrap_or(0);
        let end = (start + 2).min(blobs.len());
        Ok(Page {
            items: blobs[start..end].to_vec(),
            next_cursor: (end < blobs.len()).then(|| end.to_string()),
        })
    }

    async fn set_access_tier(
        &self,
        _container: &str,
        blob_name: &str,
        tier: AccessTier,
    ) -> StorageResult<()> {
        self.record(format!("tier:{}:{}", blob_name, tier));
        Ok(())
    }

    fn blob_url(&self, container: &str, blob_name: &str) -> String {
        format!("https://acct.blob.core.test/{}/{}", container, blob_name)
    }
}

/// Real JPEG transcoder that counts its invocations
#[derive(Default)]
pub struct CountingTranscoder {
    pub calls: AtomicUsize,
}

impl CountingTranscoder {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for CountingTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        declared: SupportedImageType,
        output: &Path,
    ) -> Result<TranscodeReport, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        JpegTranscoder.transcode(input, declared, output).await
    }
}

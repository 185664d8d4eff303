//! Byte stores keyed by relative path.
//!
//! Input images are read from, and annotated images written to, a [`Folder`]. A folder
//! backed by an object store bucket exposes its [`S3Location`] so the remote API can read
//! images by reference instead of receiving the bytes inline.

use crate::table::Row;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Column holding the image path in generated input rows.
pub const PATH_COLUMN: &str = "path";

/// Extensions the remote API accepts.
pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &["jpeg", "jpg", "png", "gif", "bmp", "webp", "ico"];

/// Bucket and key prefix for folders stored in an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Prefix prepended to every relative path, without a leading slash.
    pub root_path: String,
}

impl S3Location {
    pub fn new(bucket: impl Into<String>, root_path: impl Into<String>) -> Self {
        let root: String = root_path.into();
        Self {
            bucket: bucket.into(),
            root_path: root.trim_start_matches('/').to_string(),
        }
    }

    /// Object key for a folder-relative path.
    pub fn key_for(&self, path: &str) -> String {
        format!("{}{}", self.root_path, path.trim_start_matches('/'))
    }
}

#[async_trait]
pub trait Folder: Send + Sync {
    /// Relative paths of every file, sorted.
    async fn list_paths(&self) -> Result<Vec<String>>;
    async fn download(&self, path: &str) -> Result<Bytes>;
    async fn upload(&self, path: &str, data: Bytes) -> Result<()>;
    /// Present when images can be passed to the remote API by reference.
    fn s3_location(&self) -> Option<&S3Location> {
        None
    }
    fn name(&self) -> &str;
}

/// A directory on the local file system.
pub struct LocalFolder {
    root: PathBuf,
    s3: Option<S3Location>,
}

impl LocalFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            s3: None,
        }
    }

    /// Declare that this directory mirrors a bucket prefix the remote API can read.
    pub fn with_s3_location(mut self, location: S3Location) -> Self {
        self.s3 = Some(location);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::runtime_with_context(
                format!("path escapes folder root: {}", path),
                ErrorContext::new()
                    .with_field_path(path)
                    .with_source("local_folder"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Folder for LocalFolder {
    async fn list_paths(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let rel = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    out.push(format!("/{}", rel));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let full = self.resolve(path)?;
        Ok(Bytes::from(tokio::fs::read(full).await?))
    }

    async fn upload(&self, path: &str, data: Bytes) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, &data).await?;
        Ok(())
    }

    fn s3_location(&self) -> Option<&S3Location> {
        self.s3.as_ref()
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory folder, mostly for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryFolder {
    files: Arc<RwLock<BTreeMap<String, Bytes>>>,
    s3: Option<S3Location>,
}

impl MemoryFolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_s3_location(mut self, location: S3Location) -> Self {
        self.s3 = Some(location);
        self
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(normalize(&path.into()), data.into());
        }
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.files.read().ok()?.get(&normalize(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn poisoned() -> Error {
    Error::runtime_with_context(
        "MemoryFolder poisoned",
        ErrorContext::new().with_source("memory_folder"),
    )
}

#[async_trait]
impl Folder for MemoryFolder {
    async fn list_paths(&self) -> Result<Vec<String>> {
        let files = self.files.read().map_err(|_| poisoned())?;
        Ok(files.keys().cloned().collect())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        let files = self.files.read().map_err(|_| poisoned())?;
        files.get(&normalize(path)).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file in memory folder: {}", path),
            ))
        })
    }

    async fn upload(&self, path: &str, data: Bytes) -> Result<()> {
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.insert(normalize(path), data);
        Ok(())
    }

    fn s3_location(&self) -> Option<&S3Location> {
        self.s3.as_ref()
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Whether a path has one of the given extensions (case-insensitive).
pub fn has_extension(path: &str, extensions: &[&str]) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// One input row per file with a supported extension, holding its path.
pub async fn generate_path_rows(folder: &dyn Folder, extensions: &[&str]) -> Result<Vec<Row>> {
    let paths = folder.list_paths().await?;
    let total = paths.len();
    let rows: Vec<Row> = paths
        .into_iter()
        .filter(|p| has_extension(p, extensions))
        .map(|p| {
            let mut row = Row::new();
            row.insert(PATH_COLUMN.to_string(), Value::String(p));
            row
        })
        .collect();
    if rows.len() < total {
        tracing::info!(
            skipped = total - rows.len(),
            "skipped files with unsupported extensions (supported: {})",
            extensions.join(", ")
        );
    }
    if rows.is_empty() {
        return Err(Error::configuration_with_context(
            format!("No supported files found in folder ({})", extensions.join(", ")),
            ErrorContext::new()
                .with_field_path("input_folder")
                .with_source(folder.name().to_string()),
        ));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter() {
        assert!(has_extension("/a/b.JPG", SUPPORTED_IMAGE_FORMATS));
        assert!(has_extension("x.webp", SUPPORTED_IMAGE_FORMATS));
        assert!(!has_extension("notes.txt", SUPPORTED_IMAGE_FORMATS));
        assert!(!has_extension("no_extension", SUPPORTED_IMAGE_FORMATS));
    }

    #[test]
    fn test_s3_key() {
        let loc = S3Location::new("bucket", "/images/");
        assert_eq!(loc.root_path, "images/");
        assert_eq!(loc.key_for("/cat.png"), "images/cat.png");
    }

    #[tokio::test]
    async fn test_generate_path_rows_filters_extensions() {
        let folder = MemoryFolder::new();
        folder.insert("b.png", vec![1u8]);
        folder.insert("/a.jpg", vec![2u8]);
        folder.insert("readme.md", vec![3u8]);

        let rows = generate_path_rows(&folder, SUPPORTED_IMAGE_FORMATS)
            .await
            .unwrap();
        let paths: Vec<&str> = rows
            .iter()
            .map(|r| r[PATH_COLUMN].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["/a.jpg", "/b.png"]);
    }

    #[tokio::test]
    async fn test_generate_path_rows_empty_folder_is_configuration_error() {
        let folder = MemoryFolder::new();
        let err = generate_path_rows(&folder, SUPPORTED_IMAGE_FORMATS)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_local_folder_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let folder = LocalFolder::new(dir.path());
        folder
            .upload("/nested/out.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(folder.list_paths().await.unwrap(), vec!["/nested/out.png"]);
        assert_eq!(
            folder.download("nested/out.png").await.unwrap(),
            Bytes::from_static(b"png")
        );
        assert!(folder.download("../escape").await.is_err());
    }
}

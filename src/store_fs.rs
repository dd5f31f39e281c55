//! Local-filesystem store variant.
//!
//! Walks a configured root directory, applies include/exclude globs, and
//! serves raw file bytes. Listing is sorted by relative path so rebuild
//! input order is deterministic.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::GlobSet;
use walkdir::WalkDir;

use crate::config::FilesystemStoreConfig;
use crate::error::FetchError;
use crate::models::DocumentDescriptor;
use crate::store::{build_globset, DocumentStore};

pub struct FilesystemStore {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FilesystemStore {
    pub fn new(config: &FilesystemStoreConfig) -> Result<Self> {
        let include = build_globset(&config.include_globs)?;

        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(config.exclude_globs.clone());
        let exclude = build_globset(&default_excludes)?;

        Ok(Self {
            root: config.root.clone(),
            include,
            exclude,
            follow_symlinks: config.follow_symlinks,
        })
    }

    fn descriptor(&self, path: &Path, relative: &str) -> Result<DocumentDescriptor, FetchError> {
        let metadata = std::fs::metadata(path).map_err(|e| map_io_error(&e))?;
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::UNIX_EPOCH);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative.to_string());

        Ok(DocumentDescriptor {
            id: relative.to_string(),
            name,
            modified,
            size: metadata.len(),
        })
    }
}

#[async_trait]
impl DocumentStore for FilesystemStore {
    fn label(&self) -> &str {
        "filesystem"
    }

    async fn list(&self) -> Result<Vec<DocumentDescriptor>, FetchError> {
        if !self.root.exists() {
            return Err(FetchError::Unavailable(format!(
                "store root does not exist: {}",
                self.root.display()
            )));
        }

        let mut descriptors = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry.map_err(|e| FetchError::Unavailable(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if self.exclude.is_match(&rel_str) {
                continue;
            }
            if !self.include.is_match(&rel_str) {
                continue;
            }

            descriptors.push(self.descriptor(path, &rel_str)?);
        }

        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, FetchError> {
        // Descriptor ids are root-relative; refuse anything that escapes.
        let relative = Path::new(id);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(FetchError::NotFound);
        }

        std::fs::read(self.root.join(relative)).map_err(|e| map_io_error(&e))
    }
}

fn map_io_error(e: &std::io::Error) -> FetchError {
    match e.kind() {
        std::io::ErrorKind::NotFound => FetchError::NotFound,
        std::io::ErrorKind::PermissionDenied => FetchError::PermissionDenied(e.to_string()),
        _ => FetchError::Transient(e.to_string()),
    }
}

//! Local filesystem archive store
//!
//! One file per record under the archive root. Writes go to a temp file in
//! the same directory and are published with `persist_noclobber`, which links
//! the file into place only if the target does not exist yet: an atomic
//! create-if-absent at the OS level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::compression::{ArchiveMetadata, read_gzip, write_gzip};
use super::{ArchiveRecord, ArchiveStore, PutOutcome, StoreError, validate_key};
use crate::config::ArchiveConfig;
use crate::fingerprint::Fingerprint;

const GITIGNORE_CONTENT: &str = "*\n!.gitignore\n";

#[derive(Debug, Clone)]
pub struct FsArchiveStore {
    root: PathBuf,
    compress: bool,
}

impl FsArchiveStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            root: root.into(),
            compress,
        }
    }

    #[must_use]
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.archive_dir().clone(), config.compress_archives())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a record for `key` lives in (`<key>.gz` when compressing)
    ///
    /// # Errors
    ///
    /// Rejects keys that are not plain file names.
    pub fn path_for(&self, key: &Fingerprint) -> Result<PathBuf, StoreError> {
        let name = validate_key(key)?;
        Ok(if self.compress {
            self.root.join(format!("{name}.gz"))
        } else {
            self.root.join(name)
        })
    }
}

/// Best-guess content type from the archive suffix, for uncompressed records
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => crate::utils::HTML_CONTENT_TYPE,
        Some("json") => "application/json",
        Some("md") => "text/markdown; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Keep archived content out of version control when the root sits in a repo
fn ensure_gitignore(root: &Path) -> std::io::Result<()> {
    let path = root.join(".gitignore");
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(GITIGNORE_CONTENT.as_bytes())?;
            debug!("Created .gitignore in {}", root.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_record(
    root: &Path,
    target: &Path,
    key: &str,
    content: &[u8],
    content_type: &str,
    compress: bool,
) -> std::io::Result<PutOutcome> {
    std::fs::create_dir_all(root)?;
    ensure_gitignore(root)?;

    let temp_file = NamedTempFile::new_in(root)?;
    let temp_file = if compress {
        let metadata = ArchiveMetadata::for_content(content, content_type);
        write_gzip(temp_file, key, content, &metadata)?
    } else {
        let mut temp_file = temp_file;
        temp_file.write_all(content)?;
        temp_file
    };
    temp_file.as_file().sync_all()?;

    // The temp file is removed when `PersistError` is dropped.
    match temp_file.persist_noclobber(target) {
        Ok(_) => Ok(PutOutcome::Created),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyExists),
        Err(e) => Err(e.error),
    }
}

type StoredRecord = (Vec<u8>, String, DateTime<Utc>);

fn read_record(path: &Path, compressed: bool) -> std::io::Result<Option<StoredRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if compressed {
        let (content, metadata) = read_gzip(file)?;
        return Ok(Some((content, metadata.content_type, metadata.archived_at)));
    }

    let modified = file.metadata()?.modified()?;
    let content = std::fs::read(path)?;
    Ok(Some((
        content,
        content_type_for(path).to_string(),
        DateTime::<Utc>::from(modified),
    )))
}

#[async_trait]
impl ArchiveStore for FsArchiveStore {
    async fn head(&self, key: &Fingerprint) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(key.as_str(), e))
    }

    async fn put_if_absent(
        &self,
        key: &Fingerprint,
        content: &[u8],
        content_type: &str,
    ) -> Result<PutOutcome, StoreError> {
        let target = self.path_for(key)?;
        let root = self.root.clone();
        let name = key.as_str().to_string();
        let content = content.to_vec();
        let content_type = content_type.to_string();
        let compress = self.compress;

        // Compression, fsync and the link all block; keep them off the runtime.
        let outcome = tokio::task::spawn_blocking(move || {
            write_record(&root, &target, &name, &content, &content_type, compress)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
        .map_err(|e| StoreError::io(key.as_str(), e))?;

        debug!("put_if_absent {key}: {outcome:?}");
        Ok(outcome)
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<ArchiveRecord>, StoreError> {
        let path = self.path_for(key)?;
        let compressed = self.compress;

        let record = tokio::task::spawn_blocking(move || read_record(&path, compressed))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidData
                | ErrorKind::InvalidInput
                | ErrorKind::Other
                | ErrorKind::UnexpectedEof => {
                    StoreError::Corrupt {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                }
                _ => StoreError::io(key.as_str(), e),
            })?;

        Ok(record.map(|(content, content_type, archived_at)| ArchiveRecord {
            fingerprint: key.clone(),
            content,
            content_type,
            archived_at,
        }))
    }
}

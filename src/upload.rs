//! Upload pipeline
//!
//! Files are selected per category and previewed in memory, then written to
//! the object store as one batch. The local image index only changes when
//! the whole batch made it into storage.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use derive_debug::Dbg;
use futures::{StreamExt as _, future::join_all, stream::FuturesUnordered};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    category::Category,
    progress::{FileStatus, NullReporter, ProgressReporter, UploadPhase},
    storage::{
        index::{self, IMAGES_KEY},
        object,
    },
};

/// A file picked for upload.
#[derive(Dbg, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: mime::Mime,
    #[dbg(skip)]
    pub body: Bytes,
}

impl SelectedFile {
    /// Content type is guessed from the file name.
    pub fn new(name: &str, body: impl Into<Bytes>) -> Self {
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name).to_owned();
        Self {
            content_type: mime_guess::from_path(&name).first_or_octet_stream(),
            name,
            body: body.into(),
        }
    }

    pub async fn read(path: &Path) -> Result<Self, SelectError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|error| SelectError::Read {
                path: path.to_owned(),
                error,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(&name, body))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("failed to read {}: {error}", path.display())]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("{name} is not an image ({content_type})")]
    NotAnImage {
        name: String,
        content_type: mime::Mime,
    },
    #[error("preview task failed: {0}")]
    Preview(tokio::task::JoinError),
}

/// A selected file waiting for confirmation.
#[derive(Dbg, Clone)]
pub struct PendingUpload {
    pub file: SelectedFile,
    pub category: Category,
    /// `data:` URL of the file contents.
    #[dbg(skip)]
    pub preview: String,
}

impl PendingUpload {
    pub fn prepare(file: SelectedFile, category: Category) -> Result<Self, SelectError> {
        if file.content_type.type_() != mime::IMAGE {
            return Err(SelectError::NotAnImage {
                name: file.name,
                content_type: file.content_type,
            });
        }
        let preview = format!(
            "data:{};base64,{}",
            file.content_type,
            base64::engine::general_purpose::STANDARD.encode(&file.body)
        );
        Ok(Self {
            file,
            category,
            preview,
        })
    }
}

/// Entry appended to the local image index for every stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub url: Url,
    pub category: Category,
    /// Confirmation instant in milliseconds since the epoch.
    pub timestamp: i64,
    /// Original file name, without the timestamp prefix.
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `category/timestamp_fileName`
pub fn upload_path(category: Category, timestamp: i64, file_name: &str) -> String {
    format!("{category}/{timestamp}_{file_name}")
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError<OE, IE> {
    #[error("two selected files would both be stored at {0}")]
    PathCollision(String),
    #[error("failed to upload {failed} of {total} images: {source}")]
    Write {
        failed: usize,
        total: usize,
        #[source]
        source: OE,
    },
    #[error("failed to update image index: {0}")]
    Index(#[source] IE),
    #[error("failed to encode image record: {0}")]
    Encode(#[source] serde_json::Error),
}

pub struct UploadPipeline<'s, O, I> {
    objects: &'s O,
    index: &'s I,
    pending: Vec<PendingUpload>,
    reporter: Arc<dyn ProgressReporter>,
}

impl<'s, O: object::Client, I: index::Client> UploadPipeline<'s, O, I> {
    pub fn new(objects: &'s O, index: &'s I) -> Self {
        Self {
            objects,
            index,
            pending: Vec::new(),
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn pending(&self) -> &[PendingUpload] {
        &self.pending
    }

    /// Drops every pending upload without writing anything.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Reads files from disk and queues them under `category`. Previews are
    /// built on the blocking pool.
    ///
    /// Files are appended as their previews become ready, so the queue order
    /// may differ from `paths`. Unreadable and non-image files are skipped.
    /// Returns how many files were queued.
    pub async fn select_paths(
        &mut self,
        paths: impl IntoIterator<Item = PathBuf>,
        category: Category,
    ) -> usize {
        self.reporter.set_phase(UploadPhase::Previewing);
        let mut reads = paths
            .into_iter()
            .map(|path| async move {
                let file = SelectedFile::read(&path).await?;
                prepare_blocking(file, category).await
            })
            .collect::<FuturesUnordered<_>>();
        let mut queued = 0;
        while let Some(result) = reads.next().await {
            queued += self.push_prepared(result);
        }
        queued
    }

    /// Queues in-memory files under `category`.
    pub async fn select_files(&mut self, files: Vec<SelectedFile>, category: Category) -> usize {
        self.reporter.set_phase(UploadPhase::Previewing);
        let mut previews = files
            .into_iter()
            .map(|file| prepare_blocking(file, category))
            .collect::<FuturesUnordered<_>>();
        let mut queued = 0;
        while let Some(result) = previews.next().await {
            queued += self.push_prepared(result);
        }
        queued
    }

    fn push_prepared(&mut self, result: Result<PendingUpload, SelectError>) -> usize {
        match result {
            Ok(upload) => {
                debug!(file = %upload.file.name, category = %upload.category, "queued upload");
                self.pending.push(upload);
                1
            }
            Err(error) => {
                warn!(%error, "skipping selected file");
                0
            }
        }
    }

    pub async fn confirm(&mut self) -> Result<Vec<Url>, UploadError<O::Error, I::Error>> {
        self.confirm_at(Utc::now()).await
    }

    /// Writes every pending upload, stamping paths with `now`.
    ///
    /// All writes run concurrently. If any of them fails, the blobs that were
    /// written are deleted again (best effort), the index is left untouched
    /// and the pending list is kept for another attempt. On success the index
    /// gains one record per upload and the pending list is cleared.
    pub async fn confirm_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Url>, UploadError<O::Error, I::Error>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let timestamp = now.timestamp_millis();
        let paths = self
            .pending
            .iter()
            .map(|upload| upload_path(upload.category, timestamp, &upload.file.name))
            .collect::<Vec<_>>();
        let mut seen = HashSet::new();
        if let Some(collision) = paths.iter().find(|path| !seen.insert(path.as_str())) {
            warn!(path = %collision, "upload path collision");
            return Err(UploadError::PathCollision(collision.clone()));
        }

        self.reporter.register_files(paths.clone());
        self.reporter.set_phase(UploadPhase::Uploading);
        let results = join_all(
            self.pending
                .iter()
                .zip(&paths)
                .map(|(upload, path)| write_one(self.objects, &*self.reporter, upload, path)),
        )
        .await;

        let total = results.len();
        let mut urls = Vec::with_capacity(total);
        let mut written = Vec::with_capacity(total);
        let mut failure = None;
        let mut failed = 0;
        for (path, outcome) in paths.iter().zip(results) {
            match outcome {
                WriteOutcome::Stored(url) => {
                    written.push(path.as_str());
                    urls.push(url);
                }
                WriteOutcome::Unresolved(error) => {
                    written.push(path.as_str());
                    failed += 1;
                    failure.get_or_insert(error);
                }
                WriteOutcome::NotStored(error) => {
                    failed += 1;
                    failure.get_or_insert(error);
                }
            }
        }
        if let Some(source) = failure {
            error!(failed, total, error = %source, "upload batch failed");
            self.roll_back(&written).await;
            self.reporter
                .set_phase(UploadPhase::Failed(format!("{failed} of {total} writes failed")));
            return Err(UploadError::Write {
                failed,
                total,
                source,
            });
        }

        self.reporter.set_phase(UploadPhase::Indexing);
        let records = self
            .pending
            .iter()
            .zip(&paths)
            .zip(&urls)
            .map(|((upload, path), url)| ImageRecord {
                url: url.clone(),
                category: upload.category,
                timestamp,
                file_name: upload.file.name.clone(),
                path: Some(path.clone()),
            });
        if let Err(error) = self.append_records(records).await {
            error!(%error, "failed to update image index");
            self.roll_back(&written).await;
            self.reporter
                .set_phase(UploadPhase::Failed("index update failed".into()));
            return Err(error);
        }

        info!(count = total, "uploaded images");
        self.pending.clear();
        self.reporter.set_phase(UploadPhase::Completed);
        Ok(urls)
    }

    /// Appends to the stored image list, keeping entries this build cannot
    /// decode.
    async fn append_records(
        &self,
        records: impl Iterator<Item = ImageRecord>,
    ) -> Result<(), UploadError<O::Error, I::Error>> {
        let mut stored = index::read_stored::<ImageRecord, _>(self.index, IMAGES_KEY)
            .await
            .map_err(UploadError::Index)?;
        for record in records {
            stored.push(record).map_err(UploadError::Encode)?;
        }
        index::write_stored(self.index, IMAGES_KEY, &stored)
            .await
            .map_err(UploadError::Index)
    }

    async fn roll_back(&self, written: &[&str]) {
        if written.is_empty() {
            return;
        }
        self.reporter.set_phase(UploadPhase::RollingBack);
        let deletes = written.iter().map(|path| async move {
            if let Err(error) = self.objects.delete(path).await {
                warn!(path, %error, "failed to remove partial upload");
            }
        });
        join_all(deletes).await;
    }
}

/// Builds the preview on the blocking pool.
async fn prepare_blocking(
    file: SelectedFile,
    category: Category,
) -> Result<PendingUpload, SelectError> {
    match tokio::task::spawn_blocking(move || PendingUpload::prepare(file, category)).await {
        Ok(prepared) => prepared,
        Err(error) => Err(SelectError::Preview(error)),
    }
}

/// How far a single write got.
enum WriteOutcome<E> {
    Stored(Url),
    /// The blob landed but no URL could be resolved for it.
    Unresolved(E),
    NotStored(E),
}

async fn write_one<O: object::Client>(
    objects: &O,
    reporter: &dyn ProgressReporter,
    upload: &PendingUpload,
    path: &str,
) -> WriteOutcome<O::Error> {
    reporter.update_file(path, FileStatus::Uploading);
    let outcome = match objects
        .put(path, upload.file.content_type.as_ref(), upload.file.body.clone())
        .await
    {
        Ok(blob) => match objects.resolve_url(&blob).await {
            Ok(url) => WriteOutcome::Stored(url),
            Err(error) => WriteOutcome::Unresolved(error),
        },
        Err(error) => WriteOutcome::NotStored(error),
    };
    match &outcome {
        WriteOutcome::Stored(_) => reporter.update_file(path, FileStatus::Done),
        WriteOutcome::Unresolved(error) | WriteOutcome::NotStored(error) => {
            reporter.update_file(path, FileStatus::Failed(error.to_string()))
        }
    }
    outcome
}

//! File storage backends for worksheet uploads.
//!
//! Images and videos go to Cloudinary; everything else (pdf, docx, pptx, ...)
//! goes to Google Drive. The caller picks the backend through
//! [`StorageKind::for_mime`] and gets back an [`UploadedFile`] recording where
//! the bytes landed, which is what the worksheet row persists.

pub mod cloudinary;
pub mod gdrive;

use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::db::models::worksheet::StorageKind;
use crate::util::env::EnvErr;

/// A successfully stored file: the public URL clients download from and the
/// backend-side identifier needed to delete it later.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub url: String,
    pub public_id: String,
    pub kind: StorageKind,
}

/// Uploads `bytes` to whichever backend handles `mime`.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn store(filename: &str, mime: &str, bytes: Vec<u8>) -> StorageResult<UploadedFile> {
    match StorageKind::for_mime(mime) {
        StorageKind::Cloudinary => cloudinary::upload(filename, bytes).await,
        StorageKind::Gdrive => gdrive::upload(filename, mime, bytes).await,
    }
}

/// Removes a previously stored file from its backend.
#[instrument]
pub async fn remove(kind: StorageKind, public_id: &str) -> StorageResult<()> {
    match kind {
        StorageKind::Cloudinary => cloudinary::destroy(public_id).await,
        StorageKind::Gdrive => gdrive::delete(public_id).await,
    }
}

pub type StorageResult<T> = core::result::Result<T, StorageErr>;

#[derive(Debug, Error)]
pub enum StorageErr {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("while parsing environment vars: {0}")]
    EnvError(#[from] EnvErr),

    #[error("storage backend rejected the request ({status}): {body:#?}")]
    UpstreamErr { status: u16, body: Value },

    #[error("storage response missing expected field `{0}`")]
    MalformedResponse(&'static str),

    #[error("google drive is not connected; set GDRIVE_ACCESS_TOKEN")]
    DriveNotConnected,
}

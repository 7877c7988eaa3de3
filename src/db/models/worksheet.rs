use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::account::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct WorksheetId(pub String);

impl WorksheetId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Which external store holds the uploaded file. Images and video go to
/// Cloudinary; everything else (pdf, docx, hwp, ...) goes to Google Drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storage_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageKind {
    Cloudinary,
    Gdrive,
}

impl StorageKind {
    pub fn for_mime(mime: &str) -> Self {
        if mime.starts_with("image/") || mime.starts_with("video/") {
            StorageKind::Cloudinary
        } else {
            StorageKind::Gdrive
        }
    }
}

/// Base worksheet table model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    pub id: WorksheetId,
    pub title: String,
    pub subject: Option<String>,
    pub file_url: String,
    pub file_public_id: String,
    pub storage: StorageKind,
    pub thumbnail_url: Option<String>,
    pub thumbnail_public_id: Option<String>,
    pub uploader_id: AccountId,
    pub views: i64,
    pub created_at: NaiveDateTime,
}

/// Listing row with the uploader's username joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetSummary {
    pub id: WorksheetId,
    pub title: String,
    pub subject: Option<String>,
    pub thumbnail_url: Option<String>,
    pub uploader_username: String,
    pub views: i64,
    pub created_at: NaiveDateTime,
}

impl From<String> for WorksheetId {
    fn from(value: String) -> Self {
        WorksheetId(value)
    }
}

impl From<&str> for WorksheetId {
    fn from(value: &str) -> Self {
        WorksheetId(value.to_string())
    }
}

impl fmt::Display for WorksheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mime_dispatch() {
        assert_eq!(StorageKind::for_mime("image/png"), StorageKind::Cloudinary);
        assert_eq!(StorageKind::for_mime("image/jpeg"), StorageKind::Cloudinary);
        assert_eq!(StorageKind::for_mime("video/mp4"), StorageKind::Cloudinary);

        assert_eq!(StorageKind::for_mime("application/pdf"), StorageKind::Gdrive);
        assert_eq!(StorageKind::for_mime("text/plain"), StorageKind::Gdrive);
        assert_eq!(
            StorageKind::for_mime("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            StorageKind::Gdrive
        );
    }
}

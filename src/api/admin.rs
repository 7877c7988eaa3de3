//! Admin-only surface: account lifecycle and manual balance corrections.
//! Every route here sits behind the shared admin secret.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::auth::issue_token;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::*;
use crate::storage;
use crate::util::env::Var;
use crate::var;

const ISSUED_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub account: Account,
    pub token: String,
}

/// Creates an account and mints its first bearer token.
#[instrument(skip(state, req), fields(username = req.username))]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> JsonResult<CreateAccountResponse> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(RouteError::Validation("username must not be empty".into()));
    }

    let repo = AccountRepository::new(state.db_pool);
    if repo.username_taken(username).await? {
        return Err(RouteError::Validation(format!(
            "username '{username}' is already taken"
        )));
    }

    let account = Account::new(username);
    repo.insert(&account).await?;

    let secret = var!(Var::AuthTokenSecret).await?;
    let expires_at = (Utc::now() + Duration::days(ISSUED_TOKEN_TTL_DAYS)).timestamp();
    let token = issue_token(&account.id, expires_at, secret);

    Ok(Json(CreateAccountResponse { account, token }))
}

#[instrument(skip(state))]
pub async fn list_accounts(
    Query(param): Query<Pagination>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PaginatedResponse<Account>> {
    let (limit, offset) = param.clamped();

    let repo = AccountRepository::new(state.db_pool);
    let accounts = repo.get_by_range(limit, offset).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        accounts,
        total,
        limit,
        param.page.max(0),
    )))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<MessageResponse> {
    let deleted = AccountRepository::new(state.db_pool)
        .delete_by_id(&id.into())
        .await?;

    if !deleted {
        return Err(RouteError::NotFound("account"));
    }

    Ok(Json(MessageResponse {
        message: "account deleted".to_string(),
    }))
}

/// Everything a worksheet row holds in external storage. Thumbnails are
/// always Cloudinary uploads regardless of where the main file went.
fn stored_artifacts(worksheet: &Worksheet) -> Vec<(StorageKind, String)> {
    let mut artifacts = vec![(worksheet.storage, worksheet.file_public_id.clone())];
    if let Some(thumb_id) = &worksheet.thumbnail_public_id {
        artifacts.push((StorageKind::Cloudinary, thumb_id.clone()));
    }

    artifacts
}

/// Deletes a worksheet and its stored files. Storage removal runs first so a
/// backend failure keeps the row around for a retry instead of orphaning the
/// file.
#[instrument(skip(state))]
pub async fn delete_worksheet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<MessageResponse> {
    let repo = WorksheetRepository::new(state.db_pool);
    let worksheet = repo
        .get_by_id(&id.into())
        .await?
        .ok_or(RouteError::NotFound("worksheet"))?;

    for (kind, public_id) in stored_artifacts(&worksheet) {
        storage::remove(kind, &public_id).await?;
    }
    repo.delete_by_id(&worksheet.id).await?;

    Ok(Json(MessageResponse {
        message: "worksheet deleted".to_string(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<MessageResponse> {
    let deleted = QuizRepository::new(state.db_pool)
        .delete_by_id(&id.into())
        .await?;

    if !deleted {
        return Err(RouteError::NotFound("quiz"));
    }

    Ok(Json(MessageResponse {
        message: "quiz deleted".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub message: String,
    pub points: i64,
}

#[instrument(skip(state))]
pub async fn adjust_points(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> JsonResult<AdjustResponse> {
    let receipt = state.points.admin_adjust(&id.into(), req.amount).await?;

    Ok(Json(AdjustResponse {
        message: format!("adjusted {} by {:+}pt", receipt.username, req.amount),
        points: receipt.points,
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    fn worksheet(storage: StorageKind, thumbnail: Option<&str>) -> Worksheet {
        Worksheet {
            id: WorksheetId::generate(),
            title: "linear algebra drills".to_string(),
            subject: Some("math".to_string()),
            file_url: "https://files.example/sheet".to_string(),
            file_public_id: "sheet-id".to_string(),
            storage,
            thumbnail_url: thumbnail.map(|_| "https://files.example/thumb".to_string()),
            thumbnail_public_id: thumbnail.map(ToString::to_string),
            uploader_id: AccountId::generate(),
            views: 0,
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn test_stored_artifacts_follow_the_file_backend() {
        let sheet = worksheet(StorageKind::Gdrive, None);
        assert_eq!(
            stored_artifacts(&sheet),
            vec![(StorageKind::Gdrive, "sheet-id".to_string())]
        );
    }

    #[test]
    fn test_stored_artifacts_include_thumbnail_as_cloudinary() {
        // drive-hosted pdf with an image thumbnail: the thumbnail still lives
        // on cloudinary and must be deleted there
        let sheet = worksheet(StorageKind::Gdrive, Some("thumb-id"));
        assert_eq!(
            stored_artifacts(&sheet),
            vec![
                (StorageKind::Gdrive, "sheet-id".to_string()),
                (StorageKind::Cloudinary, "thumb-id".to_string()),
            ]
        );
    }
}

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::{Json, debug_handler};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::auth::AuthAccount;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::constants::{CLOUDINARY_THUMB_FOLDER, MAX_UPLOAD_BYTES};
use crate::db::prelude::*;
use crate::db::repositories::worksheet::WorksheetSort;
use crate::storage;
use crate::storage::cloudinary;

#[inline]
const fn default_limit() -> i64 {
    50
}

//
// worksheets

#[derive(Debug, Deserialize)]
pub struct WorksheetListParams {
    pub subject: Option<String>,
    #[serde(default)]
    pub sort: WorksheetSort,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub page: i64,
}

#[instrument(skip(state))]
pub async fn list_worksheets(
    Query(param): Query<WorksheetListParams>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PaginatedResponse<WorksheetSummary>> {
    let limit = param.limit.max(1);
    let offset = param.page.max(0) * limit;
    let segment = WorksheetRepository::new(state.db_pool)
        .list(param.subject.as_deref(), param.sort, limit, offset)
        .await?;

    Ok(Json(segment))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetDetail {
    pub worksheet: Worksheet,
    pub view_counted: bool,
}

/// Fetches one worksheet and applies the first-view reward for the caller.
#[instrument(skip(state, auth), fields(viewer = %auth.0))]
pub async fn worksheet_detail(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> JsonResult<WorksheetDetail> {
    let mut worksheet = WorksheetRepository::new(state.db_pool)
        .get_by_id(&id.into())
        .await?
        .ok_or(RouteError::NotFound("worksheet"))?;

    let view_counted = state.points.apply_view_reward(&worksheet, &auth.0).await?;
    if view_counted {
        worksheet.views += 1;
    }

    Ok(Json(WorksheetDetail {
        worksheet,
        view_counted,
    }))
}

#[instrument(skip(state, auth, multipart), fields(uploader = %auth.0))]
#[debug_handler]
pub async fn upload_worksheet(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    mut multipart: Multipart,
) -> JsonResult<Worksheet> {
    let mut title = None;
    let mut subject = None;
    let mut file = None;
    let mut thumbnail = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("title") => title = Some(field.text().await?),
            Some("subject") => subject = Some(field.text().await?),
            Some("file") => {
                let filename = field.file_name().unwrap_or("worksheet").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                file = Some((filename, mime, field.bytes().await?));
            }
            Some("thumbnail") => {
                let filename = field.file_name().unwrap_or("thumbnail").to_string();
                thumbnail = Some((filename, field.bytes().await?));
            }
            _ => continue,
        }
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| RouteError::Validation("title must not be empty".into()))?;
    let (filename, mime, bytes) = file
        .filter(|(_, _, b)| !b.is_empty())
        .ok_or_else(|| RouteError::Validation("a file is required".into()))?;

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(RouteError::Validation(format!(
            "file exceeds the {}MB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let stored = storage::store(&filename, &mime, bytes.to_vec()).await?;

    let stored_thumb = match thumbnail {
        Some((thumb_name, thumb_bytes)) => Some(
            cloudinary::upload_to(CLOUDINARY_THUMB_FOLDER, &thumb_name, thumb_bytes.to_vec())
                .await?,
        ),
        None => None,
    };

    let worksheet = Worksheet {
        id: WorksheetId::generate(),
        title,
        subject: subject.filter(|s| !s.trim().is_empty()),
        file_url: stored.url,
        file_public_id: stored.public_id,
        storage: stored.kind,
        thumbnail_url: stored_thumb.as_ref().map(|t| t.url.clone()),
        thumbnail_public_id: stored_thumb.map(|t| t.public_id),
        uploader_id: auth.0,
        views: 0,
        created_at: Utc::now().naive_utc(),
    };

    WorksheetRepository::new(state.db_pool)
        .insert(&worksheet)
        .await?;

    Ok(Json(worksheet))
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

#[instrument(skip(state, _auth))]
pub async fn download_worksheet(
    State(state): State<Arc<AppState>>,
    _auth: AuthAccount,
    Path(id): Path<String>,
) -> JsonResult<DownloadResponse> {
    let worksheet = WorksheetRepository::new(state.db_pool)
        .get_by_id(&id.into())
        .await?
        .ok_or(RouteError::NotFound("worksheet"))?;

    Ok(Json(DownloadResponse {
        url: worksheet.file_url,
    }))
}

//
// points

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub message: String,
    pub sender_points: i64,
}

#[instrument(skip(state, auth), fields(sender = %auth.0))]
pub async fn transfer_points(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(req): Json<TransferRequest>,
) -> JsonResult<TransferResponse> {
    let receipt = state
        .points
        .transfer(&auth.0, &req.to.into(), req.amount)
        .await?;

    Ok(Json(TransferResponse {
        message: format!(
            "sent {}pt to {} ({}pt fee)",
            receipt.amount, receipt.receiver_username, receipt.fee
        ),
        sender_points: receipt.sender_points,
    }))
}

#[instrument(skip(state, auth), fields(account = %auth.0))]
pub async fn point_history(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> JsonResult<Vec<HistoryEntry>> {
    let history = LedgerRepository::new(state.db_pool)
        .history_for(&auth.0)
        .await?;

    Ok(Json(history))
}

//
// quizzes

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub title: String,
    pub subject: Option<String>,
    pub questions: Vec<QuizQuestion>,
}

fn validate_quiz(req: &CreateQuizRequest) -> Result<(), RouteError> {
    if req.title.trim().is_empty() {
        return Err(RouteError::Validation("title must not be empty".into()));
    }

    if req.questions.len() < 2 {
        return Err(RouteError::Validation(
            "a quiz needs at least two questions".into(),
        ));
    }

    for (i, q) in req.questions.iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(RouteError::Validation(format!(
                "question {} has no text",
                i + 1
            )));
        }
        if q.choices.len() < 2 {
            return Err(RouteError::Validation(format!(
                "question {} needs at least two choices",
                i + 1
            )));
        }
        if q.answer_index >= q.choices.len() {
            return Err(RouteError::Validation(format!(
                "question {} has an out-of-range answer index",
                i + 1
            )));
        }
    }

    Ok(())
}

#[instrument(skip(state, auth, req), fields(creator = %auth.0))]
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Json(req): Json<CreateQuizRequest>,
) -> JsonResult<Quiz> {
    validate_quiz(&req)?;

    let quiz = Quiz {
        id: QuizId::generate(),
        title: req.title,
        subject: req.subject.filter(|s| !s.trim().is_empty()),
        creator_id: auth.0,
        questions: sqlx::types::Json(req.questions),
        play_count: 0,
        created_at: Utc::now().naive_utc(),
    };

    QuizRepository::new(state.db_pool).insert(&quiz).await?;

    Ok(Json(quiz))
}

#[derive(Debug, Deserialize)]
pub struct QuizListParams {
    pub subject: Option<String>,
}

#[instrument(skip(state))]
pub async fn list_quizzes(
    Query(param): Query<QuizListParams>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<Quiz>> {
    let quizzes = QuizRepository::new(state.db_pool)
        .list(param.subject.as_deref())
        .await?;

    Ok(Json(quizzes))
}

#[instrument(skip(state))]
pub async fn quiz_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> JsonResult<Quiz> {
    let quiz = QuizRepository::new(state.db_pool)
        .get_by_id(&id.into())
        .await?
        .ok_or(RouteError::NotFound("quiz"))?;

    Ok(Json(quiz))
}

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub score: i64,
    pub mode: GameMode,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub message: String,
    pub score: i64,
}

#[instrument(skip(state, auth), fields(player = %auth.0))]
pub async fn submit_quiz_score(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Path(id): Path<String>,
    Json(req): Json<SubmitScoreRequest>,
) -> JsonResult<ScoreResponse> {
    if req.score < 0 {
        return Err(RouteError::Validation("score must not be negative".into()));
    }

    let quiz = QuizRepository::new(state.db_pool)
        .get_by_id(&id.into())
        .await?
        .ok_or(RouteError::NotFound("quiz"))?;

    let rewarded = state
        .points
        .record_quiz_play(&quiz, &auth.0, req.score, req.mode)
        .await?;

    let message = if rewarded {
        "score recorded, creator rewarded"
    } else {
        "score recorded"
    };

    Ok(Json(ScoreResponse {
        message: message.to_string(),
        score: req.score,
    }))
}

#[instrument(skip(state))]
pub async fn weekly_leaderboard(
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<WeeklyLeaderboardEntry>> {
    let entries = QuizRepository::new(state.db_pool)
        .weekly_leaderboard()
        .await?;

    Ok(Json(entries))
}

//
// follows

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[instrument(skip(state, auth), fields(follower = %auth.0))]
pub async fn follow_account(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> JsonResult<MessageResponse> {
    let target: AccountId = id.into();
    if auth.0 == target {
        return Err(RouteError::Validation("cannot follow yourself".into()));
    }

    if !AccountRepository::new(state.db_pool).exists(&target).await? {
        return Err(RouteError::NotFound("account"));
    }

    let created = FollowRepository::new(state.db_pool)
        .follow(&auth.0, &target)
        .await?;

    let message = if created {
        "now following"
    } else {
        "already following"
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

#[instrument(skip(state, auth), fields(follower = %auth.0))]
pub async fn unfollow_account(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> JsonResult<MessageResponse> {
    let removed = FollowRepository::new(state.db_pool)
        .unfollow(&auth.0, &id.into())
        .await?;

    let message = if removed {
        "unfollowed"
    } else {
        "was not following"
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

#[instrument(skip(state, auth), fields(account = %auth.0))]
pub async fn following(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> JsonResult<Vec<Account>> {
    let accounts = FollowRepository::new(state.db_pool)
        .following(&auth.0)
        .await?;

    Ok(Json(accounts))
}

#[instrument(skip(state, auth), fields(account = %auth.0))]
pub async fn followers(
    State(state): State<Arc<AppState>>,
    auth: AuthAccount,
) -> JsonResult<Vec<Account>> {
    let accounts = FollowRepository::new(state.db_pool)
        .followers(&auth.0)
        .await?;

    Ok(Json(accounts))
}

#[cfg(test)]
mod test {
    use super::*;

    fn quiz_request() -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Fractions".to_string(),
            subject: Some("math".to_string()),
            questions: vec![
                QuizQuestion {
                    question: "1/2 + 1/4 = ?".to_string(),
                    choices: vec!["3/4".to_string(), "2/6".to_string()],
                    answer_index: 0,
                },
                QuizQuestion {
                    question: "2/3 of 9 = ?".to_string(),
                    choices: vec!["3".to_string(), "6".to_string(), "9".to_string()],
                    answer_index: 1,
                },
            ],
        }
    }

    #[test]
    fn test_valid_quiz_passes() {
        assert!(validate_quiz(&quiz_request()).is_ok());
    }

    #[test]
    fn test_blank_title_rejected() {
        let mut req = quiz_request();
        req.title = "   ".to_string();
        assert!(validate_quiz(&req).is_err());
    }

    #[test]
    fn test_single_question_rejected() {
        let mut req = quiz_request();
        req.questions.truncate(1);
        assert!(validate_quiz(&req).is_err());
    }

    #[test]
    fn test_single_choice_rejected() {
        let mut req = quiz_request();
        req.questions[0].choices.truncate(1);
        req.questions[0].answer_index = 0;
        assert!(validate_quiz(&req).is_err());
    }

    #[test]
    fn test_out_of_range_answer_rejected() {
        let mut req = quiz_request();
        req.questions[1].answer_index = 3;
        assert!(validate_quiz(&req).is_err());
    }
}

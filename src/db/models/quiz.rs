use core::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct QuizId(pub String);

impl QuizId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub choices: Vec<String>,
    pub answer_index: usize,
}

/// Base quiz table model; questions live in a JSONB column.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub subject: Option<String>,
    pub creator_id: AccountId,
    pub questions: sqlx::types::Json<Vec<QuizQuestion>>,
    pub play_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "game_mode", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Quiz,
    Match,
    Speed,
}

/// One play of one quiz. Append-only; only ever read through aggregation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizScore {
    pub id: String,
    pub quiz_id: QuizId,
    pub player_id: AccountId,
    pub score: i64,
    pub mode: GameMode,
    pub played_at: NaiveDateTime,
}

impl QuizScore {
    pub fn new(quiz_id: QuizId, player_id: AccountId, score: i64, mode: GameMode) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id,
            player_id,
            score,
            mode,
            played_at: Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyLeaderboardEntry {
    pub username: String,
    pub total_score: i64,
    pub games_played: i64,
}

/// Winner candidate for a completed week, before the payout is applied.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeeklyWinner {
    pub player_id: AccountId,
    pub total_score: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRewardMarker {
    pub period_key: String,
    pub winner_id: AccountId,
    pub amount: i64,
    pub paid_at: NaiveDateTime,
}

impl From<String> for QuizId {
    fn from(value: String) -> Self {
        QuizId(value)
    }
}

impl From<&str> for QuizId {
    fn from(value: &str) -> Self {
        QuizId(value.to_string())
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

use chrono::{Duration, Utc};
use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::constants::WEEKLY_LEADERBOARD_SIZE;
use crate::db::models::quiz::{Quiz, QuizId, WeeklyLeaderboardEntry};
use crate::db::repositories::Repository;

#[derive(Debug)]
pub struct QuizRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for QuizRepository {
    type Ident = QuizId;
    type Output = Quiz;

    const BASE_FIELDS: &'static str = sql_fragment::QUIZ_FIELDS;
    const TABLE_NAME: &'static str = "quiz";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }

    #[instrument(skip(self, item), fields(title = item.title))]
    async fn insert(&self, item: &Self::Output) -> SqlxResult<()> {
        match sqlx::query(
            r#"
            INSERT INTO quiz (
                id,
                title,
                subject,
                creator_id,
                questions,
                play_count,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.subject)
        .bind(&item.creator_id)
        .bind(&item.questions)
        .bind(item.play_count)
        .bind(item.created_at)
        .execute(self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during quiz insertion");
                Err(e)
            }
        }
    }
}

impl QuizRepository {
    #[instrument(skip(self))]
    pub async fn list(&self, subject: Option<&str>) -> SqlxResult<Vec<Quiz>> {
        sqlx::query_as::<_, Quiz>(&format!(
            r#"
            SELECT {}
            FROM quiz
            WHERE ($1::text IS NULL OR subject = $1)
            ORDER BY created_at DESC
            "#,
            Self::BASE_FIELDS
        ))
        .bind(subject)
        .fetch_all(self.pool)
        .await
    }

    /// Top 10 accounts by summed score over the trailing 7 days.
    #[instrument(skip(self))]
    pub async fn weekly_leaderboard(&self) -> SqlxResult<Vec<WeeklyLeaderboardEntry>> {
        let cutoff = (Utc::now() - Duration::days(7)).naive_utc();

        sqlx::query_as::<_, WeeklyLeaderboardEntry>(
            r#"
            SELECT
                a.username,
                CAST(SUM(qs.score) AS BIGINT) AS total_score,
                COUNT(*) AS games_played
            FROM quiz_score qs
            JOIN account a ON a.id = qs.player_id
            WHERE qs.played_at >= $1
            GROUP BY a.username
            ORDER BY total_score DESC
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(WEEKLY_LEADERBOARD_SIZE)
        .fetch_all(self.pool)
        .await
    }
}

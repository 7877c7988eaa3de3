use core::fmt;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{Pool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;

use crate::db::models::account::{Account, AccountId};
use crate::db::models::ledger::PointTransaction;
use crate::db::models::quiz::{QuizId, QuizScore, WeeklyRewardMarker, WeeklyWinner};
use crate::db::models::worksheet::WorksheetId;

pub mod account;
pub mod follow;
pub mod ledger;
pub mod quiz;
pub mod worksheet;

/// Wrapper over an open `sqlx` transaction carrying every in-transaction write
/// the point subsystem performs. Compound balance mutations commit or roll
/// back as a unit; nothing here is reachable outside a `Tx`.
pub struct Tx<'a> {
    inner: Option<Transaction<'a, Postgres>>,
}

impl<'a> Tx<'a> {
    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on
    /// `Err`. The closure returns the `Tx` back so the borrow checker can see
    /// the handoff.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T, E>(pool: &'static Pool<Postgres>, f: F) -> Result<T, E>
    where
        F: FnOnce(Tx<'a>) -> Fut,
        Fut: Future<Output = (Tx<'a>, Result<T, E>)>,
        E: From<sqlx::Error> + fmt::Debug,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::trace!(error = ?e, "transacted query failure");
                if let Err(rb) = tx.rollback().await {
                    tracing::error!(error = ?rb, "rollback failure");
                }
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &'static Pool<Postgres>) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'a, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }

    /// Locks the account row for the remainder of the transaction.
    #[instrument(skip(self, id))]
    pub async fn get_account_for_update(
        &mut self,
        id: &AccountId,
    ) -> SqlxResult<Option<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE id = $1 FOR UPDATE",
            sql_fragment::ACCOUNT_FIELDS
        ))
        .bind(id)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    /// Applies a balance delta, returning the new balance. `earned_delta`
    /// feeds the lifetime-earned total and is zero for debits.
    #[instrument(skip(self, id))]
    pub async fn add_points(
        &mut self,
        id: &AccountId,
        points_delta: i64,
        earned_delta: i64,
    ) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE account
            SET points = points + $2,
                total_earned = total_earned + $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING points
            "#,
        )
        .bind(id)
        .bind(points_delta)
        .bind(earned_delta)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self, txn), fields(kind = ?txn.kind, amount = txn.amount))]
    pub async fn append_transaction(&mut self, txn: &PointTransaction) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO point_transaction (
                id,
                from_account,
                to_account,
                amount,
                kind,
                description,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.from_account)
        .bind(&txn.to_account)
        .bind(txn.amount)
        .bind(txn.kind)
        .bind(&txn.description)
        .bind(txn.created_at)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    /// Insert-or-fail dedup commit point for view rewards: returns whether the
    /// row was actually inserted. A concurrent loser of the unique-index race
    /// gets `false` here and must not apply the reward.
    #[instrument(skip(self))]
    pub async fn insert_view_record(
        &mut self,
        worksheet_id: &WorksheetId,
        viewer_id: &AccountId,
    ) -> SqlxResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO view_record (worksheet_id, viewer_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (worksheet_id, viewer_id)
            DO NOTHING
            "#,
        )
        .bind(worksheet_id)
        .bind(viewer_id)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    pub async fn increment_views(&mut self, worksheet_id: &WorksheetId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE worksheet SET views = views + 1 WHERE id = $1 RETURNING views",
        )
        .bind(worksheet_id)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn increment_play_count(&mut self, quiz_id: &QuizId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE quiz SET play_count = play_count + 1 WHERE id = $1 RETURNING play_count",
        )
        .bind(quiz_id)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self, score))]
    pub async fn insert_quiz_score(&mut self, score: &QuizScore) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_score (id, quiz_id, player_id, score, mode, played_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&score.id)
        .bind(&score.quiz_id)
        .bind(&score.player_id)
        .bind(score.score)
        .bind(score.mode)
        .bind(score.played_at)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn is_following(
        &mut self,
        follower: &AccountId,
        following: &AccountId,
    ) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follow WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower)
        .bind(following)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn marker_exists(&mut self, period_key: &str) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM weekly_reward_marker WHERE period_key = $1)",
        )
        .bind(period_key)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    /// Highest summed score over `[start, end)`; ties break by player id so
    /// repeated runs over the same data pick the same winner.
    #[instrument(skip(self))]
    pub async fn top_scorer_in_window(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> SqlxResult<Option<WeeklyWinner>> {
        sqlx::query_as::<_, WeeklyWinner>(
            r#"
            SELECT player_id, CAST(SUM(score) AS BIGINT) AS total_score
            FROM quiz_score
            WHERE played_at >= $1 AND played_at < $2
            GROUP BY player_id
            ORDER BY total_score DESC, player_id ASC
            LIMIT 1
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_optional(&mut **self.inner_mut()?)
        .await
    }

    /// Insert-or-fail guard against double payout. `false` means another run
    /// marked this period first; the caller must fail its transaction so the
    /// credit rolls back with it.
    #[instrument(skip(self, marker), fields(period = marker.period_key))]
    pub async fn insert_reward_marker(
        &mut self,
        marker: &WeeklyRewardMarker,
    ) -> SqlxResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO weekly_reward_marker (period_key, winner_id, amount, paid_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (period_key)
            DO NOTHING
            "#,
        )
        .bind(&marker.period_key)
        .bind(&marker.winner_id)
        .bind(marker.amount)
        .bind(marker.paid_at)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub mod sql_fragment {
    pub const ACCOUNT_FIELDS: &str = r#"
        id,
        username,
        points,
        total_earned,
        activated,
        created_at,
        updated_at
    "#;

    pub const WORKSHEET_FIELDS: &str = r#"
        id,
        title,
        subject,
        file_url,
        file_public_id,
        storage,
        thumbnail_url,
        thumbnail_public_id,
        uploader_id,
        views,
        created_at
    "#;

    pub const QUIZ_FIELDS: &str = r#"
        id,
        title,
        subject,
        creator_id,
        questions,
        play_count,
        created_at
    "#;
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;

    fn new(pool: &'static Pool<Postgres>) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static Pool<Postgres>;

    async fn exists(&self, id: &Self::Ident) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
    }

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }

    #[instrument(skip(self, limit, offset))]
    async fn get_by_range(&self, limit: i64, offset: i64) -> SqlxResult<Vec<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            Self::BASE_FIELDS,
            Self::TABLE_NAME,
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
    }

    #[instrument(skip(self))]
    async fn count(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", Self::TABLE_NAME))
            .fetch_one(self.pool())
            .await
    }

    #[instrument(skip(self, id))]
    async fn delete_by_id(&self, id: &Self::Ident) -> SqlxResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", Self::TABLE_NAME))
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert(&self, item: &Self::Output) -> SqlxResult<()>;
}

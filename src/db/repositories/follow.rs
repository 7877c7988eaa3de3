use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::account::{Account, AccountId};

/// Social-graph reads and writes. The (follower, following) pair is UNIQUE at
/// the storage layer, so a repeated follow is a no-op insert rather than a
/// read-then-write race.
pub struct FollowRepository {
    pool: &'static Pool<Postgres>,
}

impl FollowRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Returns `false` when the relation already existed.
    #[instrument(skip(self))]
    pub async fn follow(&self, follower: &AccountId, following: &AccountId) -> SqlxResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO follow (follower_id, following_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, following_id)
            DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(following)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Returns `false` when there was no relation to remove.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower: &AccountId, following: &AccountId) -> SqlxResult<bool> {
        let result =
            sqlx::query("DELETE FROM follow WHERE follower_id = $1 AND following_id = $2")
                .bind(follower)
                .bind(following)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    pub async fn is_following(
        &self,
        follower: &AccountId,
        following: &AccountId,
    ) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follow WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower)
        .bind(following)
        .fetch_one(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn following(&self, follower: &AccountId) -> SqlxResult<Vec<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {}
            FROM account
            JOIN follow f ON f.following_id = account.id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC
            "#,
            qualified_account_fields()
        ))
        .bind(follower)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn followers(&self, following: &AccountId) -> SqlxResult<Vec<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            SELECT {}
            FROM account
            JOIN follow f ON f.follower_id = account.id
            WHERE f.following_id = $1
            ORDER BY f.created_at DESC
            "#,
            qualified_account_fields()
        ))
        .bind(following)
        .fetch_all(self.pool)
        .await
    }
}

fn qualified_account_fields() -> String {
    sql_fragment::ACCOUNT_FIELDS
        .split(',')
        .map(|f| format!("account.{}", f.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_qualified_fields() {
        let fields = qualified_account_fields();
        assert!(fields.starts_with("account.id, account.username"));
        assert!(fields.ends_with("account.updated_at"));
    }
}

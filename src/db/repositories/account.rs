use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::account::{Account, AccountId};
use crate::db::repositories::Repository;

#[derive(Debug)]
pub struct AccountRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for AccountRepository {
    type Ident = AccountId;
    type Output = Account;

    const BASE_FIELDS: &'static str = sql_fragment::ACCOUNT_FIELDS;
    const TABLE_NAME: &'static str = "account";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }

    #[instrument(skip(self, item), fields(username = item.username))]
    async fn insert(&self, item: &Self::Output) -> SqlxResult<()> {
        match sqlx::query(
            r#"
            INSERT INTO account (
                id,
                username,
                points,
                total_earned,
                activated,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.username)
        .bind(item.points)
        .bind(item.total_earned)
        .bind(item.activated)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during account insertion");
                Err(e)
            }
        }
    }
}

impl AccountRepository {
    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> SqlxResult<Option<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM account WHERE username = $1",
            Self::BASE_FIELDS
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn username_taken(&self, username: &str) -> SqlxResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM account WHERE username = $1)",
        )
        .bind(username)
        .fetch_one(self.pool)
        .await
    }
}

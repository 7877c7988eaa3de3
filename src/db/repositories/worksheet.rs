use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::PaginatedResponse;
use crate::db::models::worksheet::{Worksheet, WorksheetId, WorksheetSummary};
use crate::db::repositories::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorksheetSort {
    #[default]
    Newest,
    Views,
}

#[derive(Debug)]
pub struct WorksheetRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for WorksheetRepository {
    type Ident = WorksheetId;
    type Output = Worksheet;

    const BASE_FIELDS: &'static str = sql_fragment::WORKSHEET_FIELDS;
    const TABLE_NAME: &'static str = "worksheet";

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
            INSERT INTO worksheet (
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
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.subject)
        .bind(&item.file_url)
        .bind(&item.file_public_id)
        .bind(item.storage)
        .bind(&item.thumbnail_url)
        .bind(&item.thumbnail_public_id)
        .bind(&item.uploader_id)
        .bind(item.views)
        .bind(item.created_at)
        .execute(self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = ?e, "failure during worksheet insertion");
                Err(e)
            }
        }
    }
}

impl WorksheetRepository {
    /// Paginated listing with the uploader's username joined in, optionally
    /// filtered to one subject label.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        subject: Option<&str>,
        sort: WorksheetSort,
        limit: i64,
        offset: i64,
    ) -> SqlxResult<PaginatedResponse<WorksheetSummary>> {
        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM worksheet WHERE ($1::text IS NULL OR subject = $1)",
        )
        .bind(subject)
        .fetch_one(self.pool)
        .await?;

        let order = match sort {
            WorksheetSort::Views => "w.views DESC, w.created_at DESC",
            WorksheetSort::Newest => "w.created_at DESC",
        };

        let sheets = sqlx::query_as::<_, WorksheetSummary>(&format!(
            r#"
            SELECT
                w.id,
                w.title,
                w.subject,
                w.thumbnail_url,
                a.username AS uploader_username,
                w.views,
                w.created_at
            FROM worksheet w
            JOIN account a ON a.id = w.uploader_id
            WHERE ($1::text IS NULL OR w.subject = $1)
            ORDER BY {order}
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(subject)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(PaginatedResponse::new(
            sheets,
            total_items,
            limit,
            offset / limit + 1,
        ))
    }
}

use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use crate::constants::HISTORY_LIMIT;
use crate::db::models::account::AccountId;
use crate::db::models::ledger::HistoryEntry;

/// Read side of the transaction log. Writes only ever happen through
/// [`crate::db::repositories::Tx::append_transaction`].
pub struct LedgerRepository {
    pool: &'static Pool<Postgres>,
}

impl LedgerRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Newest-first history visible to `account`, capped at 50 rows.
    ///
    /// Visibility: reward and admin-adjust entries show only to their
    /// recipient; transfers show to both sides; the fee row shows to the
    /// sender it was charged to.
    #[instrument(skip(self))]
    pub async fn history_for(&self, account: &AccountId) -> SqlxResult<Vec<HistoryEntry>> {
        sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT
                t.id,
                fa.username AS from_username,
                ta.username AS to_username,
                t.amount,
                t.kind,
                t.description,
                t.created_at
            FROM point_transaction t
            JOIN account ta ON ta.id = t.to_account
            LEFT JOIN account fa ON fa.id = t.from_account
            WHERE (t.to_account = $1 AND t.kind IN (
                    'VIEW_REWARD', 'ADMIN_ADJUST', 'QUIZ_PLAY_REWARD',
                    'WEEKLY_QUIZ_REWARD', 'TRANSFER'
                ))
               OR (t.from_account = $1 AND t.kind IN ('TRANSFER', 'FEE'))
            ORDER BY t.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account)
        .bind(HISTORY_LIMIT)
        .fetch_all(self.pool)
        .await
    }
}

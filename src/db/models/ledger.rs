use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// Every balance-affecting event appends exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    ViewReward,
    Transfer,
    Fee,
    AdminAdjust,
    QuizPlayReward,
    WeeklyQuizReward,
}

/// Immutable ledger row. Rows are appended inside the same transaction as the
/// balance write they record and never touched again.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PointTransaction {
    pub id: String,
    pub from_account: Option<AccountId>,
    pub to_account: AccountId,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: NaiveDateTime,
}

impl PointTransaction {
    pub fn new(
        kind: TransactionKind,
        from_account: Option<AccountId>,
        to_account: AccountId,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from_account,
            to_account,
            amount,
            kind,
            description: description.into(),
            created_at: Utc::now().naive_utc(),
        }
    }
}

/// History row as presented to the caller, with usernames joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub from_username: Option<String>,
    pub to_username: String,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: NaiveDateTime,
}

use std::sync::LazyLock;

use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::util::env::{self, Var};
use crate::var;

pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::PgError;
    pub use crate::db::db_pool;

    pub use crate::db::models::account::{Account, AccountId};
    pub use crate::db::models::ledger::{HistoryEntry, PointTransaction, TransactionKind};
    pub use crate::db::models::quiz::{
        GameMode, Quiz, QuizId, QuizQuestion, QuizScore, WeeklyLeaderboardEntry,
        WeeklyRewardMarker, WeeklyWinner,
    };
    pub use crate::db::models::worksheet::{StorageKind, Worksheet, WorksheetId, WorksheetSummary};
    pub use crate::db::models::{PaginatedResponse, Pagination};

    pub use crate::db::repositories::Repository;
    pub use crate::db::repositories::Tx;
    pub use crate::db::repositories::account::AccountRepository;
    pub use crate::db::repositories::follow::FollowRepository;
    pub use crate::db::repositories::ledger::LedgerRepository;
    pub use crate::db::repositories::quiz::QuizRepository;
    pub use crate::db::repositories::worksheet::WorksheetRepository;
}

static DB_POOL: LazyLock<OnceCell<Db>> = LazyLock::new(OnceCell::new);
pub async fn db_pool() -> PgResult<&'static PgPool> {
    Ok(&DB_POOL
        .get_or_try_init(|| async { Db::new_pool().await })
        .await?
        .pool)
}

struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new_pool() -> PgResult<Self> {
        let db_url = var!(Var::DatabaseUrl).await?;
        let pool = sqlx::PgPool::connect(db_url).await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }
}

pub type PgResult<T> = core::result::Result<T, PgError>;

#[derive(Debug, Error)]
pub enum PgError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    EnvError(#[from] env::EnvErr),
}

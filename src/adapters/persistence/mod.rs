use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::ledger::LedgerStore,
};

pub mod catalog;
pub mod inventory;
pub mod order;
pub mod subscription;
pub mod vault;
pub mod webhook_event;

pub type PgTx = Transaction<'static, Postgres>;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresPersistence {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        self.pool.begin().await.map_err(AppError::from)
    }

    async fn commit(&self, tx: PgTx) -> AppResult<()> {
        tx.commit().await.map_err(AppError::from)
    }
}

/// Render status literals for an `IN (...)` guard. Values come from enum
/// `as_str`, never from user input. An empty set matches nothing.
pub(crate) fn status_list(statuses: &[&'static str]) -> String {
    if statuses.is_empty() {
        return "NULL".to_string();
    }
    statuses
        .iter()
        .map(|s| format!("'{}'", s))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // PostgreSQL unique violation
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::InvalidInput("A record with this value already exists".into())
                }
                // PostgreSQL foreign key violation
                else if msg.contains("violates foreign key") {
                    AppError::InvalidInput("Referenced record not found".into())
                } else {
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}

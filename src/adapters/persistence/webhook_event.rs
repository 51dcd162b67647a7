use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{
    adapters::persistence::{PgTx, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::EventLedger,
};

/// Key for the transaction-scoped advisory lock that serializes deliveries of
/// the same event id.
pub fn advisory_lock_key(event_id: &str) -> i64 {
    let digest = Sha256::digest(event_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[async_trait]
impl EventLedger for PostgresPersistence {
    async fn event_exists(&self, tx: &mut PgTx, event_id: &str) -> AppResult<bool> {
        // Held until commit/rollback; a concurrent duplicate blocks here and
        // then sees the committed row.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_lock_key(event_id))
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM webhook_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(AppError::from)?;

        Ok(exists)
    }

    async fn mark_seen(&self, tx: &mut PgTx, event_id: &str, event_type: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }
}

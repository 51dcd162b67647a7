use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{PgTx, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::VaultLinkage,
    domain::entities::vault::VaultedPaymentMethod,
};

fn row_to_vault(row: sqlx::postgres::PgRow) -> VaultedPaymentMethod {
    VaultedPaymentMethod {
        user_id: row.get("user_id"),
        vault_id: row.get("vault_id"),
        provider: row.get("provider"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl VaultLinkage for PostgresPersistence {
    async fn upsert_vault(
        &self,
        tx: &mut PgTx,
        user_id: &str,
        vault_id: &str,
        provider: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vaulted_payment_methods (user_id, vault_id, provider)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, vault_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id)
        .bind(vault_id)
        .bind(provider)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn latest_vault(
        &self,
        tx: &mut PgTx,
        user_id: &str,
        provider: &str,
    ) -> AppResult<Option<VaultedPaymentMethod>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, vault_id, provider, created_at, updated_at
            FROM vaulted_payment_methods
            WHERE user_id = $1 AND provider = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_vault))
    }
}

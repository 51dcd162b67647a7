use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{PgTx, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::InventoryLedger,
    domain::entities::{inventory::InventoryEntry, order::OrderItem},
};

#[async_trait]
impl InventoryLedger for PostgresPersistence {
    async fn credit_all(&self, tx: &mut PgTx, user_id: &str, items: &[OrderItem]) -> AppResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO user_inventory (user_id, product_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, product_id) DO UPDATE SET
                    quantity = user_inventory.quantity + EXCLUDED.quantity,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(user_id)
            .bind(&item.product_id)
            .bind(i64::from(item.quantity))
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        }
        Ok(())
    }

    async fn inventory_for_user(
        &self,
        tx: &mut PgTx,
        user_id: &str,
    ) -> AppResult<Vec<InventoryEntry>> {
        let rows = sqlx::query(
            "SELECT product_id, quantity FROM user_inventory WHERE user_id = $1 ORDER BY product_id",
        )
        .bind(user_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| InventoryEntry {
                product_id: row.get("product_id"),
                quantity: row.get("quantity"),
            })
            .collect())
    }
}

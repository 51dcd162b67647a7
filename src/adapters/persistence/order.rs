use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{PgTx, PostgresPersistence, status_list},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::OrderLedger,
    domain::entities::{
        order::{NewOrder, Order, OrderItem, OrderStatus},
        transition::Transition,
    },
};

fn row_to_order(row: sqlx::postgres::PgRow) -> Order {
    Order {
        order_id: row.get("order_id"),
        user_id: row.get("user_id"),
        merchant_id: row.get("merchant_id"),
        status: row.get("status"),
        amount: row.get("amount"),
        currency: row.get("currency"),
        payer_id: row.get("payer_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_item(row: sqlx::postgres::PgRow) -> OrderItem {
    OrderItem {
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        currency: row.get("currency"),
    }
}

const SELECT_COLS: &str =
    "order_id, user_id, merchant_id, status, amount, currency, payer_id, created_at, updated_at";

#[async_trait]
impl OrderLedger for PostgresPersistence {
    async fn create_order(&self, tx: &mut PgTx, order: &NewOrder) -> AppResult<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (order_id, user_id, merchant_id, status, amount, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&order.order_id)
        .bind(&order.user_id)
        .bind(&order.merchant_id)
        .bind(order.status)
        .bind(order.amount)
        .bind(&order.currency)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_order(row))
    }

    async fn find_order(&self, tx: &mut PgTx, order_id: &str) -> AppResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE order_id = $1",
            SELECT_COLS
        ))
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_order))
    }

    async fn transition_order(
        &self,
        tx: &mut PgTx,
        order_id: &str,
        target: OrderStatus,
        payer_id: Option<&str>,
    ) -> AppResult<Transition<Order>> {
        let sources: Vec<&'static str> = OrderStatus::sources_for(target)
            .iter()
            .map(|s| s.as_str())
            .collect();

        // Single guarded statement: concurrent transitions resolve on the row lock.
        let updated = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = $2,
                payer_id = COALESCE($3, payer_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1 AND status IN ({})
            RETURNING {}
            "#,
            status_list(&sources),
            SELECT_COLS
        ))
        .bind(order_id)
        .bind(target)
        .bind(payer_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        if let Some(row) = updated {
            return Ok(Transition::Applied(row_to_order(row)));
        }

        match self.find_order(tx, order_id).await? {
            Some(order) => Ok(Transition::Unchanged(order)),
            None => Err(AppError::NotFound),
        }
    }

    async fn create_items(
        &self,
        tx: &mut PgTx,
        order_id: &str,
        items: &[OrderItem],
    ) -> AppResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price, currency)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.currency)
            .execute(&mut **tx)
            .await
            .map_err(AppError::from)?;
        }
        Ok(())
    }

    async fn get_items(&self, tx: &mut PgTx, order_id: &str) -> AppResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price, currency
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_item).collect())
    }
}

use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::{PgTx, PostgresPersistence, status_list},
    app_error::{AppError, AppResult},
    application::use_cases::ledger::SubscriptionLedger,
    domain::entities::{
        subscription::{BillingPeriod, NewSubscription, Subscription, SubscriptionStatus},
        transition::Transition,
    },
};

fn row_to_subscription(row: sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        subscription_id: row.get("subscription_id"),
        plan_id: row.get("plan_id"),
        user_id: row.get("user_id"),
        merchant_id: row.get("merchant_id"),
        product_code: row.get("product_code"),
        status: row.get("status"),
        start_time: row.get("start_time"),
        next_billing_time: row.get("next_billing_time"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = "subscription_id, plan_id, user_id, merchant_id, product_code, status, \
     start_time, next_billing_time, created_at, updated_at";

#[async_trait]
impl SubscriptionLedger for PostgresPersistence {
    async fn create_subscription(
        &self,
        tx: &mut PgTx,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (subscription_id, plan_id, user_id, merchant_id, product_code, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(&subscription.subscription_id)
        .bind(&subscription.plan_id)
        .bind(&subscription.user_id)
        .bind(&subscription.merchant_id)
        .bind(&subscription.product_code)
        .bind(SubscriptionStatus::Pending)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row_to_subscription(row))
    }

    async fn find_by_remote_id(
        &self,
        tx: &mut PgTx,
        subscription_id: &str,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE subscription_id = $1",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_subscription))
    }

    async fn find_active_for_user(
        &self,
        tx: &mut PgTx,
        user_id: &str,
        merchant_id: &str,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE user_id = $1 AND merchant_id = $2 AND status = $3
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(user_id)
        .bind(merchant_id)
        .bind(SubscriptionStatus::Active)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_subscription))
    }

    async fn transition_subscription(
        &self,
        tx: &mut PgTx,
        subscription_id: &str,
        target: SubscriptionStatus,
        period: Option<BillingPeriod>,
    ) -> AppResult<Transition<Subscription>> {
        let sources: Vec<&'static str> = SubscriptionStatus::sources_for(target)
            .iter()
            .map(|s| s.as_str())
            .collect();
        let period = period.unwrap_or_default();

        let updated = sqlx::query(&format!(
            r#"
            UPDATE subscriptions
            SET status = $2,
                start_time = COALESCE($3, start_time),
                next_billing_time = COALESCE($4, next_billing_time),
                updated_at = CURRENT_TIMESTAMP
            WHERE subscription_id = $1 AND status IN ({})
            RETURNING {}
            "#,
            status_list(&sources),
            SELECT_COLS
        ))
        .bind(subscription_id)
        .bind(target)
        .bind(period.start_time)
        .bind(period.next_billing_time)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::from)?;

        if let Some(row) = updated {
            return Ok(Transition::Applied(row_to_subscription(row)));
        }

        match self.find_by_remote_id(tx, subscription_id).await? {
            Some(subscription) => Ok(Transition::Unchanged(subscription)),
            None => Err(AppError::NotFound),
        }
    }
}

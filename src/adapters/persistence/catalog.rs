use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::catalog::{MerchantDirectory, ProductCatalog},
    domain::entities::{merchant::MerchantCredentials, product::Product},
};

fn row_to_product(row: sqlx::postgres::PgRow) -> Product {
    Product {
        sku: row.get("sku"),
        name: row.get("name"),
        description: row.get("description"),
        unit_price: row.get("unit_price"),
        currency: row.get("currency"),
        product_type: row.get("product_type"),
    }
}

#[async_trait]
impl ProductCatalog for PostgresPersistence {
    async fn find_many(&self, skus: &[String]) -> AppResult<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT sku, name, description, unit_price, currency, product_type
            FROM products
            WHERE sku = ANY($1)
            "#,
        )
        .bind(skus)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_product).collect())
    }
}

#[async_trait]
impl MerchantDirectory for PostgresPersistence {
    async fn credentials(&self, merchant_id: &str) -> AppResult<MerchantCredentials> {
        let row = sqlx::query("SELECT merchant_id, access_token FROM merchants WHERE merchant_id = $1")
            .bind(merchant_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::NotFound)?;

        let token: String = row.get("access_token");
        Ok(MerchantCredentials {
            merchant_id: row.get("merchant_id"),
            access_token: SecretString::new(token.into()),
        })
    }

    async fn plan_for_product(
        &self,
        merchant_id: &str,
        product_code: &str,
    ) -> AppResult<Option<String>> {
        let plan_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT paypal_plan_id FROM subscription_plans
            WHERE merchant_id = $1 AND product_code = $2
            "#,
        )
        .bind(merchant_id)
        .bind(product_code)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(plan_id)
    }
}

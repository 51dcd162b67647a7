use async_trait::async_trait;

use crate::{
    app_error::AppResult,
    domain::entities::{merchant::MerchantCredentials, product::Product},
};

/// Read-only product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Returns the products found for `skus`; missing skus are simply absent.
    async fn find_many(&self, skus: &[String]) -> AppResult<Vec<Product>>;
}

/// Read-only directory of connected merchants.
#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    /// Fails with `NotFound` for an unknown merchant.
    async fn credentials(&self, merchant_id: &str) -> AppResult<MerchantCredentials>;

    /// Provider plan id the merchant configured for a subscription product.
    async fn plan_for_product(
        &self,
        merchant_id: &str,
        product_code: &str,
    ) -> AppResult<Option<String>>;
}

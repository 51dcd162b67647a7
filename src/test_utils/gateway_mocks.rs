//! Fake payment gateway, catalog and merchant directory.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        catalog::{MerchantDirectory, ProductCatalog},
        payment_gateway::{
            ApprovalOrder, CaptureResult, OrderRequest, PaymentGatewayPort, RemoteSubscription,
            WebhookHeaders,
        },
    },
    domain::entities::{merchant::MerchantCredentials, product::Product},
};

use super::factories::seed_products;

// ============================================================================
// FakeGateway
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    CreateOrder {
        user_id: String,
        currency: String,
        amount_minor: i64,
    },
    CreateVaultOrder {
        vault_id: String,
        amount_minor: i64,
    },
    Capture {
        order_id: String,
    },
    VerifySignature,
    CreateSubscription {
        plan_id: String,
        user_id: String,
    },
    CancelSubscription {
        subscription_id: String,
    },
}

#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<GatewayCall>>,
    seq: AtomicUsize,
    reject_signatures: AtomicBool,
    failure: Mutex<Option<String>>,
    capture_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature verification fails from now on.
    pub fn reject_signatures(&self) {
        self.reject_signatures.store(true, Ordering::SeqCst);
    }

    /// Every remote call except signature verification fails with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Captures are recorded, then wait for a permit on the returned gate
    /// before answering.
    pub fn gate_captures(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.capture_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than signature verification.
    pub fn remote_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != GatewayCall::VerifySignature)
            .collect()
    }

    fn record(&self, call: GatewayCall) -> AppResult<usize> {
        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::Gateway(message));
        }
        Ok(self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl PaymentGatewayPort for FakeGateway {
    async fn create_order_for_approval(
        &self,
        _merchant: &MerchantCredentials,
        request: &OrderRequest,
    ) -> AppResult<ApprovalOrder> {
        let n = self.record(GatewayCall::CreateOrder {
            user_id: request.user_id.clone(),
            currency: request.currency.clone(),
            amount_minor: request.amount_minor,
        })?;
        let order_id = format!("ORDER-{}", n);
        Ok(ApprovalOrder {
            approval_url: format!("https://paypal.test/checkoutnow?token={}", order_id),
            order_id,
        })
    }

    async fn create_order_with_vault(
        &self,
        _merchant: &MerchantCredentials,
        request: &OrderRequest,
        vault_id: &str,
    ) -> AppResult<String> {
        let n = self.record(GatewayCall::CreateVaultOrder {
            vault_id: vault_id.to_string(),
            amount_minor: request.amount_minor,
        })?;
        Ok(format!("ORDER-{}", n))
    }

    async fn capture_order(
        &self,
        _merchant: &MerchantCredentials,
        order_id: &str,
    ) -> AppResult<CaptureResult> {
        let recorded = self.record(GatewayCall::Capture {
            order_id: order_id.to_string(),
        });
        let gate = self.capture_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        recorded?;
        Ok(CaptureResult {
            status: "COMPLETED".to_string(),
            payer_id: Some("PAYER-1".to_string()),
        })
    }

    async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        _body: &[u8],
    ) -> AppResult<()> {
        self.calls.lock().unwrap().push(GatewayCall::VerifySignature);
        if self.reject_signatures.load(Ordering::SeqCst) || !headers.is_complete() {
            return Err(AppError::UnauthorizedWebhook);
        }
        Ok(())
    }

    async fn create_subscription(
        &self,
        _merchant: &MerchantCredentials,
        plan_id: &str,
        user_id: &str,
    ) -> AppResult<RemoteSubscription> {
        let n = self.record(GatewayCall::CreateSubscription {
            plan_id: plan_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        let subscription_id = format!("I-SUB-{}", n);
        Ok(RemoteSubscription {
            approval_url: format!("https://paypal.test/subscribe?ba_token={}", subscription_id),
            subscription_id,
        })
    }

    async fn cancel_subscription(
        &self,
        _merchant: &MerchantCredentials,
        subscription_id: &str,
    ) -> AppResult<()> {
        self.record(GatewayCall::CancelSubscription {
            subscription_id: subscription_id.to_string(),
        })?;
        Ok(())
    }
}

// ============================================================================
// InMemoryCatalog
// ============================================================================

#[derive(Default)]
pub struct InMemoryCatalog {
    pub products: Mutex<HashMap<String, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// coin_100, coin_200 and the vip_monthly subscription product.
    pub fn seeded() -> Self {
        Self::with_products(seed_products())
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let map = products.into_iter().map(|p| (p.sku.clone(), p)).collect();
        Self {
            products: Mutex::new(map),
        }
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn find_many(&self, skus: &[String]) -> AppResult<Vec<Product>> {
        let products = self.products.lock().unwrap();
        Ok(skus
            .iter()
            .filter_map(|sku| products.get(sku).cloned())
            .collect())
    }
}

// ============================================================================
// InMemoryMerchants
// ============================================================================

#[derive(Default)]
pub struct InMemoryMerchants {
    pub merchants: Mutex<HashMap<String, String>>,
    pub plans: Mutex<HashMap<(String, String), String>>,
}

impl InMemoryMerchants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merchant(self, merchant_id: &str) -> Self {
        self.merchants
            .lock()
            .unwrap()
            .insert(merchant_id.to_string(), format!("token-{}", merchant_id));
        self
    }

    pub fn with_plan(self, merchant_id: &str, product_code: &str, plan_id: &str) -> Self {
        self.plans.lock().unwrap().insert(
            (merchant_id.to_string(), product_code.to_string()),
            plan_id.to_string(),
        );
        self
    }
}

#[async_trait]
impl MerchantDirectory for InMemoryMerchants {
    async fn credentials(&self, merchant_id: &str) -> AppResult<MerchantCredentials> {
        let token = self
            .merchants
            .lock()
            .unwrap()
            .get(merchant_id)
            .cloned()
            .ok_or(AppError::NotFound)?;
        Ok(MerchantCredentials {
            merchant_id: merchant_id.to_string(),
            access_token: SecretString::new(token.into()),
        })
    }

    async fn plan_for_product(
        &self,
        merchant_id: &str,
        product_code: &str,
    ) -> AppResult<Option<String>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .get(&(merchant_id.to_string(), product_code.to_string()))
            .cloned())
    }
}

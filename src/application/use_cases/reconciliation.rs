use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            catalog::{MerchantDirectory, ProductCatalog},
            payment_gateway::{
                ApprovalOrder, OrderRequest, PaymentGatewayPort, RemoteSubscription,
                WebhookHeaders,
            },
        },
        pricing::{PricedOrder, normalize_line_items, price_line_items},
        use_cases::ledger::Ledgers,
    },
    domain::entities::{
        inventory::InventoryEntry,
        order::{NewOrder, Order, OrderItem, OrderStatus},
        product::LineItem,
        subscription::{NewSubscription, Subscription},
        transition::Transition,
        vault::PAYPAL_PROVIDER,
        webhook::{ParsedWebhook, ProviderEvent},
    },
};

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(20);

/// What a webhook delivery did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A state transition was applied.
    Applied,
    /// Recognized event, but the guarded transition was a no-op.
    Unchanged,
    /// Unrecognized event type, recorded as seen.
    Ignored,
    /// Event id already processed.
    Duplicate,
}

/// Orchestrates purchases and subscriptions against the payment gateway and
/// applies provider webhooks to the local ledger exactly once.
pub struct ReconciliationEngine<S: Ledgers> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGatewayPort>,
    catalog: Arc<dyn ProductCatalog>,
    merchants: Arc<dyn MerchantDirectory>,
    webhook_timeout: Duration,
}

impl<S: Ledgers> ReconciliationEngine<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGatewayPort>,
        catalog: Arc<dyn ProductCatalog>,
        merchants: Arc<dyn MerchantDirectory>,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
            merchants,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    // ========================================================================
    // Purchases
    // ========================================================================

    /// Create a remote order for buyer approval and record it as `CREATED`.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn initiate_purchase(
        &self,
        user_id: &str,
        merchant_id: &str,
        items: &[LineItem],
    ) -> AppResult<ApprovalOrder> {
        let priced = self.price(items).await?;
        let merchant = self.merchants.credentials(merchant_id).await?;

        let request = OrderRequest {
            user_id: user_id.to_string(),
            currency: priced.currency.clone(),
            amount_minor: priced.amount,
        };
        let remote = self
            .gateway
            .create_order_for_approval(&merchant, &request)
            .await?;

        self.record_order(
            NewOrder {
                order_id: remote.order_id.clone(),
                user_id: user_id.to_string(),
                merchant_id: merchant_id.to_string(),
                status: OrderStatus::Created,
                amount: priced.amount,
                currency: priced.currency,
            },
            &priced.items,
        )
        .await?;

        info!(order_id = %remote.order_id, amount = priced.amount, "Order created");
        Ok(remote)
    }

    /// Charge the user's vaulted payment method. The provider captures
    /// immediately, so the order is recorded as `COMPLETED`.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn initiate_vaulted_purchase(
        &self,
        user_id: &str,
        merchant_id: &str,
        items: &[LineItem],
    ) -> AppResult<String> {
        let priced = self.price(items).await?;

        let vault_id = {
            let mut tx = self.store.begin().await?;
            let vault_id = self.store.resolve_vault(&mut tx, user_id).await?;
            self.store.commit(tx).await?;
            vault_id
        };

        let merchant = self.merchants.credentials(merchant_id).await?;
        let request = OrderRequest {
            user_id: user_id.to_string(),
            currency: priced.currency.clone(),
            amount_minor: priced.amount,
        };
        let order_id = self
            .gateway
            .create_order_with_vault(&merchant, &request, &vault_id)
            .await?;

        self.record_order(
            NewOrder {
                order_id: order_id.clone(),
                user_id: user_id.to_string(),
                merchant_id: merchant_id.to_string(),
                status: OrderStatus::Completed,
                amount: priced.amount,
                currency: priced.currency,
            },
            &priced.items,
        )
        .await?;

        info!(order_id = %order_id, amount = priced.amount, "Vaulted order created");
        Ok(order_id)
    }

    /// Capture after the buyer returns from the approval page.
    ///
    /// A repeated redirect for an order that is already captured (or final)
    /// returns the order as-is without calling the gateway. If the gateway
    /// rejects the capture because a concurrent redirect already captured the
    /// order, the captured order is returned instead of the error.
    #[instrument(skip(self))]
    pub async fn capture_approved_order(&self, order_id: &str) -> AppResult<Order> {
        let order = self.load_order(order_id).await?;

        if !order.status.can_transition_to(OrderStatus::Completed) {
            debug!(status = %order.status, "Order past approval, skipping capture");
            return Ok(order);
        }

        let merchant = self.merchants.credentials(&order.merchant_id).await?;
        let capture = match self.gateway.capture_order(&merchant, order_id).await {
            Ok(capture) => capture,
            Err(e @ AppError::Gateway(_)) => {
                let current = self.load_order(order_id).await?;
                if current.status.is_captured() {
                    debug!(
                        status = %current.status,
                        "Capture rejected, order already captured concurrently"
                    );
                    return Ok(current);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        if capture.status != "COMPLETED" {
            warn!(remote_status = %capture.status, "Capture accepted with non-final status");
        }

        let mut tx = self.store.begin().await?;
        let transition = self
            .store
            .mark_completed(&mut tx, order_id, capture.payer_id.as_deref())
            .await?;
        self.store.commit(tx).await?;

        if !transition.is_applied() {
            debug!(status = %transition.get().status, "Order moved on during capture");
        }
        Ok(transition.into_inner())
    }

    async fn load_order(&self, order_id: &str) -> AppResult<Order> {
        let mut tx = self.store.begin().await?;
        let order = self.store.find_order(&mut tx, order_id).await?;
        self.store.commit(tx).await?;
        order.ok_or(AppError::NotFound)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Create a remote subscription for buyer approval and record it as `PENDING`.
    #[instrument(skip(self))]
    pub async fn subscribe_to_plan(
        &self,
        user_id: &str,
        merchant_id: &str,
        product_code: &str,
    ) -> AppResult<RemoteSubscription> {
        let plan_id = self
            .merchants
            .plan_for_product(merchant_id, product_code)
            .await?
            .ok_or(AppError::NotFound)?;
        let merchant = self.merchants.credentials(merchant_id).await?;

        let remote = self
            .gateway
            .create_subscription(&merchant, &plan_id, user_id)
            .await?;

        let new_subscription = NewSubscription {
            subscription_id: remote.subscription_id.clone(),
            plan_id,
            user_id: user_id.to_string(),
            merchant_id: merchant_id.to_string(),
            product_code: product_code.to_string(),
        };
        let persisted = async {
            let mut tx = self.store.begin().await?;
            self.store
                .create_subscription(&mut tx, &new_subscription)
                .await?;
            self.store.commit(tx).await
        }
        .await;
        if let Err(e) = persisted {
            error!(
                subscription_id = %remote.subscription_id,
                error = %e,
                "Remote subscription created but local record failed"
            );
            return Err(e);
        }

        info!(subscription_id = %remote.subscription_id, "Subscription pending approval");
        Ok(remote)
    }

    /// Cancel the user's active subscription remotely, then locally.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        user_id: &str,
        merchant_id: &str,
    ) -> AppResult<Subscription> {
        let subscription = {
            let mut tx = self.store.begin().await?;
            let sub = self
                .store
                .find_active_for_user(&mut tx, user_id, merchant_id)
                .await?
                .ok_or(AppError::NotFound)?;
            self.store.commit(tx).await?;
            sub
        };

        let merchant = self.merchants.credentials(merchant_id).await?;
        self.gateway
            .cancel_subscription(&merchant, &subscription.subscription_id)
            .await?;

        let mut tx = self.store.begin().await?;
        let transition = self
            .store
            .cancel(&mut tx, &subscription.subscription_id)
            .await?;
        self.store.commit(tx).await?;

        info!(subscription_id = %subscription.subscription_id, "Subscription cancelled");
        Ok(transition.into_inner())
    }

    /// Return-url landing after subscription approval. Activation only
    /// happens through the provider webhook.
    #[instrument(skip(self))]
    pub async fn subscription_return(&self, subscription_id: &str) -> AppResult<Subscription> {
        let mut tx = self.store.begin().await?;
        let subscription = self
            .store
            .find_by_remote_id(&mut tx, subscription_id)
            .await?;
        self.store.commit(tx).await?;
        subscription.ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn has_active_subscription(
        &self,
        user_id: &str,
        merchant_id: &str,
    ) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        let active = self
            .store
            .find_active_for_user(&mut tx, user_id, merchant_id)
            .await?;
        self.store.commit(tx).await?;
        Ok(active.is_some())
    }

    // ========================================================================
    // Vault and inventory queries
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn has_saved_payment_method(&self, user_id: &str) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        let vault = self
            .store
            .latest_vault(&mut tx, user_id, PAYPAL_PROVIDER)
            .await?;
        self.store.commit(tx).await?;
        Ok(vault.is_some())
    }

    #[instrument(skip(self))]
    pub async fn inventory_for_user(&self, user_id: &str) -> AppResult<Vec<InventoryEntry>> {
        let mut tx = self.store.begin().await?;
        let entries = self.store.inventory_for_user(&mut tx, user_id).await?;
        self.store.commit(tx).await?;
        Ok(entries)
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Verify, parse and apply one provider notification.
    ///
    /// The idempotency check, the ledger mutation and the idempotency marker
    /// commit together; any failure rolls all three back so a redelivery
    /// reprocesses the event.
    #[instrument(skip(self, headers, body), fields(transmission_id = ?headers.transmission_id))]
    pub async fn handle_webhook(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> AppResult<WebhookOutcome> {
        if let Err(e) = self.gateway.verify_webhook_signature(headers, body).await {
            if matches!(e, AppError::UnauthorizedWebhook) {
                warn!(
                    transmission_id = ?headers.transmission_id,
                    cert_url = ?headers.cert_url,
                    "SECURITY: rejected webhook with invalid signature"
                );
            }
            return Err(e);
        }

        let parsed = ParsedWebhook::from_slice(body).map_err(AppError::InvalidInput)?;
        debug!(event_id = %parsed.event_id, event_type = %parsed.kind, "Webhook verified");

        let outcome = tokio::time::timeout(self.webhook_timeout, self.apply_webhook(&parsed))
            .await
            .map_err(|_| {
                error!(event_id = %parsed.event_id, "Webhook processing timed out");
                AppError::Internal("webhook processing timed out".to_string())
            })??;

        info!(
            event_id = %parsed.event_id,
            event_type = %parsed.kind,
            outcome = ?outcome,
            "Webhook processed"
        );
        Ok(outcome)
    }

    async fn apply_webhook(&self, parsed: &ParsedWebhook) -> AppResult<WebhookOutcome> {
        let mut tx = self.store.begin().await?;

        if self.store.event_exists(&mut tx, &parsed.event_id).await? {
            debug!(event_id = %parsed.event_id, "Duplicate webhook event");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.dispatch(&mut tx, &parsed.event).await?;

        let inserted = self
            .store
            .mark_seen(&mut tx, &parsed.event_id, parsed.kind.as_str())
            .await?;
        if !inserted {
            // Lost a race with a concurrent delivery; drop our writes.
            debug!(event_id = %parsed.event_id, "Webhook event recorded concurrently");
            return Ok(WebhookOutcome::Duplicate);
        }

        self.store.commit(tx).await?;
        Ok(outcome)
    }

    async fn dispatch(&self, tx: &mut S::Tx, event: &ProviderEvent) -> AppResult<WebhookOutcome> {
        match event {
            ProviderEvent::CaptureCompleted { order_id, custom_id } => {
                self.on_capture_completed(tx, order_id, custom_id.as_deref())
                    .await
            }
            ProviderEvent::CaptureDenied { order_id } => {
                let transition = self.store.mark_failed(tx, order_id).await?;
                if transition.is_applied() {
                    warn!(order_id = %order_id, "Capture denied, order failed");
                }
                Ok(outcome_of(&transition))
            }
            ProviderEvent::OrderApproved { order_id } => {
                let transition = self.store.mark_approved(tx, order_id).await?;
                Ok(outcome_of(&transition))
            }
            ProviderEvent::VaultTokenCreated { vault_id, order_id } => {
                let order = self
                    .store
                    .find_order(tx, order_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                self.store
                    .upsert_vault(tx, &order.user_id, vault_id, PAYPAL_PROVIDER)
                    .await?;
                info!(user_id = %order.user_id, "Payment method vaulted");
                Ok(WebhookOutcome::Applied)
            }
            ProviderEvent::SubscriptionActivated {
                subscription_id,
                period,
            } => {
                let transition = self.store.activate(tx, subscription_id, *period).await?;
                if !transition.is_applied() {
                    debug!(
                        status = %transition.get().status,
                        "Activation ignored for subscription outside PENDING"
                    );
                }
                Ok(outcome_of(&transition))
            }
            ProviderEvent::SubscriptionCancelled { subscription_id } => {
                let transition = self.store.cancel(tx, subscription_id).await?;
                Ok(outcome_of(&transition))
            }
            ProviderEvent::Unknown => Ok(WebhookOutcome::Ignored),
        }
    }

    async fn on_capture_completed(
        &self,
        tx: &mut S::Tx,
        order_id: &str,
        custom_id: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let order = match self.store.mark_paid(tx, order_id).await? {
            Transition::Applied(order) => order,
            Transition::Unchanged(order) if order.status == OrderStatus::Created => {
                // Sync capture has not committed yet; let the provider redeliver.
                return Err(AppError::OrderNotCaptured(order_id.to_string()));
            }
            Transition::Unchanged(order) => {
                debug!(status = %order.status, "Capture completion ignored");
                return Ok(WebhookOutcome::Unchanged);
            }
        };

        if let Some(custom_id) = custom_id.filter(|c| *c != order.user_id) {
            warn!(
                order_user = %order.user_id,
                custom_id = %custom_id,
                "Capture custom_id does not match order owner, crediting order owner"
            );
        }

        let items: Vec<OrderItem> = self.store.get_items(tx, order_id).await?;
        self.store.credit_all(tx, &order.user_id, &items).await?;

        info!(user_id = %order.user_id, items = items.len(), "Order paid, inventory credited");
        Ok(WebhookOutcome::Applied)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn price(&self, items: &[LineItem]) -> AppResult<PricedOrder> {
        let items = normalize_line_items(items)?;
        let skus: Vec<String> = items.iter().map(|i| i.sku.clone()).collect();
        let products = self.catalog.find_many(&skus).await?;
        price_line_items(&items, &products)
    }

    async fn record_order(&self, order: NewOrder, items: &[OrderItem]) -> AppResult<()> {
        let order_id = order.order_id.clone();
        let result = async {
            let mut tx = self.store.begin().await?;
            self.store.create_order(&mut tx, &order).await?;
            self.store.create_items(&mut tx, &order_id, items).await?;
            self.store.commit(tx).await
        }
        .await;

        if let Err(e) = &result {
            error!(
                order_id = %order_id,
                error = %e,
                "Remote order created but local record failed"
            );
        }
        result
    }
}

fn outcome_of<T>(transition: &Transition<T>) -> WebhookOutcome {
    if transition.is_applied() {
        WebhookOutcome::Applied
    } else {
        WebhookOutcome::Unchanged
    }
}

//! Ledger capabilities.
//!
//! Every mutation runs inside a transaction handle obtained from
//! [`LedgerStore::begin`]. Dropping a handle without [`LedgerStore::commit`]
//! rolls it back.

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        inventory::InventoryEntry,
        order::{NewOrder, Order, OrderItem, OrderStatus},
        subscription::{BillingPeriod, NewSubscription, Subscription, SubscriptionStatus},
        transition::Transition,
        vault::{PAYPAL_PROVIDER, VaultedPaymentMethod},
    },
};

#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> AppResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> AppResult<()>;
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
pub trait OrderLedger: LedgerStore {
    async fn create_order(&self, tx: &mut Self::Tx, order: &NewOrder) -> AppResult<Order>;

    async fn find_order(&self, tx: &mut Self::Tx, order_id: &str) -> AppResult<Option<Order>>;

    /// Move the order into `target` if its current status is one of
    /// `OrderStatus::sources_for(target)`. `NotFound` for unknown ids.
    async fn transition_order(
        &self,
        tx: &mut Self::Tx,
        order_id: &str,
        target: OrderStatus,
        payer_id: Option<&str>,
    ) -> AppResult<Transition<Order>>;

    async fn create_items(
        &self,
        tx: &mut Self::Tx,
        order_id: &str,
        items: &[OrderItem],
    ) -> AppResult<()>;

    async fn get_items(&self, tx: &mut Self::Tx, order_id: &str) -> AppResult<Vec<OrderItem>>;

    async fn mark_approved(
        &self,
        tx: &mut Self::Tx,
        order_id: &str,
    ) -> AppResult<Transition<Order>> {
        self.transition_order(tx, order_id, OrderStatus::Approved, None)
            .await
    }

    async fn mark_completed(
        &self,
        tx: &mut Self::Tx,
        order_id: &str,
        payer_id: Option<&str>,
    ) -> AppResult<Transition<Order>> {
        self.transition_order(tx, order_id, OrderStatus::Completed, payer_id)
            .await
    }

    async fn mark_paid(&self, tx: &mut Self::Tx, order_id: &str) -> AppResult<Transition<Order>> {
        self.transition_order(tx, order_id, OrderStatus::Paid, None)
            .await
    }

    async fn mark_failed(&self, tx: &mut Self::Tx, order_id: &str) -> AppResult<Transition<Order>> {
        self.transition_order(tx, order_id, OrderStatus::Failed, None)
            .await
    }

    async fn is_paid(&self, tx: &mut Self::Tx, order_id: &str) -> AppResult<bool> {
        Ok(self
            .find_order(tx, order_id)
            .await?
            .is_some_and(|o| o.status == OrderStatus::Paid))
    }
}

// ============================================================================
// Vaulted payment methods
// ============================================================================

#[async_trait]
pub trait VaultLinkage: LedgerStore {
    /// Insert or touch a vault token; repeated calls are idempotent.
    async fn upsert_vault(
        &self,
        tx: &mut Self::Tx,
        user_id: &str,
        vault_id: &str,
        provider: &str,
    ) -> AppResult<()>;

    /// Most recently updated vault token for the user and provider.
    async fn latest_vault(
        &self,
        tx: &mut Self::Tx,
        user_id: &str,
        provider: &str,
    ) -> AppResult<Option<VaultedPaymentMethod>>;

    async fn resolve_vault(&self, tx: &mut Self::Tx, user_id: &str) -> AppResult<String> {
        self.latest_vault(tx, user_id, PAYPAL_PROVIDER)
            .await?
            .map(|v| v.vault_id)
            .ok_or(AppError::NoVaultedMethod)
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[async_trait]
pub trait SubscriptionLedger: LedgerStore {
    /// Record a freshly created remote subscription as `PENDING`.
    async fn create_subscription(
        &self,
        tx: &mut Self::Tx,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription>;

    async fn find_by_remote_id(
        &self,
        tx: &mut Self::Tx,
        subscription_id: &str,
    ) -> AppResult<Option<Subscription>>;

    async fn find_active_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: &str,
        merchant_id: &str,
    ) -> AppResult<Option<Subscription>>;

    /// Guarded status change. `period` is written only when the transition applies.
    async fn transition_subscription(
        &self,
        tx: &mut Self::Tx,
        subscription_id: &str,
        target: SubscriptionStatus,
        period: Option<BillingPeriod>,
    ) -> AppResult<Transition<Subscription>>;

    async fn activate(
        &self,
        tx: &mut Self::Tx,
        subscription_id: &str,
        period: BillingPeriod,
    ) -> AppResult<Transition<Subscription>> {
        self.transition_subscription(tx, subscription_id, SubscriptionStatus::Active, Some(period))
            .await
    }

    async fn cancel(
        &self,
        tx: &mut Self::Tx,
        subscription_id: &str,
    ) -> AppResult<Transition<Subscription>> {
        self.transition_subscription(tx, subscription_id, SubscriptionStatus::Cancelled, None)
            .await
    }
}

// ============================================================================
// Webhook idempotency
// ============================================================================

#[async_trait]
pub trait EventLedger: LedgerStore {
    /// Also serializes concurrent deliveries of the same event id for the
    /// rest of the transaction where the backend supports it.
    async fn event_exists(&self, tx: &mut Self::Tx, event_id: &str) -> AppResult<bool>;

    /// Returns false if the id was already recorded.
    async fn mark_seen(&self, tx: &mut Self::Tx, event_id: &str, event_type: &str)
    -> AppResult<bool>;
}

// ============================================================================
// Inventory
// ============================================================================

#[async_trait]
pub trait InventoryLedger: LedgerStore {
    /// Add every item's quantity to the user's holdings.
    async fn credit_all(&self, tx: &mut Self::Tx, user_id: &str, items: &[OrderItem])
    -> AppResult<()>;

    async fn inventory_for_user(
        &self,
        tx: &mut Self::Tx,
        user_id: &str,
    ) -> AppResult<Vec<InventoryEntry>>;
}

/// Everything the reconciliation engine needs from storage.
pub trait Ledgers:
    OrderLedger + VaultLinkage + SubscriptionLedger + EventLedger + InventoryLedger
{
}

impl<T> Ledgers for T where
    T: OrderLedger + VaultLinkage + SubscriptionLedger + EventLedger + InventoryLedger
{
}

//! In-memory ledger store.
//!
//! A transaction holds the state lock from `begin` until it is committed or
//! dropped, so transactions are fully serialized. Writes go to a staged copy
//! that replaces the shared state only on commit.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap, hash_map::Entry};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::ledger::{
        EventLedger, InventoryLedger, LedgerStore, OrderLedger, SubscriptionLedger, VaultLinkage,
    },
    domain::entities::{
        inventory::InventoryEntry,
        order::{NewOrder, Order, OrderItem, OrderStatus},
        subscription::{BillingPeriod, NewSubscription, Subscription, SubscriptionStatus},
        transition::Transition,
        vault::VaultedPaymentMethod,
    },
};

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub orders: HashMap<String, Order>,
    pub items: HashMap<String, Vec<OrderItem>>,
    /// Oldest first; an upsert moves the token to the end.
    pub vaults: Vec<VaultedPaymentMethod>,
    pub subscriptions: HashMap<String, Subscription>,
    pub events: HashMap<String, String>,
    pub inventory: BTreeMap<(String, String), i64>,
}

impl LedgerState {
    pub fn with_order(mut self, order: Order, items: Vec<OrderItem>) -> Self {
        self.items.insert(order.order_id.clone(), items);
        self.orders.insert(order.order_id.clone(), order);
        self
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions
            .insert(subscription.subscription_id.clone(), subscription);
        self
    }

    pub fn with_vault(mut self, user_id: &str, vault_id: &str) -> Self {
        self.vaults.push(VaultedPaymentMethod {
            user_id: user_id.to_string(),
            vault_id: vault_id.to_string(),
            provider: "paypal".to_string(),
            created_at: now(),
            updated_at: now(),
        });
        self
    }

    pub fn quantity(&self, user_id: &str, product_id: &str) -> i64 {
        self.inventory
            .get(&(user_id.to_string(), product_id.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    fail_inventory_credit: AtomicBool,
    event_insert_race: AtomicBool,
    commits: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            ..Self::default()
        }
    }

    /// Make every subsequent `credit_all` fail.
    pub fn fail_inventory_credit(&self) {
        self.fail_inventory_credit.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent `mark_seen` find the id already recorded, as when
    /// a concurrent delivery inserted it after our existence check.
    pub fn race_event_insert(&self) {
        self.event_insert_race.store(true, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    type Tx = InMemoryTx;

    async fn begin(&self) -> AppResult<InMemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }

    async fn commit(&self, tx: InMemoryTx) -> AppResult<()> {
        let InMemoryTx { mut guard, staged } = tx;
        *guard = staged;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OrderLedger for InMemoryLedger {
    async fn create_order(&self, tx: &mut InMemoryTx, order: &NewOrder) -> AppResult<Order> {
        match tx.staged.orders.entry(order.order_id.clone()) {
            Entry::Occupied(_) => Err(AppError::InvalidInput("Resource already exists".into())),
            Entry::Vacant(slot) => {
                let created = Order {
                    order_id: order.order_id.clone(),
                    user_id: order.user_id.clone(),
                    merchant_id: order.merchant_id.clone(),
                    status: order.status,
                    amount: order.amount,
                    currency: order.currency.clone(),
                    payer_id: None,
                    created_at: now(),
                    updated_at: now(),
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn find_order(&self, tx: &mut InMemoryTx, order_id: &str) -> AppResult<Option<Order>> {
        Ok(tx.staged.orders.get(order_id).cloned())
    }

    async fn transition_order(
        &self,
        tx: &mut InMemoryTx,
        order_id: &str,
        target: OrderStatus,
        payer_id: Option<&str>,
    ) -> AppResult<Transition<Order>> {
        let order = tx
            .staged
            .orders
            .get_mut(order_id)
            .ok_or(AppError::NotFound)?;

        if !order.status.can_transition_to(target) {
            return Ok(Transition::Unchanged(order.clone()));
        }

        order.status = target;
        if let Some(payer_id) = payer_id {
            order.payer_id = Some(payer_id.to_string());
        }
        order.updated_at = now();
        Ok(Transition::Applied(order.clone()))
    }

    async fn create_items(
        &self,
        tx: &mut InMemoryTx,
        order_id: &str,
        items: &[OrderItem],
    ) -> AppResult<()> {
        if !tx.staged.orders.contains_key(order_id) {
            return Err(AppError::InvalidInput("order does not exist".into()));
        }
        tx.staged
            .items
            .entry(order_id.to_string())
            .or_default()
            .extend_from_slice(items);
        Ok(())
    }

    async fn get_items(&self, tx: &mut InMemoryTx, order_id: &str) -> AppResult<Vec<OrderItem>> {
        Ok(tx.staged.items.get(order_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl VaultLinkage for InMemoryLedger {
    async fn upsert_vault(
        &self,
        tx: &mut InMemoryTx,
        user_id: &str,
        vault_id: &str,
        provider: &str,
    ) -> AppResult<()> {
        let vaults = &mut tx.staged.vaults;
        let existing = vaults
            .iter()
            .position(|v| v.user_id == user_id && v.vault_id == vault_id);

        let mut vault = match existing {
            Some(i) => vaults.remove(i),
            None => VaultedPaymentMethod {
                user_id: user_id.to_string(),
                vault_id: vault_id.to_string(),
                provider: provider.to_string(),
                created_at: now(),
                updated_at: now(),
            },
        };
        vault.updated_at = now();
        vaults.push(vault);
        Ok(())
    }

    async fn latest_vault(
        &self,
        tx: &mut InMemoryTx,
        user_id: &str,
        provider: &str,
    ) -> AppResult<Option<VaultedPaymentMethod>> {
        Ok(tx
            .staged
            .vaults
            .iter()
            .rev()
            .find(|v| v.user_id == user_id && v.provider == provider)
            .cloned())
    }
}

#[async_trait]
impl SubscriptionLedger for InMemoryLedger {
    async fn create_subscription(
        &self,
        tx: &mut InMemoryTx,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription> {
        match tx
            .staged
            .subscriptions
            .entry(subscription.subscription_id.clone())
        {
            Entry::Occupied(_) => Err(AppError::InvalidInput("Resource already exists".into())),
            Entry::Vacant(slot) => {
                let created = Subscription {
                    subscription_id: subscription.subscription_id.clone(),
                    plan_id: subscription.plan_id.clone(),
                    user_id: subscription.user_id.clone(),
                    merchant_id: subscription.merchant_id.clone(),
                    product_code: subscription.product_code.clone(),
                    status: SubscriptionStatus::Pending,
                    start_time: None,
                    next_billing_time: None,
                    created_at: now(),
                    updated_at: now(),
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }

    async fn find_by_remote_id(
        &self,
        tx: &mut InMemoryTx,
        subscription_id: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(tx.staged.subscriptions.get(subscription_id).cloned())
    }

    async fn find_active_for_user(
        &self,
        tx: &mut InMemoryTx,
        user_id: &str,
        merchant_id: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(tx
            .staged
            .subscriptions
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.merchant_id == merchant_id
                    && s.status == SubscriptionStatus::Active
            })
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn transition_subscription(
        &self,
        tx: &mut InMemoryTx,
        subscription_id: &str,
        target: SubscriptionStatus,
        period: Option<BillingPeriod>,
    ) -> AppResult<Transition<Subscription>> {
        let subscription = tx
            .staged
            .subscriptions
            .get_mut(subscription_id)
            .ok_or(AppError::NotFound)?;

        if !subscription.status.can_transition_to(target) {
            return Ok(Transition::Unchanged(subscription.clone()));
        }

        subscription.status = target;
        if let Some(period) = period {
            subscription.start_time = period.start_time.or(subscription.start_time);
            subscription.next_billing_time =
                period.next_billing_time.or(subscription.next_billing_time);
        }
        subscription.updated_at = now();
        Ok(Transition::Applied(subscription.clone()))
    }
}

#[async_trait]
impl EventLedger for InMemoryLedger {
    async fn event_exists(&self, tx: &mut InMemoryTx, event_id: &str) -> AppResult<bool> {
        Ok(tx.staged.events.contains_key(event_id))
    }

    async fn mark_seen(
        &self,
        tx: &mut InMemoryTx,
        event_id: &str,
        event_type: &str,
    ) -> AppResult<bool> {
        if self.event_insert_race.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match tx.staged.events.entry(event_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event_type.to_string());
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn credit_all(
        &self,
        tx: &mut InMemoryTx,
        user_id: &str,
        items: &[OrderItem],
    ) -> AppResult<()> {
        if self.fail_inventory_credit.load(Ordering::SeqCst) {
            return Err(AppError::Database("inventory write failed".into()));
        }
        for item in items {
            *tx.staged
                .inventory
                .entry((user_id.to_string(), item.product_id.clone()))
                .or_insert(0) += i64::from(item.quantity);
        }
        Ok(())
    }

    async fn inventory_for_user(
        &self,
        tx: &mut InMemoryTx,
        user_id: &str,
    ) -> AppResult<Vec<InventoryEntry>> {
        Ok(tx
            .staged
            .inventory
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, product_id), quantity)| InventoryEntry {
                product_id: product_id.clone(),
                quantity: *quantity,
            })
            .collect())
    }
}

//! Test data factories.
//!
//! Each factory builds a complete, valid object with sensible defaults; the
//! closure parameter overrides specific fields.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use crate::{
    application::ports::payment_gateway::WebhookHeaders,
    domain::entities::{
        order::{Order, OrderItem, OrderStatus},
        product::{Product, ProductType},
        subscription::{Subscription, SubscriptionStatus},
    },
};

pub const TEST_USER: &str = "user-1";
pub const TEST_MERCHANT: &str = "merchant-1";
pub const TEST_PLAN: &str = "P-VIP-MONTHLY";

pub fn test_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn seed_products() -> Vec<Product> {
    vec![
        create_test_product(|p| {
            p.sku = "coin_100".to_string();
            p.unit_price = 100;
        }),
        create_test_product(|p| {
            p.sku = "coin_200".to_string();
            p.unit_price = 200;
        }),
        create_test_product(|p| {
            p.sku = "vip_monthly".to_string();
            p.unit_price = 999;
            p.product_type = ProductType::Subscription;
        }),
    ]
}

pub fn create_test_product(overrides: impl FnOnce(&mut Product)) -> Product {
    let mut product = Product {
        sku: "coin_100".to_string(),
        name: "Coins".to_string(),
        description: None,
        unit_price: 100,
        currency: "USD".to_string(),
        product_type: ProductType::OneTime,
    };
    overrides(&mut product);
    product
}

pub fn create_test_order(overrides: impl FnOnce(&mut Order)) -> Order {
    let mut order = Order {
        order_id: "ORDER-TEST".to_string(),
        user_id: TEST_USER.to_string(),
        merchant_id: TEST_MERCHANT.to_string(),
        status: OrderStatus::Created,
        amount: 200,
        currency: "USD".to_string(),
        payer_id: None,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut order);
    order
}

pub fn create_test_item(product_id: &str, quantity: i32, unit_price: i64) -> OrderItem {
    OrderItem {
        product_id: product_id.to_string(),
        quantity,
        unit_price,
        currency: "USD".to_string(),
    }
}

pub fn create_test_subscription(overrides: impl FnOnce(&mut Subscription)) -> Subscription {
    let mut subscription = Subscription {
        subscription_id: "I-SUB-TEST".to_string(),
        plan_id: TEST_PLAN.to_string(),
        user_id: TEST_USER.to_string(),
        merchant_id: TEST_MERCHANT.to_string(),
        product_code: "vip_monthly".to_string(),
        status: SubscriptionStatus::Pending,
        start_time: None,
        next_billing_time: None,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut subscription);
    subscription
}

// ============================================================================
// Webhook payloads
// ============================================================================

pub fn signed_headers() -> WebhookHeaders {
    WebhookHeaders {
        auth_algo: Some("SHA256withRSA".to_string()),
        cert_url: Some("https://api.sandbox.paypal.com/v1/notifications/certs/CERT".to_string()),
        transmission_id: Some("69cd13f0-d67a-11e5-baa3-778b53f4ae55".to_string()),
        transmission_sig: Some("signature".to_string()),
        transmission_time: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

fn event(event_id: &str, event_type: &str, resource: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "event_type": event_type,
        "resource_type": "capture",
        "resource": resource,
    }))
    .unwrap()
}

pub fn capture_completed_event(event_id: &str, order_id: &str, custom_id: &str) -> Vec<u8> {
    event(
        event_id,
        "PAYMENT.CAPTURE.COMPLETED",
        json!({
            "id": format!("CAP-{}", order_id),
            "status": "COMPLETED",
            "custom_id": custom_id,
            "supplementary_data": { "related_ids": { "order_id": order_id } }
        }),
    )
}

pub fn capture_denied_event(event_id: &str, order_id: &str) -> Vec<u8> {
    event(
        event_id,
        "PAYMENT.CAPTURE.DENIED",
        json!({
            "id": format!("CAP-{}", order_id),
            "status": "DECLINED",
            "supplementary_data": { "related_ids": { "order_id": order_id } }
        }),
    )
}

pub fn order_approved_event(event_id: &str, order_id: &str) -> Vec<u8> {
    event(
        event_id,
        "CHECKOUT.ORDER.APPROVED",
        json!({ "id": order_id, "status": "APPROVED" }),
    )
}

pub fn vault_token_event(event_id: &str, vault_id: &str, order_id: &str) -> Vec<u8> {
    event(
        event_id,
        "VAULT.PAYMENT-TOKEN.CREATED",
        json!({ "id": vault_id, "metadata": { "order_id": order_id } }),
    )
}

pub fn subscription_activated_event(event_id: &str, subscription_id: &str) -> Vec<u8> {
    event(
        event_id,
        "BILLING.SUBSCRIPTION.ACTIVATED",
        json!({
            "id": subscription_id,
            "status": "ACTIVE",
            "custom_id": TEST_USER,
            "start_time": "2024-03-01T10:00:00Z",
            "billing_info": { "next_billing_time": "2024-04-01T10:00:00Z" }
        }),
    )
}

pub fn subscription_cancelled_event(event_id: &str, subscription_id: &str) -> Vec<u8> {
    event(
        event_id,
        "BILLING.SUBSCRIPTION.CANCELLED",
        json!({ "id": subscription_id, "status": "CANCELLED" }),
    )
}

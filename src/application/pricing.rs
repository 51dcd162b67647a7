//! Order pricing.
//!
//! Amounts are integers in minor currency units. Nothing here touches floats.

use std::collections::HashMap;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        order::OrderItem,
        product::{LineItem, Product, ProductType},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub amount: i64,
    pub currency: String,
    pub items: Vec<OrderItem>,
}

/// Reject non-positive quantities and merge repeated skus, keeping first-seen order.
pub fn normalize_line_items(items: &[LineItem]) -> AppResult<Vec<LineItem>> {
    if items.is_empty() {
        return Err(AppError::InvalidInput("no line items".to_string()));
    }

    let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::InvalidQuantity(item.sku.clone()));
        }
        match index.get(item.sku.as_str()) {
            Some(&i) => {
                merged[i].quantity = merged[i].quantity.checked_add(item.quantity).ok_or_else(
                    || AppError::InvalidInput(format!("quantity overflow for {}", item.sku)),
                )?;
            }
            None => {
                index.insert(item.sku.as_str(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    Ok(merged)
}

/// Price normalized line items against catalog products.
///
/// Subscription products are dropped from one-time orders. The remaining
/// products must share one currency.
pub fn price_line_items(items: &[LineItem], products: &[Product]) -> AppResult<PricedOrder> {
    let by_sku: HashMap<&str, &Product> = products.iter().map(|p| (p.sku.as_str(), p)).collect();

    let mut priced = Vec::with_capacity(items.len());
    let mut currency: Option<&str> = None;
    let mut amount: i64 = 0;

    for item in items {
        let product = by_sku
            .get(item.sku.as_str())
            .ok_or_else(|| AppError::ProductNotFound(item.sku.clone()))?;

        if product.product_type == ProductType::Subscription {
            tracing::warn!(sku = %product.sku, "Skipping subscription product in one-time order");
            continue;
        }

        match currency {
            None => currency = Some(product.currency.as_str()),
            Some(c) if c != product.currency => {
                return Err(AppError::InvalidInput(format!(
                    "mixed currencies in order: {} and {}",
                    c, product.currency
                )));
            }
            Some(_) => {}
        }

        let order_item = OrderItem {
            product_id: product.sku.clone(),
            quantity: item.quantity,
            unit_price: product.unit_price,
            currency: product.currency.clone(),
        };
        amount = order_item
            .line_total()
            .and_then(|t| amount.checked_add(t))
            .ok_or_else(|| AppError::InvalidInput("order amount overflow".to_string()))?;
        priced.push(order_item);
    }

    let Some(currency) = currency else {
        return Err(AppError::InvalidInput("no purchasable items".to_string()));
    };

    Ok(PricedOrder {
        amount,
        currency: currency.to_string(),
        items: priced,
    })
}

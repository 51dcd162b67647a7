use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

use super::subscription::BillingPeriod;

/// PayPal webhook event types this service reacts to.
///
/// Every other type maps to `Unknown` and is acknowledged without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayPalEventKind {
    CaptureCompleted,
    CaptureDenied,
    OrderApproved,
    VaultTokenCreated,
    SubscriptionActivated,
    SubscriptionCancelled,
    Unknown(String),
}

impl PayPalEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "PAYMENT.CAPTURE.COMPLETED" => Self::CaptureCompleted,
            "PAYMENT.CAPTURE.DENIED" => Self::CaptureDenied,
            "CHECKOUT.ORDER.APPROVED" => Self::OrderApproved,
            "VAULT.PAYMENT-TOKEN.CREATED" => Self::VaultTokenCreated,
            "BILLING.SUBSCRIPTION.ACTIVATED" => Self::SubscriptionActivated,
            "BILLING.SUBSCRIPTION.CANCELLED" => Self::SubscriptionCancelled,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CaptureCompleted => "PAYMENT.CAPTURE.COMPLETED",
            Self::CaptureDenied => "PAYMENT.CAPTURE.DENIED",
            Self::OrderApproved => "CHECKOUT.ORDER.APPROVED",
            Self::VaultTokenCreated => "VAULT.PAYMENT-TOKEN.CREATED",
            Self::SubscriptionActivated => "BILLING.SUBSCRIPTION.ACTIVATED",
            Self::SubscriptionCancelled => "BILLING.SUBSCRIPTION.CANCELLED",
            Self::Unknown(s) => s,
        }
    }

    pub fn known_types() -> &'static [PayPalEventKind] {
        &[
            Self::CaptureCompleted,
            Self::CaptureDenied,
            Self::OrderApproved,
            Self::VaultTokenCreated,
            Self::SubscriptionActivated,
            Self::SubscriptionCancelled,
        ]
    }
}

impl fmt::Display for PayPalEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub resource: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RelatedIds {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct SupplementaryData {
    related_ids: RelatedIds,
}

#[derive(Debug, Deserialize)]
struct CaptureResource {
    #[serde(default)]
    custom_id: Option<String>,
    supplementary_data: SupplementaryData,
}

#[derive(Debug, Deserialize)]
struct VaultMetadata {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct VaultTokenResource {
    id: String,
    metadata: VaultMetadata,
}

#[derive(Debug, Deserialize)]
struct BillingInfo {
    #[serde(default)]
    next_billing_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResource {
    id: String,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    billing_info: Option<BillingInfo>,
}

#[derive(Debug, Deserialize)]
struct OrderResource {
    id: String,
}

// ============================================================================
// Typed events
// ============================================================================

/// A provider notification reduced to the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    CaptureCompleted {
        order_id: String,
        custom_id: Option<String>,
    },
    CaptureDenied {
        order_id: String,
    },
    OrderApproved {
        order_id: String,
    },
    VaultTokenCreated {
        vault_id: String,
        order_id: String,
    },
    SubscriptionActivated {
        subscription_id: String,
        period: BillingPeriod,
    },
    SubscriptionCancelled {
        subscription_id: String,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWebhook {
    pub event_id: String,
    pub kind: PayPalEventKind,
    pub event: ProviderEvent,
}

impl ParsedWebhook {
    /// Parse a raw webhook body. Recognized event types must carry a
    /// well-formed resource; unknown types only need an id and a type.
    pub fn from_slice(body: &[u8]) -> Result<Self, String> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| format!("malformed webhook envelope: {}", e))?;

        if envelope.id.trim().is_empty() {
            return Err("webhook event id is empty".to_string());
        }

        let kind = PayPalEventKind::parse(&envelope.event_type);
        let event = Self::parse_resource(&kind, envelope.resource)?;

        Ok(Self {
            event_id: envelope.id,
            kind,
            event,
        })
    }

    fn parse_resource(
        kind: &PayPalEventKind,
        resource: serde_json::Value,
    ) -> Result<ProviderEvent, String> {
        fn typed<T: serde::de::DeserializeOwned>(
            kind: &PayPalEventKind,
            resource: serde_json::Value,
        ) -> Result<T, String> {
            serde_json::from_value(resource)
                .map_err(|e| format!("malformed {} resource: {}", kind, e))
        }

        let event = match kind {
            PayPalEventKind::CaptureCompleted => {
                let r: CaptureResource = typed(kind, resource)?;
                ProviderEvent::CaptureCompleted {
                    order_id: r.supplementary_data.related_ids.order_id,
                    custom_id: r.custom_id,
                }
            }
            PayPalEventKind::CaptureDenied => {
                let r: CaptureResource = typed(kind, resource)?;
                ProviderEvent::CaptureDenied {
                    order_id: r.supplementary_data.related_ids.order_id,
                }
            }
            PayPalEventKind::OrderApproved => {
                let r: OrderResource = typed(kind, resource)?;
                ProviderEvent::OrderApproved { order_id: r.id }
            }
            PayPalEventKind::VaultTokenCreated => {
                let r: VaultTokenResource = typed(kind, resource)?;
                ProviderEvent::VaultTokenCreated {
                    vault_id: r.id,
                    order_id: r.metadata.order_id,
                }
            }
            PayPalEventKind::SubscriptionActivated => {
                let r: SubscriptionResource = typed(kind, resource)?;
                ProviderEvent::SubscriptionActivated {
                    subscription_id: r.id,
                    period: BillingPeriod {
                        start_time: r.start_time.map(|t| t.naive_utc()),
                        next_billing_time: r
                            .billing_info
                            .and_then(|b| b.next_billing_time)
                            .map(|t| t.naive_utc()),
                    },
                }
            }
            PayPalEventKind::SubscriptionCancelled => {
                let r: SubscriptionResource = typed(kind, resource)?;
                ProviderEvent::SubscriptionCancelled {
                    subscription_id: r.id,
                }
            }
            PayPalEventKind::Unknown(_) => ProviderEvent::Unknown,
        };

        Ok(event)
    }
}

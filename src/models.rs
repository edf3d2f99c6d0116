use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::store::StoreError;

// ============================================================================
// Domain Models
// ============================================================================

/// Lifecycle stage of an order. Stages only ever move forward one at a time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// The stage that follows this one, `None` once delivered
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            other => Err(StoreError::Validation(format!("unknown order status: {}", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub product: String,
    pub quantity: u32,
    pub price: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied attributes of a new order
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub customer_name: String,
    pub product: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
}

impl OrderDraft {
    pub fn new(customer_name: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            product: product.into(),
            quantity: None,
            price: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Zero counts as "not given", same as an absent quantity
    pub fn quantity_or_default(&self) -> u32 {
        match self.quantity {
            Some(q) if q > 0 => q,
            _ => 1,
        }
    }

    pub fn price_or_default(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }

    /// Reject drafts no store should persist
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.customer_name.trim().is_empty() {
            return Err(StoreError::Validation("customerName is required".to_string()));
        }
        if self.product.trim().is_empty() {
            return Err(StoreError::Validation("product is required".to_string()));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(StoreError::Validation(format!("invalid price: {}", price)));
            }
        }
        Ok(())
    }

    /// Build the record a store persists for this draft
    pub fn into_order(self, id: Uuid, now: DateTime<Utc>) -> Order {
        let quantity = self.quantity_or_default();
        let price = self.price_or_default();
        Order {
            id,
            customer_name: self.customer_name,
            product: self.product,
            quantity,
            price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Subscriber Notifications
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum OrderEvent {
    OrderCreated {
        order: Order,
    },
    #[serde(rename_all = "camelCase")]
    StatusUpdated {
        order_id: Uuid,
        new_status: OrderStatus,
        order: Order,
    },
}

impl OrderEvent {
    pub fn created(order: Order) -> Self {
        OrderEvent::OrderCreated { order }
    }

    pub fn status_updated(order: Order) -> Self {
        OrderEvent::StatusUpdated {
            order_id: order.id,
            new_status: order.status,
            order,
        }
    }

    /// Wire name of the event as seen by subscribers
    pub fn event_name(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "orderCreated",
            OrderEvent::StatusUpdated { .. } => "statusUpdated",
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::OrderCreated { order } => order,
            OrderEvent::StatusUpdated { order, .. } => order,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_progression_order() {
        assert_eq!(OrderStatus::Pending.next(), Some(OrderStatus::Processing));
        assert_eq!(OrderStatus::Processing.next(), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::Shipped.next(), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::Delivered.next(), None);
        assert!(OrderStatus::Pending < OrderStatus::Delivered);
    }

    #[test]
    fn test_status_text_forms() {
        assert_eq!(serde_json::to_string(&OrderStatus::Shipped).unwrap(), "\"shipped\"");
        assert_eq!("processing".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_draft_defaults() {
        let draft = OrderDraft::new("Alice", "Widget");
        assert_eq!(draft.quantity_or_default(), 1);
        assert_eq!(draft.price_or_default(), 0.0);

        let zero = OrderDraft::new("Alice", "Widget").with_quantity(0);
        assert_eq!(zero.quantity_or_default(), 1);
    }

    #[test]
    fn test_draft_validation() {
        assert!(OrderDraft::new("Alice", "Widget").with_price(9.99).validate().is_ok());
        assert!(matches!(
            OrderDraft::new("  ", "Widget").validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(OrderDraft::new("Alice", "").validate().is_err());
        assert!(OrderDraft::new("Alice", "Widget").with_price(-1.0).validate().is_err());
        assert!(OrderDraft::new("Alice", "Widget").with_price(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_draft_deserializes_optional_fields() {
        let draft: OrderDraft =
            serde_json::from_str(r#"{"customerName":"Bob","product":"Gadget"}"#).unwrap();
        assert_eq!(draft.customer_name, "Bob");
        assert_eq!(draft.quantity, None);
        assert_eq!(draft.price, None);
    }

    #[test]
    fn test_status_updated_wire_shape() {
        let now = Utc::now();
        let mut order = OrderDraft::new("Alice", "Widget").into_order(Uuid::new_v4(), now);
        order.status = OrderStatus::Processing;

        let event = OrderEvent::status_updated(order.clone());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "statusUpdated");
        assert_eq!(json["orderId"], order.id.to_string());
        assert_eq!(json["newStatus"], "processing");
        assert_eq!(json["order"]["customerName"], "Alice");
        assert_eq!(event.event_name(), "statusUpdated");
    }

    #[test]
    fn test_order_created_wire_shape() {
        let order = OrderDraft::new("Alice", "Widget")
            .with_quantity(2)
            .into_order(Uuid::new_v4(), Utc::now());
        let json = serde_json::to_value(OrderEvent::created(order)).unwrap();

        assert_eq!(json["event"], "orderCreated");
        assert_eq!(json["order"]["status"], "pending");
        assert_eq!(json["order"]["quantity"], 2);
    }
}

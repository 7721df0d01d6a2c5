//! Order ledger models and DTOs.
//!
//! Orders snapshot `total_price` at creation time. After creation only
//! `status` and `payment_status` are mutable, and only by an administrator.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::product::ProductSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GuestOrder {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Order lifecycle. Administrators may set any value; no transition rules
/// are enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpaid => write!(f, "unpaid"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown payment status: {}", s)),
        }
    }
}

/// A successful payment moves a pending order into processing; it never
/// regresses an order that is already further along, and marking an order
/// unpaid leaves its status untouched.
pub fn status_after_payment(current: OrderStatus, payment: PaymentStatus) -> OrderStatus {
    match (payment, current) {
        (PaymentStatus::Paid, OrderStatus::Pending) => OrderStatus::Processing,
        (_, current) => current,
    }
}

/// Flat row produced by joining an order with its product.
#[derive(Debug, FromRow)]
pub struct OrderProductRow {
    pub id: String,
    pub customer_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
    pub product_name: String,
    pub product_price: i64,
    pub product_image: Option<String>,
}

/// Order joined with a projection of its product for list views.
#[derive(Debug, Serialize)]
pub struct OrderWithProduct {
    pub id: String,
    pub customer_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
    pub product: ProductSummary,
}

impl From<OrderProductRow> for OrderWithProduct {
    fn from(row: OrderProductRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            quantity: row.quantity,
            total_price: row.total_price,
            status: row.status,
            payment_status: row.payment_status,
            shipping_address: row.shipping_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: ProductSummary {
                id: row.product_id,
                name: row.product_name,
                price: row.product_price,
                image: row.product_image,
            },
        }
    }
}

/// Flat row for the admin view of all orders, joined with the customer.
#[derive(Debug, FromRow, Serialize)]
pub struct OrderWithCustomer {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Flat row joining a guest order with its product.
#[derive(Debug, FromRow)]
pub struct GuestOrderProductRow {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub product_id: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
    pub product_name: String,
    pub product_price: i64,
    pub product_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GuestOrderWithProduct {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub shipping_address: String,
    pub created_at: String,
    pub updated_at: String,
    pub product: ProductSummary,
}

impl From<GuestOrderProductRow> for GuestOrderWithProduct {
    fn from(row: GuestOrderProductRow) -> Self {
        Self {
            id: row.id,
            guest_name: row.guest_name,
            guest_email: row.guest_email,
            guest_phone: row.guest_phone,
            quantity: row.quantity,
            total_price: row.total_price,
            status: row.status,
            payment_status: row.payment_status,
            shipping_address: row.shipping_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: ProductSummary {
                id: row.product_id,
                name: row.product_name,
                price: row.product_price,
                image: row.product_image,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        for s in ["pending", "processing", "shipped", "delivered", "cancelled"] {
            assert_eq!(OrderStatus::from_str(s).unwrap().to_string(), s);
        }
        assert!(OrderStatus::from_str("refunded").is_err());
        assert!(OrderStatus::from_str("Pending").is_err());
    }

    #[test]
    fn test_payment_status_round_trip() {
        for s in ["unpaid", "paid", "failed"] {
            assert_eq!(PaymentStatus::from_str(s).unwrap().to_string(), s);
        }
        assert!(PaymentStatus::from_str("refunded").is_err());
    }

    #[test]
    fn test_paid_forces_pending_to_processing() {
        assert_eq!(
            status_after_payment(OrderStatus::Pending, PaymentStatus::Paid),
            OrderStatus::Processing
        );
    }

    #[test]
    fn test_paid_never_regresses_later_statuses() {
        for current in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status_after_payment(current, PaymentStatus::Paid), current);
        }
    }

    #[test]
    fn test_unpaid_leaves_status_untouched() {
        for current in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            assert_eq!(
                status_after_payment(current, PaymentStatus::Unpaid),
                current
            );
        }
    }
}

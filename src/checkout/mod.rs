//! Checkout orchestration.
//!
//! A checkout converts a catalog selection into a persisted order plus a
//! stock decrement, executed as one transaction: either the order row exists
//! and the stock went down, or neither happened. The WhatsApp link is built
//! after commit and cannot fail the request.
//!
//! Stock correctness under concurrent checkouts does not rely on read
//! isolation: the decrement is a guarded single statement
//! (`... SET stock = stock - ? WHERE id = ? AND stock >= ?`), so the losing
//! transaction sees zero affected rows and rolls back.

pub mod whatsapp;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::db::{DbPool, Product};
use whatsapp::{GuestContact, PaymentMessage};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Insufficient stock for {product}")]
    InsufficientStock { product: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub items: Vec<CheckoutItem>,
}

#[derive(Debug, Deserialize)]
pub struct GuestCheckoutRequest {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub shipping_address: String,
    pub items: Vec<CheckoutItem>,
}

/// Product fields echoed back in the checkout response.
#[derive(Debug, Serialize)]
pub struct ProductLine {
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderReceipt {
    pub id: String,
    pub product: ProductLine,
    pub quantity: i64,
    pub total_price: i64,
    pub shipping_address: String,
    pub status: String,
    pub payment_status: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderReceipt,
    pub whatsapp_link: String,
}

#[derive(Debug, Serialize)]
pub struct GuestOrderReceipt {
    pub id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub product: ProductLine,
    pub quantity: i64,
    pub total_price: i64,
    pub shipping_address: String,
    pub status: String,
    pub payment_status: String,
}

#[derive(Debug, Serialize)]
pub struct GuestCheckoutOutcome {
    pub order: GuestOrderReceipt,
    pub whatsapp_link: String,
}

/// The request carries an items list, but checkout honors exactly one line
/// item: the first. Extra entries are ignored.
fn first_item<'a>(
    shipping_address: &str,
    items: &'a [CheckoutItem],
) -> Result<&'a CheckoutItem, CheckoutError> {
    if shipping_address.trim().is_empty() {
        return Err(CheckoutError::InvalidInput(
            "Shipping address is required".to_string(),
        ));
    }
    let item = items
        .first()
        .ok_or_else(|| CheckoutError::InvalidInput("At least one item is required".to_string()))?;
    if item.quantity < 1 {
        return Err(CheckoutError::InvalidInput(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(item)
}

/// Resolve the product, pre-check stock, and compute the price snapshot.
async fn price_item(
    pool: &DbPool,
    item: &CheckoutItem,
) -> Result<(Product, i64), CheckoutError> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(&item.product_id)
        .fetch_optional(pool)
        .await?;
    let product = product.ok_or(CheckoutError::ProductNotFound)?;

    if product.stock < item.quantity {
        return Err(CheckoutError::InsufficientStock {
            product: product.name,
        });
    }

    let total_price = product
        .price
        .checked_mul(item.quantity)
        .ok_or_else(|| CheckoutError::InvalidInput("Quantity is too large".to_string()))?;

    Ok((product, total_price))
}

/// Guarded decrement inside the caller's transaction. Zero affected rows
/// means another checkout took the stock first.
async fn decrement_stock(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    product_id: &str,
    quantity: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?")
        .bind(quantity)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Checkout for an authenticated customer.
pub async fn checkout(
    pool: &DbPool,
    store: &StoreConfig,
    customer_id: &str,
    req: &CheckoutRequest,
) -> Result<CheckoutOutcome, CheckoutError> {
    let item = first_item(&req.shipping_address, &req.items)?;
    let (product, total_price) = price_item(pool, item).await?;

    let order_id = uuid::Uuid::new_v4().to_string();
    let now = crate::utils::now_rfc3339();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders (id, customer_id, product_id, quantity, total_price, status, payment_status, shipping_address, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'pending', 'unpaid', ?, ?, ?)",
    )
    .bind(&order_id)
    .bind(customer_id)
    .bind(&product.id)
    .bind(item.quantity)
    .bind(total_price)
    .bind(req.shipping_address.trim())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    if !decrement_stock(&mut tx, &product.id, item.quantity).await? {
        tx.rollback().await?;
        return Err(CheckoutError::InsufficientStock {
            product: product.name,
        });
    }

    tx.commit().await?;

    tracing::info!(order_id = %order_id, product_id = %product.id, "Order created");

    let message = PaymentMessage {
        store_name: &store.name,
        order_id: &order_id,
        product_name: &product.name,
        quantity: item.quantity,
        total_price,
        shipping_address: req.shipping_address.trim(),
        guest: None,
    };
    let whatsapp_link = whatsapp::payment_link(&store.whatsapp_number, &message);

    Ok(CheckoutOutcome {
        order: OrderReceipt {
            id: order_id,
            product: ProductLine {
                name: product.name,
                price: product.price,
            },
            quantity: item.quantity,
            total_price,
            shipping_address: req.shipping_address.trim().to_string(),
            status: "pending".to_string(),
            payment_status: "unpaid".to_string(),
        },
        whatsapp_link,
    })
}

/// Checkout without an account; contact details travel inline on the order.
pub async fn guest_checkout(
    pool: &DbPool,
    store: &StoreConfig,
    req: &GuestCheckoutRequest,
) -> Result<GuestCheckoutOutcome, CheckoutError> {
    if req.guest_name.trim().is_empty()
        || req.guest_email.trim().is_empty()
        || req.guest_phone.trim().is_empty()
    {
        return Err(CheckoutError::InvalidInput(
            "All fields are required".to_string(),
        ));
    }

    let item = first_item(&req.shipping_address, &req.items)?;
    let (product, total_price) = price_item(pool, item).await?;

    let order_id = uuid::Uuid::new_v4().to_string();
    let now = crate::utils::now_rfc3339();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO guest_orders (id, guest_name, guest_email, guest_phone, product_id, quantity, total_price, status, payment_status, shipping_address, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', 'unpaid', ?, ?, ?)",
    )
    .bind(&order_id)
    .bind(req.guest_name.trim())
    .bind(req.guest_email.trim())
    .bind(req.guest_phone.trim())
    .bind(&product.id)
    .bind(item.quantity)
    .bind(total_price)
    .bind(req.shipping_address.trim())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    if !decrement_stock(&mut tx, &product.id, item.quantity).await? {
        tx.rollback().await?;
        return Err(CheckoutError::InsufficientStock {
            product: product.name,
        });
    }

    tx.commit().await?;

    tracing::info!(order_id = %order_id, product_id = %product.id, "Guest order created");

    let message = PaymentMessage {
        store_name: &store.name,
        order_id: &order_id,
        product_name: &product.name,
        quantity: item.quantity,
        total_price,
        shipping_address: req.shipping_address.trim(),
        guest: Some(GuestContact {
            name: req.guest_name.trim(),
            email: req.guest_email.trim(),
            phone: req.guest_phone.trim(),
        }),
    };
    let whatsapp_link = whatsapp::payment_link(&store.whatsapp_number, &message);

    Ok(GuestCheckoutOutcome {
        order: GuestOrderReceipt {
            id: order_id,
            guest_name: req.guest_name.trim().to_string(),
            guest_email: req.guest_email.trim().to_string(),
            guest_phone: req.guest_phone.trim().to_string(),
            product: ProductLine {
                name: product.name,
                price: product.price,
            },
            quantity: item.quantity,
            total_price,
            shipping_address: req.shipping_address.trim().to_string(),
            status: "pending".to_string(),
            payment_status: "unpaid".to_string(),
        },
        whatsapp_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db::{self, DbPool};

    async fn setup() -> (tempfile::TempDir, DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::init(tmp.path()).await.unwrap();
        (tmp, pool)
    }

    async fn insert_product(pool: &DbPool, name: &str, price: i64, stock: i64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = crate::utils::now_rfc3339();
        sqlx::query(
            "INSERT INTO products (id, name, price, stock, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(price)
        .bind(stock)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn insert_customer(pool: &DbPool) -> String {
        let user = crate::api::auth::insert_user(
            pool,
            "Customer",
            "customer@example.com",
            "hash",
            None,
            "user",
        )
        .await
        .unwrap();
        user.id
    }

    async fn stock_of(pool: &DbPool, product_id: &str) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT stock FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    async fn order_count(pool: &DbPool, table: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    fn request(product_id: &str, quantity: i64) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: "Jl. Sudirman No. 1".to_string(),
            items: vec![CheckoutItem {
                product_id: product_id.to_string(),
                quantity,
            }],
        }
    }

    #[tokio::test]
    async fn test_checkout_snapshots_price_and_decrements_stock() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "Headphone Pro", 899_000, 100).await;
        let customer_id = insert_customer(&pool).await;

        let outcome = checkout(&pool, &store, &customer_id, &request(&product_id, 3))
            .await
            .unwrap();

        assert_eq!(outcome.order.total_price, 3 * 899_000);
        assert_eq!(outcome.order.status, "pending");
        assert_eq!(outcome.order.payment_status, "unpaid");
        assert_eq!(stock_of(&pool, &product_id).await, 97);

        let row: (i64, String, String) = sqlx::query_as(
            "SELECT total_price, status, payment_status FROM orders WHERE id = ?",
        )
        .bind(&outcome.order.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(row.0, 3 * 899_000);
        assert_eq!(row.1, "pending");
        assert_eq!(row.2, "unpaid");
    }

    #[tokio::test]
    async fn test_oversold_checkout_changes_nothing() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "Smart Watch", 1_499_000, 2).await;
        let customer_id = insert_customer(&pool).await;

        let err = checkout(&pool, &store, &customer_id, &request(&product_id, 5))
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock { product } => assert_eq!(product, "Smart Watch"),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&pool, &product_id).await, 2);
        assert_eq!(order_count(&pool, "orders").await, 0);
    }

    #[tokio::test]
    async fn test_checkout_unknown_product() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let customer_id = insert_customer(&pool).await;

        let err = checkout(&pool, &store, &customer_id, &request("no-such-id", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound));
    }

    #[tokio::test]
    async fn test_checkout_rejects_bad_input() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "Phone Case", 149_000, 10).await;
        let customer_id = insert_customer(&pool).await;

        let mut req = request(&product_id, 1);
        req.shipping_address = "   ".to_string();
        assert!(matches!(
            checkout(&pool, &store, &customer_id, &req).await,
            Err(CheckoutError::InvalidInput(_))
        ));

        let mut req = request(&product_id, 1);
        req.items.clear();
        assert!(matches!(
            checkout(&pool, &store, &customer_id, &req).await,
            Err(CheckoutError::InvalidInput(_))
        ));

        let req = request(&product_id, 0);
        assert!(matches!(
            checkout(&pool, &store, &customer_id, &req).await,
            Err(CheckoutError::InvalidInput(_))
        ));

        assert_eq!(stock_of(&pool, &product_id).await, 10);
        assert_eq!(order_count(&pool, "orders").await, 0);
    }

    #[tokio::test]
    async fn test_checkout_honors_first_item_only() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let first = insert_product(&pool, "Wireless Mouse", 299_000, 10).await;
        let second = insert_product(&pool, "Keyboard Mechanical", 799_000, 10).await;
        let customer_id = insert_customer(&pool).await;

        let mut req = request(&first, 2);
        req.items.push(CheckoutItem {
            product_id: second.clone(),
            quantity: 4,
        });

        let outcome = checkout(&pool, &store, &customer_id, &req).await.unwrap();

        assert_eq!(outcome.order.product.name, "Wireless Mouse");
        assert_eq!(stock_of(&pool, &first).await, 8);
        assert_eq!(stock_of(&pool, &second).await, 10);
        assert_eq!(order_count(&pool, "orders").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_oversell_exactly_once() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "Laptop ABC", 12_999_000, 1).await;
        let customer_id = insert_customer(&pool).await;

        let a = {
            let pool = pool.clone();
            let store = store.clone();
            let customer_id = customer_id.clone();
            let req = request(&product_id, 1);
            tokio::spawn(async move { checkout(&pool, &store, &customer_id, &req).await })
        };
        let b = {
            let pool = pool.clone();
            let store = store.clone();
            let customer_id = customer_id.clone();
            let req = request(&product_id, 1);
            tokio::spawn(async move { checkout(&pool, &store, &customer_id, &req).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one checkout may win the last unit");

        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser.unwrap_err(),
            CheckoutError::InsufficientStock { .. }
        ));

        assert_eq!(stock_of(&pool, &product_id).await, 0);
        assert_eq!(order_count(&pool, "orders").await, 1);
    }

    #[tokio::test]
    async fn test_guest_checkout_scenario() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "Smartphone XYZ", 100_000, 10).await;

        let req = GuestCheckoutRequest {
            guest_name: "Budi".to_string(),
            guest_email: "budi@example.com".to_string(),
            guest_phone: "081234567890".to_string(),
            shipping_address: "Jl. A".to_string(),
            items: vec![CheckoutItem {
                product_id: product_id.clone(),
                quantity: 2,
            }],
        };

        let outcome = guest_checkout(&pool, &store, &req).await.unwrap();

        assert_eq!(outcome.order.total_price, 200_000);
        assert_eq!(outcome.order.guest_name, "Budi");
        assert_eq!(stock_of(&pool, &product_id).await, 8);
        assert_eq!(order_count(&pool, "guest_orders").await, 1);

        assert!(!outcome.whatsapp_link.is_empty());
        assert!(outcome.whatsapp_link.contains(&outcome.order.id));
        assert!(outcome.whatsapp_link.contains("Smartphone%20XYZ"));
    }

    #[tokio::test]
    async fn test_guest_checkout_requires_contact_fields() {
        let (_tmp, pool) = setup().await;
        let store = StoreConfig::default();
        let product_id = insert_product(&pool, "TWS Earbuds", 599_000, 10).await;

        let req = GuestCheckoutRequest {
            guest_name: "".to_string(),
            guest_email: "budi@example.com".to_string(),
            guest_phone: "081234567890".to_string(),
            shipping_address: "Jl. A".to_string(),
            items: vec![CheckoutItem {
                product_id: product_id.clone(),
                quantity: 1,
            }],
        };

        assert!(matches!(
            guest_checkout(&pool, &store, &req).await,
            Err(CheckoutError::InvalidInput(_))
        ));
        assert_eq!(stock_of(&pool, &product_id).await, 10);
    }
}

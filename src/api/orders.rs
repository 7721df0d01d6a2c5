//! Order and checkout endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use std::sync::Arc;

use super::auth::{AdminUser, AuthUser};
use super::error::{ApiError, ApiResponse};
use super::validation::{validate_email, validate_phone};
use crate::checkout::{
    self, CheckoutError, CheckoutOutcome, CheckoutRequest, GuestCheckoutOutcome,
    GuestCheckoutRequest,
};
use crate::db::{
    status_after_payment, GuestOrderProductRow, GuestOrderWithProduct, Order, OrderProductRow,
    OrderStatus, OrderWithCustomer, OrderWithProduct, PaymentStatus, UpdateOrderStatusRequest,
    UpdatePaymentStatusRequest,
};
use crate::AppState;

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidInput(msg) => ApiError::validation(msg),
            CheckoutError::ProductNotFound => ApiError::not_found("Product not found"),
            CheckoutError::InsufficientStock { product } => {
                ApiError::conflict(format!("Insufficient stock for {}", product))
            }
            CheckoutError::Database(e) => {
                tracing::error!("Checkout failed: {}", e);
                ApiError::internal("Failed to process checkout")
            }
        }
    }
}

/// Checkout for the authenticated customer
///
/// POST /api/orders/checkout
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutOutcome>>), ApiError> {
    let outcome = checkout::checkout(&state.db, &state.config.store, &auth.id, &req).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order created successfully", outcome),
    ))
}

/// Checkout without an account
///
/// POST /api/orders/guest-checkout
pub async fn guest_checkout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuestCheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GuestCheckoutOutcome>>), ApiError> {
    // Contact shape is checked here at the boundary; the orchestrator only
    // insists the fields are present.
    if !req.guest_email.trim().is_empty() {
        validate_email(&req.guest_email).map_err(ApiError::validation)?;
    }
    if !req.guest_phone.trim().is_empty() {
        validate_phone(req.guest_phone.trim()).map_err(ApiError::validation)?;
    }

    let outcome = checkout::guest_checkout(&state.db, &state.config.store, &req).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Order created successfully", outcome),
    ))
}

/// List the caller's orders, newest first, with a product projection
///
/// GET /api/orders/my-orders
pub async fn my_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<OrderWithProduct>>>, ApiError> {
    let rows = sqlx::query_as::<_, OrderProductRow>(
        "SELECT o.id, o.customer_id, o.product_id, o.quantity, o.total_price, o.status,
                o.payment_status, o.shipping_address, o.created_at, o.updated_at,
                p.name AS product_name, p.price AS product_price, p.image AS product_image
         FROM orders o
         JOIN products p ON p.id = o.product_id
         WHERE o.customer_id = ?
         ORDER BY o.created_at DESC",
    )
    .bind(&auth.id)
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::ok(
        "Orders retrieved successfully",
        rows.into_iter().map(OrderWithProduct::from).collect(),
    ))
}

/// List all orders with customer details
///
/// GET /api/orders (admin)
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<OrderWithCustomer>>>, ApiError> {
    let orders = sqlx::query_as::<_, OrderWithCustomer>(
        "SELECT o.id, o.customer_id, u.name AS customer_name, u.email AS customer_email,
                o.product_id, o.quantity, o.total_price, o.status, o.payment_status,
                o.shipping_address, o.created_at, o.updated_at
         FROM orders o
         JOIN users u ON u.id = o.customer_id
         ORDER BY o.created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::ok("Orders retrieved successfully", orders))
}

/// List all guest orders, newest first, with a product projection
///
/// GET /api/orders/guest-orders (admin)
pub async fn list_guest_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<GuestOrderWithProduct>>>, ApiError> {
    let rows = sqlx::query_as::<_, GuestOrderProductRow>(
        "SELECT g.id, g.guest_name, g.guest_email, g.guest_phone, g.product_id, g.quantity,
                g.total_price, g.status, g.payment_status, g.shipping_address, g.created_at,
                g.updated_at,
                p.name AS product_name, p.price AS product_price, p.image AS product_image
         FROM guest_orders g
         JOIN products p ON p.id = g.product_id
         ORDER BY g.created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(ApiResponse::ok(
        "Guest orders retrieved successfully",
        rows.into_iter().map(GuestOrderWithProduct::from).collect(),
    ))
}

async fn fetch_order(state: &AppState, id: &str) -> Result<Order, ApiError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))
}

/// Set an order's status. Any valid status is accepted; there is no
/// transition state machine.
///
/// PATCH /api/orders/:id/status (admin)
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let status =
        OrderStatus::from_str(&req.status).map_err(|_| ApiError::validation("Invalid status"))?;

    let order = fetch_order(&state, &id).await?;

    sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(crate::utils::now_rfc3339())
        .bind(&order.id)
        .execute(&state.db)
        .await?;

    let order = fetch_order(&state, &id).await?;

    tracing::info!(order_id = %id, status = %status, "Order status updated");

    Ok(ApiResponse::ok("Order status updated successfully", order))
}

/// Set an order's payment status. Marking an order paid moves a pending
/// order into processing.
///
/// PATCH /api/orders/:id/payment (admin)
pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    // The admin dashboard only ever toggles between these two.
    let payment = match PaymentStatus::from_str(&req.payment_status) {
        Ok(p @ (PaymentStatus::Paid | PaymentStatus::Unpaid)) => p,
        _ => return Err(ApiError::validation("Invalid payment status")),
    };

    let order = fetch_order(&state, &id).await?;
    let current = OrderStatus::from_str(&order.status)
        .map_err(|e| {
            tracing::error!(order_id = %id, "Corrupt order status: {}", e);
            ApiError::internal("Failed to update payment status")
        })?;
    let status = status_after_payment(current, payment);

    sqlx::query("UPDATE orders SET payment_status = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(payment.to_string())
        .bind(status.to_string())
        .bind(crate::utils::now_rfc3339())
        .bind(&order.id)
        .execute(&state.db)
        .await?;

    let order = fetch_order(&state, &id).await?;

    tracing::info!(order_id = %id, payment_status = %payment, "Payment status updated");

    Ok(ApiResponse::ok(
        "Payment status updated successfully",
        order,
    ))
}

pub mod auth;
pub mod error;
mod orders;
mod products;
mod users;
pub mod validation;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Catalog: reads are public, writes require the admin role (enforced by
    // the AdminUser extractor in the handlers)
    let product_routes = Router::new()
        .route("/", get(products::list_products))
        .route("/", post(products::create_product))
        .route("/:id", get(products::get_product))
        .route("/:id", put(products::update_product))
        .route("/:id", delete(products::delete_product));

    let user_routes = Router::new()
        .route("/profile", get(users::get_profile))
        .route("/profile", put(users::update_profile))
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id", put(users::update_user))
        .route("/:id", delete(users::delete_user));

    let order_routes = Router::new()
        .route("/checkout", post(orders::checkout))
        .route("/guest-checkout", post(orders::guest_checkout))
        .route("/my-orders", get(orders::my_orders))
        .route("/", get(orders::list_orders))
        .route("/guest-orders", get(orders::list_guest_orders))
        .route("/:id/status", patch(orders::update_order_status))
        .route("/:id/payment", patch(orders::update_payment_status));

    let uploads_dir = state.config.server.data_dir.join("uploads");

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/products", product_routes)
        .nest("/api/users", user_routes)
        .nest("/api/orders", order_routes)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

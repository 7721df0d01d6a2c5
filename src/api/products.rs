//! Product catalog endpoints.
//!
//! Create and update accept multipart forms so the admin dashboard can ship
//! an image alongside the fields. Uploaded files live under
//! `<data_dir>/uploads/products/` and are served back at `/uploads/...`;
//! replacing or deleting a product releases its stored file.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;

use super::auth::AdminUser;
use super::error::{ApiError, ApiResponse};
use super::validation::{validate_price, validate_stock};
use crate::db::Product;
use crate::AppState;

/// Fields accepted by the create/update multipart forms.
#[derive(Debug, Default)]
struct ProductForm {
    name: Option<String>,
    description: Option<String>,
    price: Option<i64>,
    stock: Option<i64>,
    image: Option<UploadedImage>,
}

#[derive(Debug)]
struct UploadedImage {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_product_form(mut multipart: Multipart) -> Result<ProductForm, ApiError> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid form data: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "name" => form.name = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "price" => {
                let raw = read_text(field).await?;
                let price = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::validation("Price must be a positive number"))?;
                form.price = Some(price);
            }
            "stock" => {
                let raw = read_text(field).await?;
                let stock = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ApiError::validation("Stock must be a non-negative number"))?;
                form.stock = Some(stock);
            }
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Invalid image upload: {}", e)))?;
                if !bytes.is_empty() {
                    form.image = Some(UploadedImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid form data: {}", e)))
}

/// Write an uploaded image to disk and return its public path.
async fn store_image(state: &AppState, upload: UploadedImage) -> Result<String, ApiError> {
    let ext = PathBuf::from(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_ascii_lowercase();
    let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);

    let dir = state.config.server.data_dir.join("uploads/products");
    crate::utils::ensure_dir(&dir).map_err(|e| {
        tracing::error!("Failed to create upload directory: {}", e);
        ApiError::internal("Failed to store image")
    })?;

    tokio::fs::write(dir.join(&file_name), upload.bytes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to write uploaded image: {}", e);
            ApiError::internal("Failed to store image")
        })?;

    Ok(format!("/uploads/products/{}", file_name))
}

/// Delete a previously stored image file. External URLs (the demo catalog)
/// and already-missing files are ignored.
async fn release_image(state: &AppState, image: &str) {
    let Some(relative) = image.strip_prefix("/uploads/") else {
        return;
    };
    let path = state.config.server.data_dir.join("uploads").join(relative);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove image file: {}", e);
        }
    }
}

async fn fetch_product(state: &AppState, id: &str) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// List all products
///
/// GET /api/products (public)
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    Ok(ApiResponse::ok("Products retrieved successfully", products))
}

/// Get a product by id
///
/// GET /api/products/:id (public)
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = fetch_product(&state, &id).await?;
    Ok(ApiResponse::ok("Product retrieved successfully", product))
}

/// Create a product
///
/// POST /api/products (admin)
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    let form = read_product_form(multipart).await?;

    let name = form
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Name, price, and stock are required"))?;
    let price = form
        .price
        .ok_or_else(|| ApiError::validation("Name, price, and stock are required"))?;
    let stock = form
        .stock
        .ok_or_else(|| ApiError::validation("Name, price, and stock are required"))?;

    validate_price(price).map_err(ApiError::validation)?;
    validate_stock(stock).map_err(ApiError::validation)?;

    let image = match form.image {
        Some(upload) => Some(store_image(&state, upload).await?),
        None => None,
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = crate::utils::now_rfc3339();

    sqlx::query(
        "INSERT INTO products (id, name, description, price, stock, image, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name.trim())
    .bind(&form.description)
    .bind(price)
    .bind(stock)
    .bind(&image)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let product = fetch_product(&state, &id).await?;

    tracing::info!(product_id = %id, name = %product.name, "Product created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Product created successfully", product),
    ))
}

/// Update a product. Omitted form fields keep their prior values; sending a
/// new image replaces and deletes the stored one.
///
/// PUT /api/products/:id (admin)
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = fetch_product(&state, &id).await?;
    let form = read_product_form(multipart).await?;

    if let Some(price) = form.price {
        validate_price(price).map_err(ApiError::validation)?;
    }
    if let Some(stock) = form.stock {
        validate_stock(stock).map_err(ApiError::validation)?;
    }

    let new_image = match form.image {
        Some(upload) => {
            let stored = store_image(&state, upload).await?;
            if let Some(old) = &product.image {
                release_image(&state, old).await;
            }
            Some(stored)
        }
        None => product.image.clone(),
    };

    let name = form.name.unwrap_or_else(|| product.name.clone());
    let description = form.description.or_else(|| product.description.clone());
    let price = form.price.unwrap_or(product.price);
    let stock = form.stock.unwrap_or(product.stock);

    sqlx::query(
        "UPDATE products SET name = ?, description = ?, price = ?, stock = ?, image = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(name.trim())
    .bind(&description)
    .bind(price)
    .bind(stock)
    .bind(&new_image)
    .bind(crate::utils::now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let product = fetch_product(&state, &id).await?;

    tracing::info!(product_id = %id, "Product updated");

    Ok(ApiResponse::ok("Product updated successfully", product))
}

/// Delete a product and release its stored image
///
/// DELETE /api/products/:id (admin)
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let product = fetch_product(&state, &id).await?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(&product.id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.message().contains("FOREIGN KEY constraint failed") {
                    return ApiError::validation(
                        "Product has existing orders and cannot be deleted",
                    );
                }
            }
            ApiError::from(e)
        })?;

    if let Some(image) = &product.image {
        release_image(&state, image).await;
    }

    tracing::info!(product_id = %id, "Product deleted");

    Ok(ApiResponse::message("Product deleted successfully"))
}

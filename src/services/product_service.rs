use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, _) = query.pagination.normalize();
    let (items, total) = state.catalog.list_products(&query).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = state
        .catalog
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("product not found".into()))?;
    Ok(ApiResponse::success("Product", product, None))
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name must not be empty".into()));
    }
    Ok(())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::InvalidArgument("price cannot be negative".into()));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> AppResult<()> {
    if stock < 0 {
        return Err(AppError::InvalidArgument("stock cannot be negative".into()));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_name(&payload.name)?;
    validate_price(payload.price)?;
    validate_stock(payload.stock)?;

    let product = state
        .catalog
        .create_product(Product {
            id: Uuid::new_v4(),
            name: payload.name,
            description: payload.description,
            category: payload.category,
            price: payload.price,
            stock: payload.stock,
            created_at: Utc::now(),
        })
        .await?;

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing = state
        .catalog
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("product not found".into()))?;

    // Absent fields keep their stored values.
    let merged = Product {
        id,
        name: payload.name.unwrap_or(existing.name),
        description: payload.description.or(existing.description),
        category: payload.category.or(existing.category),
        price: payload.price.unwrap_or(existing.price),
        stock: payload.stock.unwrap_or(existing.stock),
        created_at: existing.created_at,
    };
    validate_name(&merged.name)?;
    validate_price(merged.price)?;
    validate_stock(merged.stock)?;

    let product = state.catalog.update_product(merged).await?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    if !state.catalog.delete_product(id).await? {
        return Err(AppError::NotFound("product not found".into()));
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    dto::cart::{
        AddToCartRequest, CartItemView, CartView, DecreaseCartRequest, UpdateCartRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartLine, Product},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Join lines with their current catalog entries. A product deleted since
/// the line was added yields `product: None` rather than hiding the line.
async fn into_view(state: &AppState, lines: Vec<CartLine>) -> AppResult<CartView> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let mut products: HashMap<Uuid, Product> = state
        .catalog
        .find_products(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let items = lines
        .into_iter()
        .map(|line| CartItemView {
            product_id: line.product_id,
            quantity: line.quantity,
            product: products.remove(&line.product_id),
        })
        .collect();
    Ok(CartView { items })
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let lines = state.carts.get(user.user_id).await?;
    let view = into_view(state, lines).await?;
    Ok(ApiResponse::success("OK", view, None))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::InvalidArgument(
            "quantity must be a positive integer".into(),
        ));
    }
    if state
        .catalog
        .find_product(payload.product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("product not found".into()));
    }

    let lines = state
        .carts
        .add(user.user_id, payload.product_id, payload.quantity)
        .await?;
    let view = into_view(state, lines).await?;
    Ok(ApiResponse::success("Item added to cart", view, None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity < 0 {
        return Err(AppError::InvalidArgument(
            "quantity cannot be negative".into(),
        ));
    }

    let lines = state
        .carts
        .set_quantity(user.user_id, payload.product_id, payload.quantity)
        .await?;
    let view = into_view(state, lines).await?;
    Ok(ApiResponse::success("Cart updated", view, None))
}

pub async fn decrease_item(
    state: &AppState,
    user: &AuthUser,
    payload: DecreaseCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let lines = state
        .carts
        .decrement(user.user_id, payload.product_id)
        .await?;
    let view = into_view(state, lines).await?;
    Ok(ApiResponse::success("Quantity decreased", view, None))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let lines = state.carts.remove(user.user_id, product_id).await?;
    let view = into_view(state, lines).await?;
    Ok(ApiResponse::success("Item removed", view, None))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state.carts.clear(user.user_id).await?;
    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Omitted quantity means "one more".
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecreaseCartRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartItemView>,
}

/// Cart line enriched with the product's current attributes. `product` is
/// `None` when the catalog entry has been deleted since the line was added;
/// the line itself stays visible so it can still be removed.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub quantity: i32,
    pub product: Option<Product>,
}

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

/// What the client gets back from a successful checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub total_amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub orders: Vec<Order>,
}

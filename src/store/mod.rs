//! Storage ports. Every backend implements the same four traits so the
//! services never know whether they are talking to Postgres or to the
//! in-memory development store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CartLine, Order, Product, User},
    routes::params::ProductQuery,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// New account data; the password is already hashed by the auth service.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
}

/// Product lookup plus the admin write path. Checkout only ever uses the
/// read methods; it treats the catalog as an external read-only collaborator.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    /// Resolve a batch of ids. Unknown ids are simply absent from the result,
    /// never an error; callers decide how to treat unresolvable references.
    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>>;
    async fn list_products(&self, query: &ProductQuery) -> AppResult<(Vec<Product>, i64)>;

    async fn create_product(&self, product: Product) -> AppResult<Product>;
    async fn update_product(&self, product: Product) -> AppResult<Product>;
    /// Returns `false` when no such product existed.
    async fn delete_product(&self, id: Uuid) -> AppResult<bool>;
}

/// Per-user cart state. Implementations serialize read-modify-write per
/// user: concurrent mutations for one user behave as if applied one at a
/// time, and concurrent increments are never lost. Operations for different
/// users never contend.
///
/// Carts are keyed by user id and exist exactly while they hold at least one
/// line. Mutations return the resulting lines in insertion order.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's cart, or an empty one; never an error for a valid user.
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>>;

    /// Merge-by-key add: an existing line for the product is incremented by
    /// `quantity`, otherwise a new line is appended. Creates the cart
    /// lazily. `quantity` must already be validated positive.
    async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: i32)
        -> AppResult<Vec<CartLine>>;

    /// Overwrite a line's quantity; 0 removes the line. Missing cart and
    /// missing line fail with distinct `NotFound` messages.
    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Vec<CartLine>>;

    /// Reduce a line by exactly one; the line is removed when it would reach
    /// zero. Missing cart or line → `NotFound`.
    async fn decrement(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>>;

    /// Delete a line. Removing an absent line from an existing cart is a
    /// no-op success; a missing cart is `NotFound`.
    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>>;

    /// Delete the whole cart record. Missing cart → `NotFound`.
    async fn clear(&self, user_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the immutable order record (header and lines together).
    async fn append(&self, order: Order) -> AppResult<Uuid>;

    /// The user's orders, most recent first, with the total count.
    /// An empty history is an empty list, never an error.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Order>, i64)>;
}

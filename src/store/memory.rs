//! In-memory backend. The development and test default when `DATABASE_URL`
//! is not set; state lives for the lifetime of the process.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CartLine, Order, Product, User},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    store::{CartStore, NewUser, OrderStore, ProductCatalog, UserStore},
};

/// Each cart is its own locked cell so mutations for one user serialize
/// against each other without blocking other users. The outer map lock is
/// held (shared) for the whole mutation; the exclusive sweep that drops
/// emptied records therefore can never interleave with a mutation in
/// progress, which would otherwise lose writes to a removed cell.
type CartCell = Arc<Mutex<Vec<CartLine>>>;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    products: RwLock<HashMap<Uuid, Product>>,
    carts: RwLock<HashMap<Uuid, CartCell>>,
    orders: RwLock<Vec<Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` on the user's lines under the per-user lock. `create`
    /// decides whether a missing cart is created lazily or is an error.
    /// A cart left empty by `apply` has its record removed; carts exist
    /// exactly while they hold at least one line.
    async fn with_cart<T>(
        &self,
        user_id: Uuid,
        create: bool,
        apply: impl FnOnce(&mut Vec<CartLine>) -> AppResult<T>,
    ) -> AppResult<T> {
        let map = self.carts.read().await;
        let cell = match map.get(&user_id) {
            Some(cell) => Arc::clone(cell),
            None => {
                drop(map);
                if !create {
                    return Err(AppError::NotFound("cart not found".into()));
                }
                // Create and mutate under the exclusive lock so the fresh,
                // still-empty cell is never visible to the sweep below.
                let mut map = self.carts.write().await;
                let cell = Arc::clone(
                    map.entry(user_id)
                        .or_insert_with(|| Arc::new(Mutex::new(Vec::new()))),
                );
                let mut lines = cell.lock().await;
                let out = apply(&mut lines)?;
                if lines.is_empty() {
                    drop(lines);
                    map.remove(&user_id);
                }
                return Ok(out);
            }
        };

        let mut lines = cell.lock().await;
        let out = apply(&mut lines)?;
        let emptied = lines.is_empty();
        drop(lines);
        drop(map);

        if emptied {
            // Re-check under the exclusive lock: another task may have
            // refilled the cart, or replaced the record with a fresh cell.
            let mut map = self.carts.write().await;
            let same_cell = map
                .get(&user_id)
                .is_some_and(|current| Arc::ptr_eq(current, &cell));
            if same_cell && cell.lock().await.is_empty() {
                map.remove(&user_id);
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::InvalidArgument("email already registered".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self, query: &ProductQuery) -> AppResult<(Vec<Product>, i64)> {
        let (_, limit, offset) = query.pagination.normalize();
        let needle = query
            .q
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase());
        let category = query.category.as_ref().filter(|s| !s.is_empty());

        let products = self.products.read().await;
        let mut matches: Vec<Product> = products
            .values()
            .filter(|p| match &needle {
                Some(needle) => {
                    p.name.to_lowercase().contains(needle)
                        || p.description
                            .as_ref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                }
                None => true,
            })
            .filter(|p| match category {
                Some(category) => p.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .filter(|p| query.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| query.max_price.is_none_or(|max| p.price <= max))
            .cloned()
            .collect();

        let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
        let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
        matches.sort_by(|a, b| {
            let ordering = match sort_by {
                ProductSortBy::CreatedAt => a.created_at.cmp(&b.created_at),
                ProductSortBy::Price => a.price.cmp(&b.price),
                ProductSortBy::Name => a.name.cmp(&b.name),
            }
            .then_with(|| a.id.cmp(&b.id));
            match sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matches.len() as i64;
        let page: Vec<Product> = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, product: Product) -> AppResult<Product> {
        let mut products = self.products.write().await;
        if !products.contains_key(&product.id) {
            return Err(AppError::NotFound("product not found".into()));
        }
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let map = self.carts.read().await;
        match map.get(&user_id) {
            Some(cell) => Ok(cell.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Vec<CartLine>> {
        self.with_cart(user_id, true, |lines| {
            match lines.iter_mut().find(|l| l.product_id == product_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(quantity),
                None => lines.push(CartLine {
                    product_id,
                    quantity,
                }),
            }
            Ok(lines.clone())
        })
        .await
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Vec<CartLine>> {
        self.with_cart(user_id, false, |lines| {
            let Some(position) = lines.iter().position(|l| l.product_id == product_id) else {
                return Err(AppError::NotFound("item not found in cart".into()));
            };
            if quantity == 0 {
                lines.remove(position);
            } else {
                lines[position].quantity = quantity;
            }
            Ok(lines.clone())
        })
        .await
    }

    async fn decrement(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>> {
        self.with_cart(user_id, false, |lines| {
            let Some(position) = lines.iter().position(|l| l.product_id == product_id) else {
                return Err(AppError::NotFound("item not found in cart".into()));
            };
            lines[position].quantity -= 1;
            if lines[position].quantity <= 0 {
                lines.remove(position);
            }
            Ok(lines.clone())
        })
        .await
    }

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>> {
        self.with_cart(user_id, false, |lines| {
            lines.retain(|l| l.product_id != product_id);
            Ok(lines.clone())
        })
        .await
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        let removed = self.carts.write().await.remove(&user_id);
        if removed.is_none() {
            return Err(AppError::NotFound("cart not found or already empty".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn append(&self, order: Order) -> AppResult<Uuid> {
        let id = order.id;
        self.orders.write().await.push(order);
        Ok(id)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let orders = self.orders.read().await;
        // Append order is chronological, so reverse iteration is already
        // most-recent-first.
        let matches: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        let total = matches.len() as i64;
        let page = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, quantity: i32) -> CartLine {
        CartLine {
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn add_merges_by_product_and_preserves_insertion_order() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        store.add(user, first, 2).await.unwrap();
        store.add(user, second, 1).await.unwrap();
        let lines = store.add(user, first, 3).await.unwrap();

        assert_eq!(lines, vec![line(first, 5), line(second, 1)]);
    }

    #[tokio::test]
    async fn emptied_cart_record_is_removed() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let product = Uuid::new_v4();

        store.add(user, product, 1).await.unwrap();
        let lines = store.decrement(user, product).await.unwrap();
        assert!(lines.is_empty());

        // The record is gone, so clearing again reports a missing cart.
        let err = store.clear(user).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        // And a cart-requiring mutation sees no cart rather than no item.
        let err = store.decrement(user, product).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(m) if m.contains("cart")));
    }

    #[tokio::test]
    async fn set_quantity_zero_removes_only_that_line() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let (keep, drop) = (Uuid::new_v4(), Uuid::new_v4());

        store.add(user, keep, 1).await.unwrap();
        store.add(user, drop, 4).await.unwrap();
        let lines = store.set_quantity(user, drop, 0).await.unwrap();

        assert_eq!(lines, vec![line(keep, 1)]);
    }

    #[tokio::test]
    async fn remove_of_absent_line_is_a_noop_success() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let present = Uuid::new_v4();

        store.add(user, present, 2).await.unwrap();
        let lines = store.remove(user, Uuid::new_v4()).await.unwrap();
        assert_eq!(lines, vec![line(present, 2)]);
    }

    #[tokio::test]
    async fn concurrent_adds_are_never_lost() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let product = Uuid::new_v4();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            tasks.spawn(async move { store.add(user, product, 1).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let lines = store.get(user).await.unwrap();
        assert_eq!(lines, vec![line(product, 10)]);
    }

    #[tokio::test]
    async fn order_history_is_most_recent_first() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for total in [100, 200, 300] {
            store
                .append(Order {
                    id: Uuid::new_v4(),
                    user_id: user,
                    lines: Vec::new(),
                    total_amount: total,
                    status: crate::models::OrderStatus::Pending,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let (orders, total) = store.list_by_user(user, 20, 0).await.unwrap();
        assert_eq!(total, 3);
        let totals: Vec<i64> = orders.iter().map(|o| o.total_amount).collect();
        assert_eq!(totals, vec![300, 200, 100]);
    }
}

//! Postgres backend. Per-user cart atomicity comes from the storage layer
//! itself: the add path is a single conflict-merging upsert, and the
//! read-modify-write paths run in short transactions with row locks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    models::{CartLine, Order, OrderLine, OrderStatus, Product, User},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    store::{CartStore, NewUser, OrderStore, ProductCatalog, UserStore},
};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn cart_lines(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY seq",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Shared WHERE clause for the filtered listing and its count. `$1..$4` are
/// NULL when the corresponding filter is off.
const PRODUCT_FILTER: &str = r#"
    ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1)
    AND ($2::text IS NULL OR category = $2)
    AND ($3::bigint IS NULL OR price >= $3)
    AND ($4::bigint IS NULL OR price <= $4)
"#;

#[async_trait]
impl ProductCatalog for PgStore {
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn find_products(&self, ids: &[Uuid]) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn list_products(&self, query: &ProductQuery) -> AppResult<(Vec<Product>, i64)> {
        let (_, limit, offset) = query.pagination.normalize();
        let pattern = query
            .q
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));
        let category = query.category.as_deref().filter(|s| !s.is_empty());
        let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
        let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

        let list_sql = format!(
            "SELECT * FROM products WHERE {PRODUCT_FILTER} ORDER BY {} {} LIMIT $5 OFFSET $6",
            sort_by.as_sql(),
            sort_order.as_sql(),
        );
        let items = sqlx::query_as::<_, Product>(&list_sql)
            .bind(pattern.as_deref())
            .bind(category)
            .bind(query.min_price)
            .bind(query.max_price)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER}");
        let total: (i64,) = sqlx::query_as(&count_sql)
            .bind(pattern.as_deref())
            .bind(category)
            .bind(query.min_price)
            .bind(query.max_price)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total.0))
    }

    async fn create_product(&self, product: Product) -> AppResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, category, price, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(&self, product: Product) -> AppResult<Product> {
        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2, description = $3, category = $4, price = $5, stock = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .fetch_optional(&self.pool)
        .await?;
        updated.ok_or_else(|| AppError::NotFound("product not found".into()))
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        self.cart_lines(user_id).await
    }

    async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Vec<CartLine>> {
        // The conflict-merging upsert makes concurrent adds commute: each
        // one increments the stored quantity, none can be lost.
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        self.cart_lines(user_id).await
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<Vec<CartLine>> {
        let mut tx = self.pool.begin().await?;

        let (cart_exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM cart_items WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if !cart_exists {
            return Err(AppError::NotFound("cart not found".into()));
        }

        // quantity = 0 must delete: the schema forbids zero-quantity rows.
        let affected = if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            sqlx::query(
                "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };
        if affected == 0 {
            return Err(AppError::NotFound("item not found in cart".into()));
        }

        tx.commit().await?;
        self.cart_lines(user_id).await
    }

    async fn decrement(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so the reached-zero check and the write are one
        // atomic step against concurrent decrements.
        let current: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((quantity,)) = current else {
            let (cart_exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM cart_items WHERE user_id = $1)")
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if cart_exists {
                AppError::NotFound("item not found in cart".into())
            } else {
                AppError::NotFound("cart not found".into())
            });
        };

        if quantity <= 1 {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                "UPDATE cart_items SET quantity = quantity - 1
                 WHERE user_id = $1 AND product_id = $2",
            )
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.cart_lines(user_id).await
    }

    async fn remove(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Vec<CartLine>> {
        let mut tx = self.pool.begin().await?;

        let (cart_exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM cart_items WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if !cart_exists {
            return Err(AppError::NotFound("cart not found".into()));
        }

        // Absent line: zero rows affected is still a success.
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.cart_lines(user_id).await
    }

    async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("cart not found or already empty".into()));
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: i64,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: i64,
}

#[async_trait]
impl OrderStore for PgStore {
    async fn append(&self, order: Order) -> AppResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order.id)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Order>, i64)> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, total_amount, status, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r#"
            SELECT order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY seq
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for item in item_rows {
            lines_by_order.entry(item.order_id).or_default().push(OrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let orders = rows
            .into_iter()
            .map(|row| {
                let status = OrderStatus::parse(&row.status)
                    .ok_or_else(|| anyhow::anyhow!("unknown order status: {}", row.status))?;
                Ok(Order {
                    id: row.id,
                    user_id: row.user_id,
                    lines: lines_by_order.remove(&row.id).unwrap_or_default(),
                    total_amount: row.total_amount,
                    status,
                    created_at: row.created_at,
                })
            })
            .collect::<AppResult<Vec<Order>>>()?;

        Ok((orders, total.0))
    }
}

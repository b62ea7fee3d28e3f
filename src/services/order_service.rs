use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::orders::{OrderList, OrderReceipt},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderLine, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Upper bound on the detached email dispatch; a stuck relay is abandoned,
/// never retried, and never visible to the client.
const EMAIL_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Convert the caller's cart into a persisted order.
///
/// Sequence: read cart → resolve products → total → persist order → clear
/// cart → detached confirmation email. A failed persist leaves the cart
/// untouched so the whole checkout can be retried; a failed clear after a
/// persisted order is only logged, the order is the source of truth.
pub async fn place_order(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<OrderReceipt>> {
    let user = state
        .users
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user no longer exists".into()))?;

    let lines = state.carts.get(user.id).await?;
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<Uuid, Product> = state
        .catalog
        .find_products(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut order_lines: Vec<OrderLine> = Vec::with_capacity(lines.len());
    let mut receipt_rows: Vec<ReceiptRow> = Vec::with_capacity(lines.len());
    let mut total_amount: i64 = 0;
    for line in &lines {
        let Some(product) = products.get(&line.product_id) else {
            // Resilience policy: a line whose product vanished since it was
            // added is dropped from the order, loudly.
            tracing::warn!(
                product_id = %line.product_id,
                quantity = line.quantity,
                "skipping cart line, product no longer resolvable"
            );
            continue;
        };
        let subtotal = product.price * i64::from(line.quantity);
        total_amount += subtotal;
        order_lines.push(OrderLine {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: product.price,
        });
        receipt_rows.push(ReceiptRow {
            name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
            subtotal,
        });
    }

    // Every line pointed at a vanished product: there is nothing to charge,
    // treat it like checking out an empty cart.
    if order_lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let order = Order {
        id: Uuid::new_v4(),
        user_id: user.id,
        lines: order_lines,
        total_amount,
        status: OrderStatus::Pending,
        created_at: Utc::now(),
    };

    let order_id = state
        .orders
        .append(order)
        .await
        .map_err(|err| AppError::CheckoutFailed(err.to_string()))?;

    if let Err(err) = state.carts.clear(user.id).await {
        tracing::warn!(
            error = %err,
            user_id = %user.id,
            order_id = %order_id,
            "cart clear after checkout failed, order stands"
        );
    }

    dispatch_confirmation(state, &user, order_id, receipt_rows, total_amount);

    Ok(ApiResponse::success(
        "Order placed successfully!",
        OrderReceipt {
            order_id,
            total_amount,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let (orders, total) = state.orders.list_by_user(user.user_id, limit, offset).await?;
    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", OrderList { orders }, Some(meta)))
}

struct ReceiptRow {
    name: String,
    quantity: i32,
    unit_price: i64,
    subtotal: i64,
}

/// Fire-and-forget: the order is already persisted, so delivery problems are
/// logged here and nowhere else.
fn dispatch_confirmation(
    state: &AppState,
    user: &User,
    order_id: Uuid,
    rows: Vec<ReceiptRow>,
    total_amount: i64,
) {
    let mailer = Arc::clone(&state.mailer);
    let admin_email = state.config.admin_email.clone();
    let to = user.email.clone();
    let admin_subject = format!("New order from {}", user.name);
    let html = receipt_html(&user.name, &rows, total_amount);

    tokio::spawn(async move {
        let send_all = async {
            if let Err(err) = mailer.send(&to, "Your order confirmation", &html).await {
                tracing::warn!(error = %err, to = %to, order_id = %order_id, "confirmation email failed");
            }
            if let Some(admin) = admin_email {
                if let Err(err) = mailer.send(&admin, &admin_subject, &html).await {
                    tracing::warn!(error = %err, to = %admin, order_id = %order_id, "admin notification failed");
                }
            }
        };
        if tokio::time::timeout(EMAIL_DISPATCH_TIMEOUT, send_all)
            .await
            .is_err()
        {
            tracing::warn!(order_id = %order_id, "email dispatch timed out");
        }
    });
}

fn receipt_html(name: &str, rows: &[ReceiptRow], total_amount: i64) -> String {
    let mut body = String::new();
    for row in rows {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.name),
            row.quantity,
            format_amount(row.unit_price),
            format_amount(row.subtotal),
        ));
    }

    format!(
        "<div style=\"font-family: sans-serif; max-width: 600px; margin: auto;\">\
         <h2>Order confirmation</h2>\
         <p>Hi <strong>{}</strong>, thank you for your purchase. Your order has been confirmed.</p>\
         <table style=\"width: 100%; border-collapse: collapse;\">\
         <thead><tr><th>Product</th><th>Qty</th><th>Price</th><th>Subtotal</th></tr></thead>\
         <tbody>{}</tbody>\
         <tfoot><tr><td colspan=\"3\"><strong>Total</strong></td><td><strong>{}</strong></td></tr></tfoot>\
         </table>\
         <p>We will notify you once your order is shipped.</p>\
         <p><small>This is an automated email, please do not reply.</small></p>\
         </div>",
        escape_html(name),
        body,
        format_amount(total_amount),
    )
}

fn format_amount(minor_units: i64) -> String {
    format!("${}.{:02}", minor_units / 100, minor_units % 100)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

//! HTTP surface tests: status codes, the response envelope, and the auth
//! extractor, exercised through `tower::ServiceExt::oneshot` against the
//! in-memory backend.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use axum_storefront_api::{
    config::AppConfig,
    mailer::LogMailer,
    models::{Product, User},
    routes::create_api_router,
    services::auth_service,
    state::AppState,
    store::NewUser,
};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        smtp: None,
        admin_email: None,
    }
}

fn test_state() -> AppState {
    AppState::in_memory(Arc::new(LogMailer), test_config())
}

fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        .with_state(state)
}

async fn seed_product(state: &AppState, name: &str, price: i64) -> Product {
    state
        .catalog
        .create_product(Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            category: None,
            price,
            stock: 10,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

/// Create an account directly in the store and mint a token for it, so
/// tests that are not about the auth routes skip the register/login dance.
async fn user_with_token(state: &AppState, email: &str, role: &str) -> (User, String) {
    let user = state
        .users
        .create_user(NewUser {
            name: "Test User".into(),
            email: email.into(),
            password_hash: "unused".into(),
            role: role.into(),
        })
        .await
        .unwrap();
    let token = auth_service::issue_token(state, &user).unwrap();
    (user, token)
}

fn get(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, path: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn cart_requires_a_credential() {
    let app = app(test_state());

    let response = app
        .oneshot(Request::builder().uri("/api/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "unauthorized: no token provided");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = app(test_state());

    let response = app
        .oneshot(get("/api/cart", "not.a.jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_cookie_auth() {
    let state = test_state();
    let app = app(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "Ada", "email": "ada@example.com", "password": "s3cret"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "ada@example.com", "password": "s3cret"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets the token cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    let body = body_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // The cookie alone is enough to authenticate.
    let cookie_pair = cookie.split(';').next().unwrap().to_string();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .header(header::COOKIE, cookie_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["items"], json!([]));
}

#[tokio::test]
async fn cart_mutations_map_to_the_error_taxonomy() {
    let state = test_state();
    let (_, token) = user_with_token(&state, "buyer@example.com", "user").await;
    let product = seed_product(&state, "Brass Lamp", 50).await;
    let app = app(state);

    // Malformed body -> 400 through the AppJson extractor.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cart/add")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown product -> 404.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/cart/add",
            &token,
            json!({"product_id": Uuid::new_v4(), "quantity": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["message"], "not found: product not found");

    // Non-positive quantity -> 400.
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/cart/add",
            &token,
            json!({"product_id": product.id, "quantity": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Update without a cart -> 404, message names the cart not the item.
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/cart/update",
            &token,
            json!({"product_id": product.id, "quantity": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["message"], "not found: cart not found");

    // Checkout with no cart -> 400 with the empty-cart message.
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/cart/place-order", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "cart is empty");
}

#[tokio::test]
async fn full_cart_to_order_flow_over_http() {
    let state = test_state();
    let (_, token) = user_with_token(&state, "buyer@example.com", "user").await;
    let desk = seed_product(&state, "Walnut Desk", 100).await;
    let lamp = seed_product(&state, "Brass Lamp", 50).await;
    let app = app(state);

    // Two adds of the same product merge into one line.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/cart/add",
                &token,
                json!({"product_id": desk.id, "quantity": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/cart/add",
            &token,
            json!({"product_id": lamp.id}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[1]["quantity"], 1);

    // Removing a line that is not there is a success no-op.
    let response = app
        .clone()
        .oneshot(get_delete(
            &format!("/api/cart/remove/{}", Uuid::new_v4()),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Checkout.
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/cart/place-order", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_amount"], 250);
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    // The cart is now empty and the order shows up in history.
    let response = app.clone().oneshot(get("/api/cart", &token)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["items"], json!([]));

    let response = app
        .clone()
        .oneshot(get("/api/cart/orders", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let orders = body["data"]["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.as_str());
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(body["meta"]["total"], 1);

    // A second checkout against the now-empty cart fails.
    let response = app
        .oneshot(send_json("POST", "/api/cart/place-order", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn get_delete(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn clear_reports_a_missing_cart() {
    let state = test_state();
    let (_, token) = user_with_token(&state, "buyer@example.com", "user").await;
    let product = seed_product(&state, "Brass Lamp", 50).await;
    let app = app(state);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/cart/add",
            &token,
            json!({"product_id": product.id, "quantity": 2}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/cart/clear", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Clearing again is a reported condition, not a silent success.
    let response = app
        .oneshot(send_json("POST", "/api/cart/clear", &token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_are_role_gated() {
    let state = test_state();
    let (_, user_token) = user_with_token(&state, "buyer@example.com", "user").await;
    let (_, admin_token) = user_with_token(&state, "admin@example.com", "admin").await;
    let app = app(state);

    let payload = json!({"name": "Linen Throw", "price": 8500, "stock": 5});

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/admin/products",
            &user_token,
            payload.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/admin/products", &admin_token, payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    // The created product is publicly readable.
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/products/{product_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "Linen Throw");
}

use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest, UserDto},
        cart::{AddToCartRequest, CartItemView, CartView, DecreaseCartRequest, UpdateCartRequest},
        orders::{OrderList, OrderReceipt},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{CartLine, Order, OrderLine, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, health, params, products as product_routes},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::logout,
        product_routes::list_products,
        product_routes::get_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart,
        cart::decrease_item,
        cart::remove_item,
        cart::clear_cart,
        cart::place_order,
        cart::list_orders,
        admin::list_products,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
    ),
    components(
        schemas(
            Product,
            CartLine,
            Order,
            OrderLine,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UserDto,
            AddToCartRequest,
            UpdateCartRequest,
            DecreaseCartRequest,
            CartView,
            CartItemView,
            OrderReceipt,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            params::ProductSortBy,
            params::SortOrder,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderReceipt>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Public catalog endpoints"),
        (name = "Cart", description = "Cart and checkout endpoints"),
        (name = "Admin", description = "Catalog administration endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

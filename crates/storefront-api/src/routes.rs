use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};

use crate::middleware::{require_admin, require_auth, require_vendor};
use crate::{AppState, ApiError, admin, auth, orders, products, vendor};

/// The full `/api` surface. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/products", get(products::list_products))
        .route("/products/{id}", get(products::get_product))
        .route("/health", get(admin::health));

    let customer_routes = Router::new()
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/{id}", put(orders::cancel_order))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Layers run bottom-up: auth first, then the vendor role check.
    let vendor_routes = Router::new()
        .route("/products", post(products::create_product))
        .route(
            "/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route(
            "/vendor/products",
            get(vendor::list_products)
                .post(products::create_product)
                .put(vendor::update_product_by_query)
                .delete(vendor::delete_product_by_query),
        )
        .route(
            "/vendor/products/{id}",
            put(vendor::update_product).delete(vendor::delete_product),
        )
        .route(
            "/vendor/orders",
            get(vendor::list_orders).put(vendor::update_order_by_query),
        )
        .route("/vendor/orders/{id}", put(vendor::update_order))
        .route_layer(from_fn(require_vendor))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/admin/user-role", post(admin::update_user_role))
        .route("/admin/seed-products", post(admin::seed_products))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let api = Router::new()
        .merge(public_routes)
        .merge(customer_routes)
        .merge(vendor_routes)
        .merge(admin_routes);

    Router::new()
        .nest("/api", api)
        .fallback(|| async { ApiError::not_found("Not found") })
        .with_state(state)
}

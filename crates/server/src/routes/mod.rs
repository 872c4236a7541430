//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Store reachability
//!
//! # Auth
//! POST   /auth/register                 - Create a customer, returns a token
//! POST   /auth/login                    - Returns a token
//! GET    /auth/me                       - Resolve the caller
//! PUT    /auth/password                 - Change own password
//!
//! # Catalog
//! GET    /products                      - Paged listing
//! GET    /products/{id}                 - Product detail
//!
//! # Orders (authenticated)
//! POST   /orders                        - Checkout (customers)
//! GET    /orders/myorders               - Caller's orders
//! GET    /orders                        - All orders (admin)
//! GET    /orders/{id}                   - Owner or admin
//! PUT    /orders/{id}/status            - Owner (cancel only) or admin
//! PUT    /orders/{id}/cancel            - Owner or admin
//! DELETE /orders/{id}                   - Admin, restores stock
//!
//! # Admin
//! POST   /admin/impersonate/{id}        - Begin impersonating a customer
//! POST   /admin/exit-impersonation      - Return to the admin session
//! POST   /admin/products                - Create product
//! PUT    /admin/products/{id}           - Update product
//! DELETE /admin/products/{id}           - Delete product
//! GET    /admin/customers               - Paged listing, `email`/`role` filters
//! GET    /admin/customers/{id}          - Principal detail
//! PUT    /admin/customers/{id}/status   - Activate / deactivate
//! PUT    /admin/customers/{id}/role     - Promote / demote
//! DELETE /admin/customers/{id}          - Delete a principal without orders
//! ```

pub mod admin;
pub mod auth;
pub mod customers;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/password", put(auth::change_password))
}

/// Create the public catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/myorders", get(orders::mine))
        .route("/{id}", get(orders::show).delete(orders::delete))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/cancel", put(orders::cancel))
}

/// Create the back-office routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/impersonate/{customer_id}", post(admin::impersonate))
        .route("/exit-impersonation", post(admin::exit_impersonation))
        .route("/products", post(products::create))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/customers", get(customers::index))
        .route(
            "/customers/{id}",
            get(customers::show).delete(customers::delete),
        )
        .route("/customers/{id}/status", put(customers::set_status))
        .route("/customers/{id}/role", put(customers::set_role))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
}

/// The complete application: routes, state and the tracing/request-id stack.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    // Layers run outermost-last; the request id lands in the trace span
    routes()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                    impersonated_by = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

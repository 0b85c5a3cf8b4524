use axum::Router;

pub mod dashboard;
pub mod items;
pub mod system;
pub mod transactions;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/items", items::router())
        .nest("/transactions", transactions::router())
        .nest("/dashboard", dashboard::router())
        .nest("/users", users::router())
}

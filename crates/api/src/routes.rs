use axum::routing::{any, get};
use axum::Router;

use crate::handlers::*;
use crate::AppState;

/// The Invocation Dispatcher's route family (§4.1): `/invoke/{ref}[/*]`
/// accepts every method, plus the ambient `/healthz` and `/metrics`
/// endpoints every example in the pack carries (SPEC_FULL.md §B).
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/invoke/:function_ref", any(invoke_function))
        .route("/invoke/:function_ref/*rest", any(invoke_function_with_tail))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
}

pub fn build_router(state: AppState) -> Router {
    create_router().with_state(state)
}

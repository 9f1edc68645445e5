// Export route modules
pub mod index;
pub mod reply;
pub mod workspace;

use axum::Router;
use crate::state::AppState;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(index::routes())
        .merge(reply::routes(state.clone()))
        .merge(workspace::routes(state))
}

pub mod handlers;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use services::MessagePipeline;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

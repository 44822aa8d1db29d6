mod extractors;
pub mod handlers;
pub mod scheduler;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use scheduler::ReportScheduler;
pub use services::ReportService;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

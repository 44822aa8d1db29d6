use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::extractors::AdminAuth;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/reports/:user_id", post(send_report_now))
}

#[derive(Debug, Serialize)]
pub struct SendReportResponse {
    pub status: &'static str,
    pub delivered: bool,
}

/// POST /admin/reports/:user_id
#[instrument(skip(state, _admin))]
pub async fn send_report_now(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(user_id): Path<Uuid>,
) -> Result<Json<SendReportResponse>, (StatusCode, String)> {
    match state.scheduler.send_now(user_id).await {
        Ok(Some(result)) => {
            info!(%user_id, delivered = result.success, "operator resend");
            Ok(Json(SendReportResponse {
                status: "sent",
                delivered: result.success,
            }))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => {
            error!(error = ?e, %user_id, "operator resend failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into()))
        }
    }
}

use axum::{
    extract::{rejection::FormRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use tracing::{error, instrument, warn};

use super::services::Outcome;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/whatsapp", post(whatsapp_webhook))
        .route("/healthz", get(healthz))
}

type JsonReply = (StatusCode, Json<Value>);

/// POST /webhooks/whatsapp
#[instrument(skip_all)]
pub async fn whatsapp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> JsonReply {
    let Ok(Form(params)) = form else {
        warn!("webhook body is not a form");
        return invalid_request();
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !state.messenger.validate_webhook(signature, &params) {
        warn!("webhook signature rejected");
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Invalid signature" })));
    }

    let msg = match state.messenger.parse_incoming(&params, state.clock.now()) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "invalid webhook payload");
            return invalid_request();
        }
    };

    match state.pipeline.handle(&msg).await {
        Ok(Outcome::Replied { kind }) => (
            StatusCode::OK,
            Json(json!({ "status": "success", "type": kind })),
        ),
        Ok(Outcome::TooLong) => (
            StatusCode::OK,
            Json(json!({ "status": "error", "message": "Message too long" })),
        ),
        Err(e) => {
            error!(error = ?e, from = %msg.from, "webhook processing failed");
            state.pipeline.apologize(&msg).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
        }
    }
}

fn invalid_request() -> JsonReply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid webhook request" })),
    )
}

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let timestamp = state
        .clock
        .now()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

use crate::transport::http::types::{json_422, ApiResponse, AppState, TransactionRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Accepts a transaction intent. 202 means the intent was queued, not applied:
/// poll `/balances/{id}` to observe the effect.
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 202, description = "Intent accepted for asynchronous application", body = ApiResponse),
        (status = 400, description = "account_id, amount, idempotency_key required", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 503, description = "Event channel unavailable", body = ApiResponse)
    )
)]
pub async fn request_transaction_handler(
    State(state): State<AppState>,
    request: Result<Json<TransactionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(
                e,
                r#"{"account_id": "...", "amount": <non-zero integer>, "idempotency_key": "..."}"#,
            )
            .into_response();
        }
    };

    match state
        .gateway
        .request_transaction(&request.account_id, request.amount, &request.idempotency_key)
        .await
    {
        Ok(event) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(serde_json::json!(event))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

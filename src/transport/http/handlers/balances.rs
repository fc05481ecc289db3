use crate::transport::http::types::{ApiResponse, AppState, BalanceResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/balances/{id}",
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Sum of committed entries (0 for unknown ids)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn balance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.gateway.balance(&id).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!(BalanceResponse {
                account_id: id,
                balance,
            }))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

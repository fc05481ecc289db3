use crate::transport::http::types::{json_422, ApiResponse, AppState, CreateAccountRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse),
        (status = 400, description = "name and public_hash required", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn create_account_handler(
    State(state): State<AppState>,
    request: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, r#"{"name": "...", "public_hash": "..."}"#).into_response();
        }
    };

    match state
        .gateway
        .create_account(&request.name, &request.public_hash)
        .await
    {
        Ok(account) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "id": account.id,
                "name": account.name,
                "public_hash": account.public_hash,
            }))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Account found", body = ApiResponse),
        (status = 404, description = "No such account", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn get_account_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.gateway.account(&id).await {
        Ok(Some(account)) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!(account))),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!("Account '{}' not found", id))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Entries are listed even for ids with no account row (entries are not tied to
/// accounts by a foreign key).
#[utoipa::path(
    get,
    path = "/accounts/{id}/entries",
    params(
        ("id" = String, Path, description = "Account id")
    ),
    responses(
        (status = 200, description = "Committed entries, oldest first", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn list_entries_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.gateway.entries(&id).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(ApiResponse::ok(serde_json::json!({
                "account_id": id,
                "entries": entries,
            }))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

use crate::app::command_gateway::{CommandGateway, GatewayError};
use crate::transport::events::ChannelError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CommandGateway>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateAccountRequest {
    pub name: String,
    /// Opaque commitment, stored verbatim.
    pub public_hash: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TransactionRequest {
    pub account_id: String,
    /// Minor units; positive = credit, negative = debit, never zero.
    pub amount: i64,
    pub idempotency_key: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BalanceResponse {
    pub account_id: String,
    pub balance: i64,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::err(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
}

pub fn gateway_error_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::Channel(ChannelError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        GatewayError::Channel(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = gateway_error_status(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ApiResponse::err(self.to_string()))).into_response()
    }
}

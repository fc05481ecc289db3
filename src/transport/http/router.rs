use crate::domain::model::{Account, LedgerEntry, TransactionRequested};
use crate::transport::http::handlers::{accounts, balances, health, transactions};
use crate::transport::http::types::{
    ApiResponse, BalanceResponse, CreateAccountRequest, TransactionRequest,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        accounts::create_account_handler,
        accounts::get_account_handler,
        accounts::list_entries_handler,
        transactions::request_transaction_handler,
        balances::balance_handler
    ),
    components(schemas(
        ApiResponse,
        CreateAccountRequest,
        TransactionRequest,
        BalanceResponse,
        Account,
        LedgerEntry,
        TransactionRequested
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/accounts", post(accounts::create_account_handler))
        .route("/accounts/:id", get(accounts::get_account_handler))
        .route("/accounts/:id/entries", get(accounts::list_entries_handler))
        .route("/transactions", post(transactions::request_transaction_handler))
        .route("/balances/:id", get(balances::balance_handler))
        .with_state(app_state)
}

pub mod router;
pub mod types;
pub mod handlers {
    pub mod accounts;
    pub mod balances;
    pub mod health;
    pub mod transactions;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;

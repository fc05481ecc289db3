pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::application_consumer::{ApplicationConsumer, ConsumerStats};
pub use app::application_engine::ApplicationEngine;
pub use app::command_gateway::{CommandGateway, GatewayError};
pub use domain::model::{
    Account, ApplyOutcome, LedgerEntry, RejectReason, TransactionRequested, ValidationError,
};
pub use infra::Config;
pub use storage::ledger::{LedgerStore, PostgresLedgerStore, SqliteLedgerStore, StoreError};
pub use transport::events::{EventChannel, InMemoryChannel, NatsChannel};

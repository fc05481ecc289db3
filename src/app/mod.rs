pub mod application_consumer;
pub mod application_engine;
pub mod command_gateway;

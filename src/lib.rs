pub mod config;
pub mod ingest;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod state;
pub mod transport;

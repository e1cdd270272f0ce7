pub mod connection;
pub mod orchestrator;
pub mod outbound;

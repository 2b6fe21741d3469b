pub mod config;
pub mod coordinator;
pub mod formatter;
pub mod intent;
pub mod lookups;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod sqlite;
pub mod telemetry;

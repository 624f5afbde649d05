pub mod discord;
pub mod env;
pub mod telemetry;

pub mod client;
pub mod config;
pub mod envelope;
pub mod integration;
pub mod models;
pub mod push;

pub use client::MekariError;
pub use integration::{IntegrationResolver, MekariGateway};
pub use models::RemoteProductRecord;
pub use push::{PushError, PushReport, push_products};

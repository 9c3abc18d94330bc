//! Reconciliation of the local catalog against the Mekari product registry.

pub mod engine;
pub mod error;
pub mod naming;
pub mod pass;

pub use engine::{EngineState, EngineStatus, Reconciler, SkipReason, SyncOutcome, SyncReport, SyncTrigger};

use crate::mekari::{MekariError, RemoteProductRecord};
use std::future::Future;

/// Source of remote product records for a pass.
pub trait RemoteCatalog: Send + Sync {
    fn is_configured(&self) -> impl Future<Output = bool> + Send;

    fn fetch_all(
        &self,
    ) -> impl Future<Output = Result<Vec<RemoteProductRecord>, MekariError>> + Send;
}

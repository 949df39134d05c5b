//! Interfaces to the chain-facing collaborators.
//!
//! The engine consumes snapshots and produces requests; these traits are the
//! seams where the chain layer plugs in.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::engine::{LiquidationRequest, TransactionHandle};
use crate::error::Result;
use crate::position::UserPositionSummary;

/// Source of normalized position snapshots.
#[async_trait]
pub trait PositionSnapshotProvider: Send + Sync {
    /// Fetch a fresh snapshot for `user`.
    ///
    /// Fails with `DataUnavailable` when the node cannot be reached and with
    /// `Malformed` when returned values do not fit the decimal data model.
    async fn fetch(&self, user: Address) -> Result<UserPositionSummary>;
}

/// Sends liquidation requests on-chain.
#[async_trait]
pub trait LiquidationSubmitter: Send + Sync {
    /// Submit `request`. Returns once the node has accepted the transaction;
    /// inclusion and execution outcome are not tracked.
    async fn submit(&self, request: &LiquidationRequest) -> Result<TransactionHandle>;
}

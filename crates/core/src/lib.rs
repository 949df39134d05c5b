//! Liquidator core logic.
//!
//! This crate provides:
//! - Position snapshot data model (decimal units, health factor sentinel)
//! - Liquidation decision engine for a configured debt/collateral pair
//! - Collaborator traits for snapshot fetching and transaction submission
//! - WAD/RAY fixed-point helpers for index normalization
//! - Configuration loading and resolution
//! - Scanner orchestration (one-shot or polling)

mod collaborators;
pub mod config;
mod engine;
mod error;
pub mod math;
mod position;
mod scanner;

pub use collaborators::{LiquidationSubmitter, PositionSnapshotProvider};
pub use config::{LiquidationPolicy, LiquidatorConfig, ResolvedConfig, ScanMode};
pub use engine::{LiquidationDecisionEngine, LiquidationRequest, TransactionHandle};
pub use error::{Error, Result};
pub use position::{AssetPosition, HealthFactor, UserPositionSummary};
pub use scanner::{Cycle, CycleReport, Scanner};

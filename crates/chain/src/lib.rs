//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for the Aave V3 Pool and UI data provider
//! - Reserve configuration decoding and index normalization
//! - Position snapshot fetching (`PositionSnapshotProvider`)
//! - Transaction signing and sending (`LiquidationSubmitter`)

mod bindings;
mod provider;
pub mod reserve;
mod signer;

use alloy::transports::http::reqwest::Url;
use liquidator_core::{Error, Result};

pub use bindings::{IPool, IUiPoolDataProviderV3, ReserveDataLegacy, UserReserveData};
pub use provider::{build_summary, AaveSnapshotProvider};
pub use reserve::{ReserveConfiguration, ReserveReader, ReserveSnapshot};
pub use signer::{encode_liquidation_call, NonceManager, PoolLiquidationSubmitter, PRIVATE_KEY_ENV};

pub(crate) fn rpc_url(url: &str) -> Result<Url> {
    url.parse()
        .map_err(|e| Error::Config(format!("invalid RPC URL {url}: {e}")))
}

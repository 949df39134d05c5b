//! Liquidation transaction submission.
//!
//! Signs `Pool.liquidationCall` with a local key and hands it to the node.
//! Nonces come from a local atomic counter seeded from the chain, so
//! submissions running concurrently never share one. Gas is filled by the
//! provider. Submission returns on acceptance; receipts are not awaited.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use liquidator_core::config::ResolvedConfig;
use liquidator_core::math;
use liquidator_core::{Error, LiquidationRequest, LiquidationSubmitter, Result, TransactionHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::bindings::IPool;
use crate::reserve::ReserveReader;
use crate::rpc_url;

/// Environment variable holding the liquidator's hex private key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Local nonce counter for the signer account.
#[derive(Debug)]
pub struct NonceManager {
    current: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
        }
    }

    /// Take the next nonce. Lock-free; concurrent callers get distinct values.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Nonce the next transaction will use.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Reset to the chain's pending count (after a rejected send).
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
    }
}

/// Sends liquidation calls to the pool.
pub struct PoolLiquidationSubmitter {
    /// RPC URL for sending transactions
    rpc_url: String,
    /// Signer wallet
    wallet: EthereumWallet,
    /// Signer address
    pub address: Address,
    pool: Address,
    chain_id: u64,
    reserves: ReserveReader,
    nonce: NonceManager,
}

fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    private_key
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("invalid private key: {e}")))
}

impl PoolLiquidationSubmitter {
    /// Create a submitter from a hex private key (with or without `0x`),
    /// starting from a known nonce.
    pub fn with_nonce(
        private_key: &str,
        rpc_url: impl Into<String>,
        pool: Address,
        chain_id: u64,
        nonce: u64,
    ) -> Result<Self> {
        let signer = parse_signer(private_key)?;
        let address = signer.address();
        let rpc_url = rpc_url.into();

        Ok(Self {
            reserves: ReserveReader::new(rpc_url.clone(), pool),
            rpc_url,
            wallet: EthereumWallet::from(signer),
            address,
            pool,
            chain_id,
            nonce: NonceManager::new(nonce),
        })
    }

    /// Create a submitter, seeding the nonce from the chain's pending count.
    pub async fn connect(
        private_key: &str,
        rpc_url: impl Into<String>,
        pool: Address,
        chain_id: u64,
    ) -> Result<Self> {
        let rpc_url = rpc_url.into();
        let address = parse_signer(private_key)?.address();
        let nonce = pending_nonce(&rpc_url, address).await?;

        let submitter = Self::with_nonce(private_key, rpc_url, pool, chain_id, nonce)?;
        info!(address = %address, chain_id, nonce, "Transaction signer initialized");
        Ok(submitter)
    }

    /// Create a submitter with the key from `PRIVATE_KEY`.
    pub async fn from_env(config: &ResolvedConfig) -> Result<Self> {
        let key = std::env::var(PRIVATE_KEY_ENV)
            .map_err(|_| Error::Config(format!("{PRIVATE_KEY_ENV} environment variable not set")))?;
        Self::connect(&key, config.rpc_url.clone(), config.contracts.pool, config.chain_id).await
    }

    /// Debt-asset amount in raw units, rounded toward zero. Zero is rejected,
    /// as are inactive or paused reserves on either side.
    async fn debt_to_cover(&self, request: &LiquidationRequest) -> Result<U256> {
        let (debt, collateral) = tokio::join!(
            self.reserves.fetch(request.debt_asset),
            self.reserves.fetch(request.collateral_asset)
        );
        let debt = debt.map_err(|e| Error::SubmissionRejected(format!("debt reserve lookup failed: {e}")))?;
        let collateral = collateral
            .map_err(|e| Error::SubmissionRejected(format!("collateral reserve lookup failed: {e}")))?;
        debt.ensure_liquidatable()?;
        collateral.ensure_liquidatable()?;

        let decimals = debt.decimals();
        let raw = math::to_raw(request.purchase_amount, decimals)
            .map_err(|e| Error::SubmissionRejected(e.to_string()))?;
        if raw.is_zero() {
            return Err(Error::SubmissionRejected(format!(
                "purchase amount {} rounds to zero with {decimals} decimals",
                request.purchase_amount
            )));
        }
        Ok(raw)
    }

    /// Build the `liquidationCall` transaction, taking the next local nonce.
    fn liquidation_transaction(&self, request: &LiquidationRequest, debt_to_cover: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.address)
            .with_to(self.pool)
            .with_chain_id(self.chain_id)
            .with_nonce(self.nonce.next())
            .with_input(encode_liquidation_call(request, debt_to_cover))
    }

    async fn resync_nonce(&self) {
        match pending_nonce(&self.rpc_url, self.address).await {
            Ok(nonce) => {
                debug!(nonce, "Nonce resynced from chain");
                self.nonce.reset(nonce);
            }
            Err(e) => warn!(error = %e, "Failed to resync nonce"),
        }
    }
}

async fn pending_nonce(url: &str, address: Address) -> Result<u64> {
    let provider = ProviderBuilder::new().on_http(rpc_url(url)?);
    provider
        .get_transaction_count(address)
        .pending()
        .await
        .map_err(|e| Error::DataUnavailable(format!("nonce lookup for {address}: {e}")))
}

/// ABI-encode `liquidationCall` for `request` with a raw `debt_to_cover`.
pub fn encode_liquidation_call(request: &LiquidationRequest, debt_to_cover: U256) -> Bytes {
    IPool::liquidationCallCall {
        collateralAsset: request.collateral_asset,
        debtAsset: request.debt_asset,
        user: request.liquidated_user,
        debtToCover: debt_to_cover,
        receiveAToken: request.receive_collateral_as_token,
    }
    .abi_encode()
    .into()
}

#[async_trait]
impl LiquidationSubmitter for PoolLiquidationSubmitter {
    async fn submit(&self, request: &LiquidationRequest) -> Result<TransactionHandle> {
        if request.liquidator != self.address {
            return Err(Error::SubmissionRejected(format!(
                "request liquidator {} does not match signer {}",
                request.liquidator, self.address
            )));
        }

        let debt_to_cover = self.debt_to_cover(request).await?;
        let tx = self.liquidation_transaction(request, debt_to_cover);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(rpc_url(&self.rpc_url)?);

        debug!(
            user = %request.liquidated_user,
            debt_to_cover = %debt_to_cover,
            nonce = ?tx.nonce,
            "Sending liquidationCall"
        );

        let start = Instant::now();
        let pending = match provider.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(user = %request.liquidated_user, error = %e, "liquidationCall rejected");
                self.resync_nonce().await;
                return Err(Error::SubmissionRejected(e.to_string()));
            }
        };
        let tx_hash = *pending.tx_hash();

        info!(
            tx_hash = %tx_hash,
            user = %request.liquidated_user,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Liquidation submitted"
        );

        Ok(TransactionHandle { tx_hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::sync::Arc;
    use rust_decimal_macros::dec;

    /// Anvil's first dev account
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    const POOL: Address = address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
    const USER: Address = address!("95af7FfFE0e7d40956D77bF3f55156D4483b4693");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    fn request(liquidator: Address) -> LiquidationRequest {
        LiquidationRequest {
            liquidator,
            liquidated_user: USER,
            debt_asset: USDC,
            collateral_asset: WETH,
            purchase_amount: dec!(1.25),
            receive_collateral_as_token: false,
        }
    }

    #[test]
    fn test_signer_address_from_key() {
        let submitter = PoolLiquidationSubmitter::with_nonce(DEV_KEY, "http://localhost:8545", POOL, 1, 0).unwrap();
        assert_eq!(submitter.address, DEV_ADDRESS);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let err = PoolLiquidationSubmitter::with_nonce("not-a-key", "http://localhost:8545", POOL, 1, 0)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_liquidator_mismatch_rejected_before_rpc() {
        // Unroutable URL: the check must fail before any network call
        let submitter = PoolLiquidationSubmitter::with_nonce(DEV_KEY, "http://127.0.0.1:1", POOL, 1, 0).unwrap();
        let err = submitter.submit(&request(USER)).await.unwrap_err();
        assert!(matches!(err, Error::SubmissionRejected(msg) if msg.contains("does not match")));
    }

    #[test]
    fn test_nonce_manager_hands_out_distinct_nonces() {
        let nonces = NonceManager::new(7);
        assert_eq!(nonces.next(), 7);
        assert_eq!(nonces.next(), 8);
        assert_eq!(nonces.current(), 9);

        nonces.reset(8);
        assert_eq!(nonces.next(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_transactions_get_distinct_nonces() {
        let submitter = Arc::new(
            PoolLiquidationSubmitter::with_nonce(DEV_KEY, "http://localhost:8545", POOL, 1, 42).unwrap(),
        );

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let submitter = submitter.clone();
                tokio::spawn(async move {
                    submitter
                        .liquidation_transaction(&request(DEV_ADDRESS), U256::from(1_250_000u64))
                        .nonce
                })
            })
            .collect();

        let mut nonces = Vec::new();
        for handle in handles {
            nonces.push(handle.await.unwrap().unwrap());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, (42..58).collect::<Vec<u64>>());
    }

    #[test]
    fn test_liquidation_transaction_fields() {
        let submitter = PoolLiquidationSubmitter::with_nonce(DEV_KEY, "http://localhost:8545", POOL, 1, 3).unwrap();
        let tx = submitter.liquidation_transaction(&request(DEV_ADDRESS), U256::from(1u64));

        assert_eq!(tx.from, Some(DEV_ADDRESS));
        assert_eq!(tx.nonce, Some(3));
        assert_eq!(tx.chain_id, Some(1));
        assert_eq!(tx.to, Some(POOL.into()));
    }

    #[test]
    fn test_encode_liquidation_call() {
        let debt_to_cover = U256::from(1_250_000u64);
        let calldata = encode_liquidation_call(&request(DEV_ADDRESS), debt_to_cover);

        assert_eq!(&calldata[..4], IPool::liquidationCallCall::SELECTOR.as_slice());
        // selector + five static words
        assert_eq!(calldata.len(), 4 + 5 * 32);

        let decoded = IPool::liquidationCallCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.collateralAsset, WETH);
        assert_eq!(decoded.debtAsset, USDC);
        assert_eq!(decoded.user, USER);
        assert_eq!(decoded.debtToCover, debt_to_cover);
        assert!(!decoded.receiveAToken);
    }

    #[test]
    fn test_encode_receive_a_token_flag() {
        let mut req = request(DEV_ADDRESS);
        req.receive_collateral_as_token = true;
        let calldata = encode_liquidation_call(&req, U256::from(1u64));
        let decoded = IPool::liquidationCallCall::abi_decode(&calldata, true).unwrap();
        assert!(decoded.receiveAToken);
    }
}

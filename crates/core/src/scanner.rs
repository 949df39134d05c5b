//! Scanner orchestration: fetch → evaluate → submit.

use alloy::primitives::Address;
use dashmap::DashSet;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::collaborators::{LiquidationSubmitter, PositionSnapshotProvider};
use crate::config::{ScanMode, ScannerSettings};
use crate::engine::{LiquidationDecisionEngine, LiquidationRequest, TransactionHandle};
use crate::error::Result;

/// Counters for one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Snapshots fetched successfully
    pub fetched: usize,
    /// Snapshots that needed no action
    pub healthy: usize,
    /// Requests produced by the engine
    pub triggered: usize,
    /// Requests logged instead of sent
    pub dry_run: usize,
    /// Requests skipped because a previous submission is still pending
    pub skipped_in_flight: usize,
    /// Submissions accepted by the node
    pub submitted: usize,
    /// Fetch, validation or submission failures
    pub failed: usize,
}

/// Result of [`Scanner::run_cycle`]: counters plus submissions still running.
pub struct Cycle {
    pub report: CycleReport,
    pub pending: Vec<JoinHandle<Result<TransactionHandle>>>,
}

impl Cycle {
    /// Wait for this cycle's submissions and fold their outcome into the report.
    pub async fn wait(self) -> CycleReport {
        let mut report = self.report;
        for handle in self.pending {
            match handle.await {
                Ok(Ok(_)) => report.submitted += 1,
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Submission task panicked");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Holds a user's in-flight entry until dropped.
struct InFlightSlot {
    in_flight: Arc<DashSet<Address>>,
    user: Address,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.in_flight.remove(&self.user);
    }
}

/// Drives the decision engine over the watched accounts.
#[derive(Clone)]
pub struct Scanner {
    provider: Arc<dyn PositionSnapshotProvider>,
    submitter: Arc<dyn LiquidationSubmitter>,
    engine: LiquidationDecisionEngine,
    settings: ScannerSettings,
    /// Users with a submission that has not returned yet
    in_flight: Arc<DashSet<Address>>,
}

impl Scanner {
    pub fn new(
        provider: Arc<dyn PositionSnapshotProvider>,
        submitter: Arc<dyn LiquidationSubmitter>,
        engine: LiquidationDecisionEngine,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            provider,
            submitter,
            engine,
            settings,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Run according to the configured mode.
    pub async fn run(&self) -> Result<()> {
        match self.settings.mode {
            ScanMode::Once => {
                let report = self.run_cycle().await.wait().await;
                info!(?report, "Scan complete");
            }
            ScanMode::Poll => {
                info!(
                    interval_ms = self.settings.poll_interval.as_millis() as u64,
                    users = self.settings.users.len(),
                    "Starting scanner loop"
                );
                let mut ticker = interval(self.settings.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    // Pending submissions keep running detached; the in-flight
                    // set stops the next cycles from resubmitting.
                    let cycle = self.run_cycle().await;
                    info!(report = ?cycle.report, pending = cycle.pending.len(), "Cycle complete");
                }
            }
        }
        Ok(())
    }

    /// One pass over every watched user.
    pub async fn run_cycle(&self) -> Cycle {
        let cycle_start = Instant::now();
        let mut report = CycleReport::default();
        let mut pending = Vec::new();

        let snapshots: Vec<_> = stream::iter(self.settings.users.iter().copied())
            .map(|user| async move { (user, self.provider.fetch(user).await) })
            .buffer_unordered(self.settings.max_concurrent_fetches)
            .collect()
            .await;

        for (user, snapshot) in snapshots {
            let summary = match snapshot {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(user = %user, error = %e, "Failed to fetch position, skipping this cycle");
                    report.failed += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let request = match self.engine.evaluate(&summary, user) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(
                        user = %user,
                        health_factor = %summary.health_factor,
                        "No liquidation needed"
                    );
                    report.healthy += 1;
                    continue;
                }
                Err(e) => {
                    warn!(user = %user, error = %e, "Rejected malformed snapshot");
                    report.failed += 1;
                    continue;
                }
            };
            report.triggered += 1;

            info!(
                user = %user,
                health_factor = %summary.health_factor,
                total_collateral_base = %summary.total_collateral_base,
                total_debt_base = %summary.total_debt_base,
                fetched_at = summary.fetched_at,
                debt = %request.debt_asset,
                collateral = %request.collateral_asset,
                purchase_amount = %request.purchase_amount,
                "Liquidation opportunity"
            );

            if !self.in_flight.insert(user) {
                warn!(user = %user, "Previous submission still pending, skipping");
                report.skipped_in_flight += 1;
                continue;
            }

            if self.settings.dry_run {
                self.log_dry_run(&request);
                self.in_flight.remove(&user);
                report.dry_run += 1;
                continue;
            }

            pending.push(self.spawn_submission(request));
        }

        debug!(
            elapsed_ms = cycle_start.elapsed().as_millis() as u64,
            triggered = report.triggered,
            "Scan cycle finished"
        );

        Cycle { report, pending }
    }

    fn spawn_submission(&self, request: LiquidationRequest) -> JoinHandle<Result<TransactionHandle>> {
        let submitter = self.submitter.clone();
        let slot = InFlightSlot {
            in_flight: self.in_flight.clone(),
            user: request.liquidated_user,
        };

        tokio::spawn(async move {
            // Released on return and on panic
            let _slot = slot;
            let user = request.liquidated_user;
            let submit_start = Instant::now();
            let result = submitter.submit(&request).await;

            match &result {
                Ok(handle) => info!(
                    user = %user,
                    tx_hash = %handle.tx_hash,
                    submit_ms = submit_start.elapsed().as_millis() as u64,
                    "Liquidation submitted"
                ),
                Err(e) => error!(user = %user, error = %e, "Liquidation submission failed"),
            }

            result
        })
    }

    fn log_dry_run(&self, request: &LiquidationRequest) {
        match serde_json::to_string(request) {
            Ok(json) => info!(request = %json, "[DRY RUN] Liquidation not submitted"),
            Err(e) => warn!(error = %e, "[DRY RUN] Failed to serialize request"),
        }
    }

    /// Check if a submission for `user` is still pending.
    pub fn is_in_flight(&self, user: &Address) -> bool {
        self.in_flight.contains(user)
    }
}

//! Reconciliation of locally cached data flags against the server.
//!
//! The local flags are eager hints written on success paths. Whenever a
//! navigation decision depends on them they are re-checked against the three
//! collection endpoints and overwritten with what the server reports.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiResult, DataSource, FinanceApi};
use crate::models::{FallbackPolicy, SessionState};

/// Joined result of reading the three collections once
#[derive(Debug)]
pub struct DataProbe {
    pub transactions: ApiResult<usize>,
    pub accounts: ApiResult<usize>,
    pub files: ApiResult<usize>,
}

/// What a probe says about the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// At least one collection is non-empty
    Found,
    /// All three reads succeeded and came back empty
    Empty,
    /// Nothing found and at least one read failed
    Unavailable,
}

impl DataProbe {
    /// Issue the three reads together and wait for all of them.
    ///
    /// A failed read does not cancel the others; each result is kept.
    pub async fn run(api: &dyn FinanceApi) -> Self {
        let (transactions, accounts, files) = futures::future::join3(
            DataSource::Transactions.list(api),
            DataSource::Accounts.list(api),
            DataSource::Files.list(api),
        )
        .await;

        let probe = Self {
            transactions: transactions.map(|items| items.len()),
            accounts: accounts.map(|items| items.len()),
            files: files.map(|items| items.len()),
        };
        for (source, result) in probe.results() {
            match result {
                Ok(count) => debug!("📊 {}: {} items", source, count),
                Err(e) => warn!("⚠️ Could not read {}: {}", source, e),
            }
        }
        probe
    }

    pub fn results(&self) -> [(DataSource, &ApiResult<usize>); 3] {
        [
            (DataSource::Transactions, &self.transactions),
            (DataSource::Accounts, &self.accounts),
            (DataSource::Files, &self.files),
        ]
    }

    /// Whether the given source was read successfully and is non-empty
    pub fn has(&self, source: DataSource) -> bool {
        let result = match source {
            DataSource::Transactions => &self.transactions,
            DataSource::Accounts => &self.accounts,
            DataSource::Files => &self.files,
        };
        matches!(result, Ok(count) if *count > 0)
    }

    pub fn outcome(&self) -> ProbeOutcome {
        let results = self.results();
        if results.iter().any(|(_, r)| matches!(r, Ok(count) if *count > 0)) {
            ProbeOutcome::Found
        } else if results.iter().all(|(_, r)| r.is_ok()) {
            ProbeOutcome::Empty
        } else {
            ProbeOutcome::Unavailable
        }
    }
}

/// Answer from a single verification against the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Present,
    Absent,
    /// Reads failed; the value comes from the fallback policy
    Assumed(bool),
}

impl Verification {
    pub fn has_data(self) -> bool {
        match self {
            Verification::Present => true,
            Verification::Absent => false,
            Verification::Assumed(value) => value,
        }
    }
}

/// Which precondition selected the reads in a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    /// An optimistic data flag was set
    Flagged,
    /// A bank-link token was present
    BankLinked,
    /// The account had data at some point
    HadDataBefore,
    /// No precondition held; nothing was read
    Skipped,
}

/// Fallback policy per reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub flagged: FallbackPolicy,
    pub bank_linked: FallbackPolicy,
    pub had_data_before: FallbackPolicy,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            flagged: FallbackPolicy::ConservativeOnError,
            bank_linked: FallbackPolicy::OptimisticOnError,
            had_data_before: FallbackPolicy::OptimisticOnError,
        }
    }
}

impl ReconcilePolicy {
    /// Same policy for every step
    pub fn uniform(policy: FallbackPolicy) -> Self {
        Self {
            flagged: policy,
            bank_linked: policy,
            had_data_before: policy,
        }
    }
}

/// Result of `has_existing_data`: the answer plus the updated flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub has_data: bool,
    pub step: ReconcileStep,
    pub verification: Option<Verification>,
    pub state: SessionState,
}

pub struct Reconciler {
    api: Arc<dyn FinanceApi>,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(api: Arc<dyn FinanceApi>, policy: ReconcilePolicy) -> Self {
        Self { api, policy }
    }

    /// Read the three collections and answer with the given policy on failure
    pub async fn verify_data_exists(&self, policy: FallbackPolicy, prior: &SessionState) -> Verification {
        match DataProbe::run(self.api.as_ref()).await.outcome() {
            ProbeOutcome::Found => Verification::Present,
            ProbeOutcome::Empty => Verification::Absent,
            ProbeOutcome::Unavailable => {
                let assumed = match policy {
                    FallbackPolicy::ConservativeOnError => prior.any_optimistic_flag(),
                    FallbackPolicy::OptimisticOnError => true,
                };
                warn!("⚠️ Data check failed, falling back to {:?} -> {}", policy, assumed);
                Verification::Assumed(assumed)
            }
        }
    }

    /// Decide whether the user currently has any connected data.
    ///
    /// Exactly one step's reads run, picked by the first precondition that
    /// holds: optimistic flag, bank token, earlier data, or none at all.
    pub async fn has_existing_data(&self, mut state: SessionState) -> Reconciliation {
        let step = if state.any_optimistic_flag() {
            ReconcileStep::Flagged
        } else if state.has_bank_link() {
            ReconcileStep::BankLinked
        } else if state.has_ever_had_data {
            ReconcileStep::HadDataBefore
        } else {
            debug!("No data flags or bank link, skipping server check");
            return Reconciliation {
                has_data: false,
                step: ReconcileStep::Skipped,
                verification: None,
                state,
            };
        };

        let policy = match step {
            ReconcileStep::Flagged => self.policy.flagged,
            ReconcileStep::BankLinked => self.policy.bank_linked,
            _ => self.policy.had_data_before,
        };

        info!("🔍 Verifying data with the server ({:?})", step);
        let verification = self.verify_data_exists(policy, &state).await;

        match (step, verification) {
            (_, Verification::Present) => {
                state.has_connected_data = true;
                if step == ReconcileStep::Flagged {
                    state.has_ever_had_data = true;
                }
            }
            (ReconcileStep::Flagged, Verification::Absent) => state.clear_data_flags(),
            (_, Verification::Absent) => state.has_ever_had_data = false,
            (_, Verification::Assumed(_)) => {}
        }

        let has_data = verification.has_data();
        info!("✅ Data check ({:?}): {:?} -> has data = {}", step, verification, has_data);

        Reconciliation {
            has_data,
            step,
            verification: Some(verification),
            state,
        }
    }

    /// Unconditional check used right after authentication; failed reads count as empty
    pub async fn probe_remote(&self) -> bool {
        let probe = DataProbe::run(self.api.as_ref()).await;
        let found = probe.outcome() == ProbeOutcome::Found;
        info!("🔍 Post-login data probe: has data = {}", found);
        found
    }

    /// Read the collections once, for callers that need per-source answers
    pub async fn probe(&self) -> DataProbe {
        DataProbe::run(self.api.as_ref()).await
    }
}

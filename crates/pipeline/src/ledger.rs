//! Post-success usage accounting.
//!
//! Runs only after a generation succeeded: one counter increment for
//! anonymous callers, or N sequential single-credit deductions for an
//! N-cost provider. The immutable usage-log entry is written before the
//! first deduction attempt so billing records exist even when the
//! deduction itself fails. There are no refunds by design -- failed
//! generations never reach this module.

use pixshop_core::intent::GenerationKind;
use pixshop_core::provider::ProviderProfile;
use pixshop_db::models::usage_log::CreateUsageLog;

use crate::caller::Caller;
use crate::store::UsageStore;

/// What the ledger actually committed.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    /// Credits (or free generations) left after the commit. `None` when
    /// the mutation failed and the true remainder is unknown.
    pub remaining: Option<i64>,
    /// Credits actually deducted (0 for anonymous callers).
    pub charged: i64,
}

/// Accounting commit policy.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    /// Free generations per anonymous session, for remaining-quota math.
    pub quota: i64,
}

impl CreditLedger {
    pub fn new(quota: i64) -> Self {
        Self { quota }
    }

    /// Commit usage for one successful generation.
    ///
    /// Never fails the request: accounting errors are logged loudly (the
    /// caller already has their image) and surface as `remaining: None`.
    /// A multi-credit cost is deducted one credit at a time; if a later
    /// deduction fails after an earlier one succeeded the user ends up
    /// under-charged, never over-charged.
    pub async fn commit(
        &self,
        store: &dyn UsageStore,
        caller: &Caller,
        profile: &ProviderProfile,
        kind: GenerationKind,
        duration_ms: i64,
    ) -> LedgerOutcome {
        let cost = match caller {
            Caller::User { .. } => profile.credit_cost,
            Caller::Anonymous { .. } => 0,
        };

        // The usage log precedes any deduction attempt, regardless of how
        // the deduction goes.
        let entry = CreateUsageLog {
            user_id: caller.user_id(),
            session_id: caller.session_id().map(str::to_string),
            provider: profile.id.to_string(),
            kind: kind.to_string(),
            duration_ms,
            outcome: "success".into(),
            credits_charged: cost,
        };
        if let Err(e) = store.append_usage_log(entry).await {
            tracing::error!(
                provider = %profile.id,
                error = %e,
                "Usage log write failed; accounting records are incomplete",
            );
        }

        match caller {
            Caller::Anonymous {
                session_id,
                ip_address,
            } => {
                let Some(session) = session_id.as_deref() else {
                    // The gate rejects sessionless callers; reaching this
                    // point without one is a sequencing bug.
                    tracing::error!("Ledger commit for anonymous caller without a session");
                    return LedgerOutcome {
                        remaining: None,
                        charged: 0,
                    };
                };
                match store.increment_anonymous(session, ip_address).await {
                    Ok(new_count) => LedgerOutcome {
                        remaining: Some((self.quota - new_count).max(0)),
                        charged: 0,
                    },
                    Err(e) => {
                        tracing::error!(
                            session_id = %session,
                            error = %e,
                            "Anonymous counter increment failed after successful generation",
                        );
                        LedgerOutcome {
                            remaining: None,
                            charged: 0,
                        }
                    }
                }
            }
            Caller::User { user_id } => self.deduct_sequential(store, *user_id, cost).await,
        }
    }

    /// Deduct `cost` credits as `cost` conditional single-credit
    /// decrements, stopping at the first failure.
    async fn deduct_sequential(
        &self,
        store: &dyn UsageStore,
        user_id: i64,
        cost: i64,
    ) -> LedgerOutcome {
        let mut charged = 0;
        let mut remaining = None;

        for step in 1..=cost {
            match store.deduct_one_credit(user_id).await {
                Ok(Some(balance)) => {
                    charged += 1;
                    remaining = Some(balance);
                }
                Ok(None) => {
                    // Balance hit zero mid-deduction (concurrent spend).
                    tracing::error!(
                        user_id,
                        step,
                        cost,
                        charged,
                        "Balance exhausted mid-deduction; user under-charged",
                    );
                    return LedgerOutcome {
                        remaining: Some(0),
                        charged,
                    };
                }
                Err(e) => {
                    tracing::error!(
                        user_id,
                        step,
                        cost,
                        charged,
                        error = %e,
                        "Credit deduction failed after successful generation; user under-charged",
                    );
                    return LedgerOutcome { remaining, charged };
                }
            }
        }

        LedgerOutcome { remaining, charged }
    }
}

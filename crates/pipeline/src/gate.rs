//! Pre-flight usage gate.
//!
//! Reads the caller's counter or balance and delegates the allow/deny
//! decision to the pure logic in `pixshop_core::usage`. Read-only: a check
//! never mutates usage state, so calling it twice without an intervening
//! successful generation returns the same answer.

use pixshop_core::types::DbId;
use pixshop_core::usage::{decide_anonymous, decide_authenticated, DenyReason, GateDecision};

use crate::caller::Caller;
use crate::store::UsageStore;

/// Quota/grant parameters the gate applies.
#[derive(Debug, Clone)]
pub struct UsageGate {
    /// Free generations per anonymous session.
    pub quota: i64,
    /// Credits granted when a user account first materializes.
    pub signup_grant: i64,
}

impl UsageGate {
    pub fn new(quota: i64, signup_grant: i64) -> Self {
        Self {
            quota,
            signup_grant,
        }
    }

    /// Check whether `caller` may run a generation costing `credit_cost`.
    ///
    /// Datastore read errors fail OPEN: an infrastructure blip must not
    /// block all traffic, so an unreadable counter or balance is treated
    /// as zero usage and the request is allowed. The error is logged.
    pub async fn check(
        &self,
        store: &dyn UsageStore,
        caller: &Caller,
        credit_cost: i64,
    ) -> GateDecision {
        match caller {
            Caller::User { user_id } => self.check_user(store, *user_id, credit_cost).await,
            Caller::Anonymous {
                session_id,
                ip_address,
            } => match session_id {
                None => GateDecision::Deny(DenyReason::SessionRequired),
                Some(session) => self.check_anonymous(store, session, ip_address).await,
            },
        }
    }

    async fn check_user(
        &self,
        store: &dyn UsageStore,
        user_id: DbId,
        credit_cost: i64,
    ) -> GateDecision {
        match store.credit_balance(user_id, self.signup_grant).await {
            Ok(balance) => decide_authenticated(balance, credit_cost),
            Err(e) => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Balance read failed, failing open",
                );
                GateDecision::Allow { remaining: credit_cost }
            }
        }
    }

    async fn check_anonymous(
        &self,
        store: &dyn UsageStore,
        session_id: &str,
        ip_address: &str,
    ) -> GateDecision {
        match store.anonymous_count(session_id, ip_address).await {
            Ok(count) => decide_anonymous(count, self.quota),
            Err(e) => {
                tracing::warn!(
                    session_id,
                    error = %e,
                    "Anonymous counter read failed, failing open",
                );
                GateDecision::Allow {
                    remaining: self.quota,
                }
            }
        }
    }
}

//! Pure usage-gate decision logic.
//!
//! The pipeline's gate reads counters and balances from the database, then
//! delegates the allow/deny decision to these functions so the boundary
//! arithmetic is unit-testable without I/O.

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Free generations an anonymous session may use before signing in.
pub const DEFAULT_ANONYMOUS_QUOTA: i64 = 20;

/// Credits granted when a user account first materializes.
pub const DEFAULT_SIGNUP_GRANT: i64 = 30;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Outcome of a pre-flight usage check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The request may proceed; `remaining` is the credits or free
    /// generations left *before* this request is accounted.
    Allow { remaining: i64 },
    /// The request must be rejected. Never retryable as-is.
    Deny(DenyReason),
}

/// Why a request was denied. Each variant carries the data the HTTP layer
/// needs to render an actionable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Anonymous caller sent no session identifier; retry with one.
    SessionRequired,
    /// Anonymous free quota is used up; signing in lifts the limit.
    QuotaExceeded { limit: i64, used: i64 },
    /// Authenticated balance is below the provider's cost.
    InsufficientCredits { balance: i64, required: i64 },
}

/// Decide for an anonymous caller given the observed request count.
pub fn decide_anonymous(request_count: i64, quota: i64) -> GateDecision {
    if request_count >= quota {
        GateDecision::Deny(DenyReason::QuotaExceeded {
            limit: quota,
            used: request_count,
        })
    } else {
        GateDecision::Allow {
            remaining: quota - request_count,
        }
    }
}

/// Decide for an authenticated caller given the observed balance and the
/// provider's per-generation cost.
pub fn decide_authenticated(balance: i64, cost: i64) -> GateDecision {
    if balance < cost {
        GateDecision::Deny(DenyReason::InsufficientCredits {
            balance,
            required: cost,
        })
    } else {
        GateDecision::Allow { remaining: balance }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Anonymous boundaries --

    #[test]
    fn anonymous_fresh_session_allowed() {
        assert_eq!(
            decide_anonymous(0, 20),
            GateDecision::Allow { remaining: 20 }
        );
    }

    #[test]
    fn anonymous_at_quota_minus_one_allowed() {
        assert_eq!(decide_anonymous(19, 20), GateDecision::Allow { remaining: 1 });
    }

    #[test]
    fn anonymous_at_quota_denied() {
        assert_eq!(
            decide_anonymous(20, 20),
            GateDecision::Deny(DenyReason::QuotaExceeded { limit: 20, used: 20 })
        );
    }

    #[test]
    fn anonymous_over_quota_denied() {
        assert_eq!(
            decide_anonymous(25, 20),
            GateDecision::Deny(DenyReason::QuotaExceeded { limit: 20, used: 25 })
        );
    }

    // -- Authenticated boundaries --

    #[test]
    fn balance_equal_to_cost_allowed() {
        assert_eq!(
            decide_authenticated(1, 1),
            GateDecision::Allow { remaining: 1 }
        );
    }

    #[test]
    fn balance_below_cost_denied() {
        assert_eq!(
            decide_authenticated(1, 2),
            GateDecision::Deny(DenyReason::InsufficientCredits {
                balance: 1,
                required: 2
            })
        );
    }

    #[test]
    fn zero_balance_denied_for_unit_cost() {
        assert_eq!(
            decide_authenticated(0, 1),
            GateDecision::Deny(DenyReason::InsufficientCredits {
                balance: 0,
                required: 1
            })
        );
    }

    #[test]
    fn decision_is_pure_and_repeatable() {
        // Two checks with no intervening accounting see the same answer.
        assert_eq!(decide_anonymous(7, 20), decide_anonymous(7, 20));
        assert_eq!(decide_authenticated(5, 2), decide_authenticated(5, 2));
    }
}

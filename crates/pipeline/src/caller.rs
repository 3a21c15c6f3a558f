//! Caller identity as seen by the pipeline.
//!
//! Authentication itself happens upstream; by the time a request reaches
//! the orchestrator it is either a validated user id or an anonymous
//! session fingerprint.

use pixshop_core::types::DbId;

/// Who is asking for a generation.
#[derive(Debug, Clone)]
pub enum Caller {
    /// Unauthenticated caller, identified by session id + client IP.
    /// The session id is optional because the gate -- not the transport
    /// layer -- owns the "session required" denial.
    Anonymous {
        session_id: Option<String>,
        ip_address: String,
    },
    /// Authenticated caller with a validated user id.
    User { user_id: DbId },
}

impl Caller {
    /// Owner tag stamped onto temporary uploads for traceability.
    pub fn owner_tag(&self) -> String {
        match self {
            Caller::Anonymous { session_id, .. } => {
                format!("anon:{}", session_id.as_deref().unwrap_or("-"))
            }
            Caller::User { user_id } => format!("user:{user_id}"),
        }
    }

    /// The user id, for authenticated callers.
    pub fn user_id(&self) -> Option<DbId> {
        match self {
            Caller::User { user_id } => Some(*user_id),
            Caller::Anonymous { .. } => None,
        }
    }

    /// The session id, for anonymous callers that sent one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Caller::Anonymous { session_id, .. } => session_id.as_deref(),
            Caller::User { .. } => None,
        }
    }
}

use serde::Serialize;
use tracing::warn;

use crate::pipeline::formatter::Severity;

pub const KNOWN_RESOURCE_TYPES: [&str; 3] = ["task", "conversation", "user"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
    Delete,
}

impl Operation {
    pub fn is_mutating(self) -> bool {
        matches!(self, Operation::Write | Operation::Delete)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub requesting_user_id: i64,
    pub session_user_id: i64,
    pub operation: Operation,
    pub resource: ResourceRef,
}

#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub authorized: bool,
    pub reason: String,
    pub severity: Severity,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            authorized: true,
            reason: "owner verified".to_string(),
            severity: Severity::Low,
        }
    }

    fn deny(severity: Severity) -> Self {
        // Uniform wording: existence of another user's resource is never
        // distinguishable from a plain miss.
        Self {
            authorized: false,
            reason: "Resource not found or access denied".to_string(),
            severity,
        }
    }
}

/// Deny-by-default ownership check. Authorization requires the requesting
/// identity, session identity, and resource owner to be the same valid user;
/// anything else fails closed with a generic reason.
pub fn validate(request: &AccessRequest) -> AccessDecision {
    let denial_severity = if request.operation.is_mutating() {
        Severity::High
    } else {
        Severity::Medium
    };

    if request.session_user_id <= 0 || request.requesting_user_id <= 0 {
        warn!(
            operation = ?request.operation,
            "access denied: missing or invalid identity"
        );
        return AccessDecision::deny(denial_severity);
    }

    if request.requesting_user_id != request.session_user_id {
        warn!(
            requesting = request.requesting_user_id,
            session = request.session_user_id,
            "access denied: identity mismatch"
        );
        return AccessDecision::deny(denial_severity);
    }

    if !KNOWN_RESOURCE_TYPES.contains(&request.resource.resource_type.as_str()) {
        warn!(
            resource_type = %request.resource.resource_type,
            "access denied: unknown resource type"
        );
        return AccessDecision::deny(denial_severity);
    }

    match request.resource.owner_id {
        Some(owner) if owner == request.session_user_id => AccessDecision::allow(),
        Some(owner) => {
            warn!(
                owner,
                session = request.session_user_id,
                resource_type = %request.resource.resource_type,
                "access denied: cross-owner access"
            );
            AccessDecision::deny(denial_severity)
        }
        None => {
            warn!(
                resource_type = %request.resource.resource_type,
                "access denied: missing owner"
            );
            AccessDecision::deny(denial_severity)
        }
    }
}

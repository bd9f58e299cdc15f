//! Authentication and authorization models

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Resource id prefix of provenance event data
pub const RESOURCE_PROVENANCE_DATA: &str = "/provenance-data";

/// Resource id of the provenance subsystem
pub const RESOURCE_PROVENANCE: &str = "/provenance";

/// Component name of the HTTP request handler; anonymous probes against it
/// (API documentation requests carry no credentials) are let through
pub const HTTP_REQUEST_HANDLER: &str = "HandleHttpRequest";

/// Action a request wants to perform on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    #[default]
    Read,
    Write,
}

impl RequestAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestAction::Read => "read",
            RequestAction::Write => "write",
        }
    }
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(RequestAction::Read),
            "write" => Ok(RequestAction::Write),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

/// A provisioned user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub identifier: String,
    pub identity: String,
}

/// A named group of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub identifier: String,
    pub name: String,
    /// Identifiers of the member users
    pub users: HashSet<String>,
}

/// Result of resolving an identity against a user-group provider
#[derive(Debug, Clone, Default)]
pub struct UserAndGroups {
    pub user: Option<User>,
    pub groups: Vec<Group>,
}

/// A policy granting users and groups one action on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub identifier: String,
    pub resource: String,
    pub action: RequestAction,
    /// Identifiers of users granted by this policy
    pub users: HashSet<String>,
    /// Identifiers of groups granted by this policy
    pub groups: HashSet<String>,
}

/// One access decision to make
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub identity: String,
    /// Resource id the request targets
    pub resource: String,
    /// Display name of the requested resource
    pub resource_name: String,
    pub action: RequestAction,
    pub anonymous: bool,
    /// Explanation attached to a denial when no more specific reason applies
    pub explanation: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(identity: impl Into<String>, resource: impl Into<String>, action: RequestAction) -> Self {
        Self {
            identity: identity.into(),
            resource: resource.into(),
            resource_name: String::new(),
            action,
            anonymous: false,
            explanation: None,
        }
    }
}

/// Outcome of an access decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Approved,
    Denied(String),
    /// No policy exists for the requested resource and action
    ResourceNotFound,
}

impl AuthorizationResult {
    pub fn is_approved(&self) -> bool {
        matches!(self, AuthorizationResult::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_action_round_trip() {
        assert_eq!(RequestAction::Read.as_str(), "read");
        assert_eq!("write".parse::<RequestAction>().unwrap(), RequestAction::Write);
        assert!("delete".parse::<RequestAction>().is_err());
    }

    #[test]
    fn test_authorization_request_defaults() {
        let request = AuthorizationRequest::new("alice", "/flow", RequestAction::Read);
        assert!(!request.anonymous);
        assert!(request.explanation.is_none());
    }

    #[test]
    fn test_authorization_result_approved() {
        assert!(AuthorizationResult::Approved.is_approved());
        assert!(!AuthorizationResult::ResourceNotFound.is_approved());
        assert!(!AuthorizationResult::Denied("no".to_string()).is_approved());
    }
}

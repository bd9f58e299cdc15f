//! Cascata Auth - authentication and authorization
//!
//! This crate provides:
//! - `AuthenticationService`: address filtering plus HTTP Basic/Digest
//!   credential checks for exposed API endpoints
//! - `ManagedAuthorizer`: the policy-based access decision procedure over
//!   pluggable user-group and access-policy providers
//! - In-memory configurable providers for standalone deployments and tests

pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::{
    AccessPolicy, AuthorizationRequest, AuthorizationResult, Group, RequestAction, User,
    UserAndGroups,
};
pub use service::authentication::{
    AuthMethod, AuthenticationConfig, AuthenticationService, random_nonce,
};
pub use service::authorizer::{AuthorizerConfig, ManagedAuthorizer};
pub use service::provider::{
    AccessPolicyProvider, AccessPolicyProviderHandle, ConfigurableAccessPolicyProvider,
    ConfigurableUserGroupProvider, MemoryAccessPolicyProvider, MemoryUserGroupProvider,
    UserGroupProvider, UserGroupProviderHandle,
};

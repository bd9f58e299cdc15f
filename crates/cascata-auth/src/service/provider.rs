//! Provider seams backing the managed authorizer
//!
//! Providers resolve identities to users/groups and look up access policies.
//! Configurable providers can additionally be mutated and carry a
//! fingerprint, the serialized form of their state used to propagate
//! authorization configuration between nodes.

use std::collections::HashSet;
use std::sync::Arc;

use cascata_common::CascataError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{AccessPolicy, Group, RequestAction, User, UserAndGroups};

/// Resolves an identity to its user and group memberships
pub trait UserGroupProvider: Send + Sync {
    fn user_and_groups(&self, identity: &str) -> Result<UserAndGroups, CascataError>;
}

/// A user-group provider whose state can be mutated and transferred
pub trait ConfigurableUserGroupProvider: UserGroupProvider {
    fn add_user(&self, user: User) -> Result<(), CascataError>;
    fn fingerprint(&self) -> Result<String, CascataError>;
    fn inherit_fingerprint(&self, fingerprint: &str) -> Result<(), CascataError>;
    fn check_inheritability(&self, fingerprint: &str) -> Result<(), CascataError>;
}

/// Looks up the policy granting an action on a resource
pub trait AccessPolicyProvider: Send + Sync {
    fn access_policy(
        &self,
        resource: &str,
        action: RequestAction,
    ) -> Result<Option<AccessPolicy>, CascataError>;
}

/// An access-policy provider whose state can be mutated and transferred
pub trait ConfigurableAccessPolicyProvider: AccessPolicyProvider {
    /// Grant a newly provisioned user the default policies
    fn set_user_default_policy(&self, user: &User) -> Result<(), CascataError>;
    fn fingerprint(&self) -> Result<String, CascataError>;
    fn inherit_fingerprint(&self, fingerprint: &str) -> Result<(), CascataError>;
    fn check_inheritability(&self, fingerprint: &str) -> Result<(), CascataError>;
}

/// A user-group provider, read-only or configurable
#[derive(Clone)]
pub enum UserGroupProviderHandle {
    ReadOnly(Arc<dyn UserGroupProvider>),
    Configurable(Arc<dyn ConfigurableUserGroupProvider>),
}

impl UserGroupProviderHandle {
    pub fn base(&self) -> &dyn UserGroupProvider {
        match self {
            UserGroupProviderHandle::ReadOnly(provider) => provider.as_ref(),
            UserGroupProviderHandle::Configurable(provider) => provider.as_ref(),
        }
    }

    pub fn configurable(&self) -> Option<&dyn ConfigurableUserGroupProvider> {
        match self {
            UserGroupProviderHandle::ReadOnly(_) => None,
            UserGroupProviderHandle::Configurable(provider) => Some(provider.as_ref()),
        }
    }
}

/// An access-policy provider, read-only or configurable
#[derive(Clone)]
pub enum AccessPolicyProviderHandle {
    ReadOnly(Arc<dyn AccessPolicyProvider>),
    Configurable(Arc<dyn ConfigurableAccessPolicyProvider>),
}

impl AccessPolicyProviderHandle {
    pub fn base(&self) -> &dyn AccessPolicyProvider {
        match self {
            AccessPolicyProviderHandle::ReadOnly(provider) => provider.as_ref(),
            AccessPolicyProviderHandle::Configurable(provider) => provider.as_ref(),
        }
    }

    pub fn configurable(&self) -> Option<&dyn ConfigurableAccessPolicyProvider> {
        match self {
            AccessPolicyProviderHandle::ReadOnly(_) => None,
            AccessPolicyProviderHandle::Configurable(provider) => Some(provider.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserGroupState {
    users: Vec<User>,
    groups: Vec<Group>,
}

/// In-memory configurable user-group provider
///
/// Backs standalone deployments and tests.
#[derive(Default)]
pub struct MemoryUserGroupProvider {
    state: RwLock<UserGroupState>,
}

impl MemoryUserGroupProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&self, group: Group) {
        self.state.write().groups.push(group);
    }

    pub fn users(&self) -> Vec<User> {
        self.state.read().users.clone()
    }
}

impl UserGroupProvider for MemoryUserGroupProvider {
    fn user_and_groups(&self, identity: &str) -> Result<UserAndGroups, CascataError> {
        let state = self.state.read();
        let user = state
            .users
            .iter()
            .find(|user| user.identity == identity)
            .cloned();
        let groups = match &user {
            Some(user) => state
                .groups
                .iter()
                .filter(|group| group.users.contains(&user.identifier))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(UserAndGroups { user, groups })
    }
}

impl ConfigurableUserGroupProvider for MemoryUserGroupProvider {
    fn add_user(&self, user: User) -> Result<(), CascataError> {
        let mut state = self.state.write();
        if state.users.iter().any(|existing| existing.identity == user.identity) {
            return Err(CascataError::IllegalState(format!(
                "user '{}' already exists",
                user.identity
            )));
        }
        state.users.push(user);
        Ok(())
    }

    fn fingerprint(&self) -> Result<String, CascataError> {
        let mut state = self.state.read().clone();
        state.users.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        state.groups.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        serde_json::to_string(&state)
            .map_err(|e| CascataError::IdentityAccess(format!("unable to generate fingerprint: {e}")))
    }

    fn inherit_fingerprint(&self, fingerprint: &str) -> Result<(), CascataError> {
        let inherited: UserGroupState = serde_json::from_str(fingerprint)
            .map_err(|e| CascataError::IdentityAccess(format!("unable to parse fingerprint: {e}")))?;
        *self.state.write() = inherited;
        Ok(())
    }

    fn check_inheritability(&self, fingerprint: &str) -> Result<(), CascataError> {
        serde_json::from_str::<UserGroupState>(fingerprint)
            .map(|_| ())
            .map_err(|e| CascataError::IdentityAccess(format!("unable to parse fingerprint: {e}")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PolicyState {
    policies: Vec<AccessPolicy>,
}

/// In-memory configurable access-policy provider
pub struct MemoryAccessPolicyProvider {
    state: RwLock<PolicyState>,
    /// Resources every newly provisioned user is granted on
    default_resources: Vec<(String, RequestAction)>,
}

impl MemoryAccessPolicyProvider {
    pub fn new(default_resources: Vec<(String, RequestAction)>) -> Self {
        Self {
            state: RwLock::new(PolicyState::default()),
            default_resources,
        }
    }

    pub fn add_policy(&self, policy: AccessPolicy) {
        let mut state = self.state.write();
        state
            .policies
            .retain(|existing| existing.identifier != policy.identifier);
        state.policies.push(policy);
    }

    pub fn policies(&self) -> Vec<AccessPolicy> {
        self.state.read().policies.clone()
    }
}

impl AccessPolicyProvider for MemoryAccessPolicyProvider {
    fn access_policy(
        &self,
        resource: &str,
        action: RequestAction,
    ) -> Result<Option<AccessPolicy>, CascataError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .find(|policy| policy.resource == resource && policy.action == action)
            .cloned())
    }
}

impl ConfigurableAccessPolicyProvider for MemoryAccessPolicyProvider {
    fn set_user_default_policy(&self, user: &User) -> Result<(), CascataError> {
        let mut state = self.state.write();
        for (resource, action) in &self.default_resources {
            let existing = state
                .policies
                .iter_mut()
                .find(|policy| &policy.resource == resource && policy.action == *action);
            match existing {
                Some(policy) => {
                    policy.users.insert(user.identifier.clone());
                }
                None => {
                    let mut users = HashSet::new();
                    users.insert(user.identifier.clone());
                    state.policies.push(AccessPolicy {
                        identifier: format!("default-{}-{}", resource, action),
                        resource: resource.clone(),
                        action: *action,
                        users,
                        groups: HashSet::new(),
                    });
                }
            }
        }
        Ok(())
    }

    fn fingerprint(&self) -> Result<String, CascataError> {
        let mut state = self.state.read().clone();
        state.policies.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        serde_json::to_string(&state)
            .map_err(|e| CascataError::IdentityAccess(format!("unable to generate fingerprint: {e}")))
    }

    fn inherit_fingerprint(&self, fingerprint: &str) -> Result<(), CascataError> {
        let inherited: PolicyState = serde_json::from_str(fingerprint)
            .map_err(|e| CascataError::IdentityAccess(format!("unable to parse fingerprint: {e}")))?;
        *self.state.write() = inherited;
        Ok(())
    }

    fn check_inheritability(&self, fingerprint: &str) -> Result<(), CascataError> {
        serde_json::from_str::<PolicyState>(fingerprint)
            .map(|_| ())
            .map_err(|e| CascataError::IdentityAccess(format!("unable to parse fingerprint: {e}")))
    }
}

//! Policy-based access decisions over pluggable providers

use std::time::Duration;

use cascata_common::{CascataError, md5_bytes};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{
    AuthorizationRequest, AuthorizationResult, HTTP_REQUEST_HANDLER, RESOURCE_PROVENANCE,
    RESOURCE_PROVENANCE_DATA, User, UserAndGroups,
};
use crate::service::provider::{AccessPolicyProviderHandle, UserGroupProviderHandle};

/// Settings of a [`ManagedAuthorizer`]
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Identity granted every access
    pub admin_identity: Option<String>,
    /// Whether an authenticated-but-unprovisioned identity is created on
    /// first access and granted the default policies
    pub auto_generate_users: bool,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            admin_identity: None,
            auto_generate_users: true,
        }
    }
}

/// Combined fingerprint of the two providers
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ManagedFingerprint {
    access_policy_provider: String,
    user_group_provider: String,
}

/// Access decisions backed by a user-group provider and an access-policy
/// provider
pub struct ManagedAuthorizer {
    user_group_provider: UserGroupProviderHandle,
    access_policy_provider: AccessPolicyProviderHandle,
    config: AuthorizerConfig,
    // identity -> resolved user and groups; invalidated when a user is
    // auto-generated
    lookup_cache: Cache<String, UserAndGroups>,
}

impl ManagedAuthorizer {
    pub fn new(
        user_group_provider: UserGroupProviderHandle,
        access_policy_provider: AccessPolicyProviderHandle,
        config: AuthorizerConfig,
    ) -> Self {
        Self {
            user_group_provider,
            access_policy_provider,
            config,
            lookup_cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(300))
                .build(),
        }
    }

    /// Decide one access request
    pub fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResult, CascataError> {
        if self.is_admin(&request.identity)? {
            return Ok(AuthorizationResult::Approved);
        }

        // provenance event data shares the provenance subsystem's policy
        let resource = if request.resource.starts_with(RESOURCE_PROVENANCE_DATA) {
            RESOURCE_PROVENANCE
        } else {
            request.resource.as_str()
        };

        let Some(policy) = self
            .access_policy_provider
            .base()
            .access_policy(resource, request.action)?
        else {
            return Ok(AuthorizationResult::ResourceNotFound);
        };

        let user_and_groups = self.lookup(&request.identity)?;

        let Some(user) = user_and_groups.user else {
            if request.anonymous {
                if request.resource_name == HTTP_REQUEST_HANDLER {
                    // credential-less API documentation probe
                    return Ok(AuthorizationResult::Approved);
                }
                return Ok(AuthorizationResult::Denied(format!(
                    "user identity can't be '{}'.",
                    request.identity
                )));
            }
            return self.auto_generate_user(&request.identity);
        };

        let granted = policy.users.contains(&user.identifier)
            || user_and_groups
                .groups
                .iter()
                .any(|group| policy.groups.contains(&group.identifier));
        if granted {
            return Ok(AuthorizationResult::Approved);
        }

        Ok(AuthorizationResult::Denied(
            request
                .explanation
                .clone()
                .unwrap_or_else(|| "Unable to access!".to_string()),
        ))
    }

    /// Create and grant an authenticated identity that has no user yet
    fn auto_generate_user(&self, identity: &str) -> Result<AuthorizationResult, CascataError> {
        if !self.config.auto_generate_users {
            return Ok(AuthorizationResult::Denied("Unable to access!".to_string()));
        }
        let (Some(user_group_provider), Some(access_policy_provider)) = (
            self.user_group_provider.configurable(),
            self.access_policy_provider.configurable(),
        ) else {
            debug!(identity, "providers are not configurable, cannot auto-generate user");
            return Ok(AuthorizationResult::Denied("Unable to access!".to_string()));
        };

        let user = User {
            identifier: deterministic_identifier(identity),
            identity: identity.to_string(),
        };
        info!(identity, identifier = %user.identifier, "auto-generating user");

        user_group_provider.add_user(user.clone())?;
        access_policy_provider.set_user_default_policy(&user)?;
        self.lookup_cache.invalidate(identity);

        Ok(AuthorizationResult::Approved)
    }

    fn is_admin(&self, identity: &str) -> Result<bool, CascataError> {
        let Some(admin_identity) = &self.config.admin_identity else {
            return Ok(false);
        };
        let user_and_groups = self.lookup(identity)?;
        Ok(user_and_groups
            .user
            .map(|user| &user.identity == admin_identity)
            .unwrap_or(false))
    }

    fn lookup(&self, identity: &str) -> Result<UserAndGroups, CascataError> {
        if let Some(cached) = self.lookup_cache.get(identity) {
            return Ok(cached);
        }
        let resolved = self.user_group_provider.base().user_and_groups(identity)?;
        self.lookup_cache
            .insert(identity.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Serialized state of both providers
    pub fn fingerprint(&self) -> Result<String, CascataError> {
        let fingerprint = ManagedFingerprint {
            access_policy_provider: match self.access_policy_provider.configurable() {
                Some(provider) => provider.fingerprint()?,
                None => String::new(),
            },
            user_group_provider: match self.user_group_provider.configurable() {
                Some(provider) => provider.fingerprint()?,
                None => String::new(),
            },
        };
        serde_json::to_string(&fingerprint)
            .map_err(|e| CascataError::IdentityAccess(format!("unable to generate fingerprint: {e}")))
    }

    /// Apply a fingerprint produced by another node's authorizer
    pub fn inherit_fingerprint(&self, fingerprint: &str) -> Result<(), CascataError> {
        if fingerprint.trim().is_empty() {
            return Ok(());
        }
        let parsed = parse_fingerprint(fingerprint)?;

        if !parsed.access_policy_provider.trim().is_empty()
            && let Some(provider) = self.access_policy_provider.configurable()
        {
            provider.inherit_fingerprint(&parsed.access_policy_provider)?;
        }
        if !parsed.user_group_provider.trim().is_empty()
            && let Some(provider) = self.user_group_provider.configurable()
        {
            provider.inherit_fingerprint(&parsed.user_group_provider)?;
        }
        self.lookup_cache.invalidate_all();
        Ok(())
    }

    /// Whether a proposed fingerprint could be inherited by this authorizer
    pub fn check_inheritability(&self, proposed: &str) -> Result<(), CascataError> {
        let parsed = parse_fingerprint(proposed)?;

        if !parsed.access_policy_provider.trim().is_empty() {
            match self.access_policy_provider.configurable() {
                Some(provider) => provider.check_inheritability(&parsed.access_policy_provider)?,
                None => {
                    return Err(CascataError::UninheritableAuthorizations(
                        "policy fingerprint is not blank and the configured access policy \
                         provider does not support fingerprinting"
                            .to_string(),
                    ));
                }
            }
        }

        if !parsed.user_group_provider.trim().is_empty() {
            match self.user_group_provider.configurable() {
                Some(provider) => provider.check_inheritability(&parsed.user_group_provider)?,
                None => {
                    return Err(CascataError::UninheritableAuthorizations(
                        "user/group fingerprint is not blank and the configured user group \
                         provider does not support fingerprinting"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Deterministic user identifier derived from an identity
///
/// The MD5 digest of the identity is exactly UUID-sized, so the identifier is
/// its standard hyphenated rendering.
pub fn deterministic_identifier(identity: &str) -> String {
    uuid::Uuid::from_bytes(md5_bytes(identity)).to_string()
}

fn parse_fingerprint(fingerprint: &str) -> Result<ManagedFingerprint, CascataError> {
    serde_json::from_str(fingerprint)
        .map_err(|e| CascataError::IdentityAccess(format!("unable to parse fingerprint: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::model::{AccessPolicy, Group, RequestAction};
    use crate::service::provider::{
        AccessPolicyProvider, ConfigurableUserGroupProvider, MemoryAccessPolicyProvider,
        MemoryUserGroupProvider, UserGroupProvider,
    };

    use super::*;

    struct Fixture {
        users: Arc<MemoryUserGroupProvider>,
        policies: Arc<MemoryAccessPolicyProvider>,
        authorizer: ManagedAuthorizer,
    }

    fn fixture(config: AuthorizerConfig) -> Fixture {
        let users = Arc::new(MemoryUserGroupProvider::new());
        let policies = Arc::new(MemoryAccessPolicyProvider::new(vec![(
            "/flow".to_string(),
            RequestAction::Read,
        )]));
        let authorizer = ManagedAuthorizer::new(
            UserGroupProviderHandle::Configurable(users.clone()),
            AccessPolicyProviderHandle::Configurable(policies.clone()),
            config,
        );
        Fixture {
            users,
            policies,
            authorizer,
        }
    }

    fn add_user(fixture: &Fixture, identifier: &str, identity: &str) {
        fixture
            .users
            .add_user(User {
                identifier: identifier.to_string(),
                identity: identity.to_string(),
            })
            .unwrap();
    }

    fn add_policy(fixture: &Fixture, resource: &str, action: RequestAction, users: &[&str], groups: &[&str]) {
        fixture.policies.add_policy(AccessPolicy {
            identifier: format!("{resource}-{action}"),
            resource: resource.to_string(),
            action,
            users: users.iter().map(|s| s.to_string()).collect(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
        });
    }

    #[test]
    fn test_admin_identity_is_always_approved() {
        let fixture = fixture(AuthorizerConfig {
            admin_identity: Some("root".to_string()),
            auto_generate_users: false,
        });
        add_user(&fixture, "u0", "root");

        let request = AuthorizationRequest::new("root", "/anything", RequestAction::Write);
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());
    }

    #[test]
    fn test_missing_policy_is_resource_not_found() {
        let fixture = fixture(AuthorizerConfig::default());
        add_user(&fixture, "u1", "alice");

        let request = AuthorizationRequest::new("alice", "/nowhere", RequestAction::Read);
        assert_eq!(
            fixture.authorizer.authorize(&request).unwrap(),
            AuthorizationResult::ResourceNotFound
        );
    }

    #[test]
    fn test_user_granted_by_policy() {
        let fixture = fixture(AuthorizerConfig::default());
        add_user(&fixture, "u1", "alice");
        add_policy(&fixture, "/data", RequestAction::Read, &["u1"], &[]);

        let request = AuthorizationRequest::new("alice", "/data", RequestAction::Read);
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());
    }

    #[test]
    fn test_user_granted_through_group() {
        let fixture = fixture(AuthorizerConfig::default());
        add_user(&fixture, "u1", "alice");
        fixture.users.add_group(Group {
            identifier: "g1".to_string(),
            name: "ops".to_string(),
            users: ["u1".to_string()].into_iter().collect(),
        });
        add_policy(&fixture, "/data", RequestAction::Write, &[], &["g1"]);

        let request = AuthorizationRequest::new("alice", "/data", RequestAction::Write);
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());
    }

    #[test]
    fn test_user_denied_with_explanation() {
        let fixture = fixture(AuthorizerConfig::default());
        add_user(&fixture, "u1", "alice");
        add_user(&fixture, "u2", "bob");
        add_policy(&fixture, "/data", RequestAction::Read, &["u2"], &[]);

        let mut request = AuthorizationRequest::new("alice", "/data", RequestAction::Read);
        request.explanation = Some("not yours".to_string());
        assert_eq!(
            fixture.authorizer.authorize(&request).unwrap(),
            AuthorizationResult::Denied("not yours".to_string())
        );
    }

    #[test]
    fn test_provenance_data_uses_provenance_policy() {
        let fixture = fixture(AuthorizerConfig::default());
        add_user(&fixture, "u1", "alice");
        add_policy(&fixture, RESOURCE_PROVENANCE, RequestAction::Read, &["u1"], &[]);

        let request = AuthorizationRequest::new(
            "alice",
            format!("{RESOURCE_PROVENANCE_DATA}/processors/p1"),
            RequestAction::Read,
        );
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());
    }

    #[test]
    fn test_anonymous_http_handler_probe_is_approved() {
        let fixture = fixture(AuthorizerConfig::default());
        add_policy(&fixture, "/data", RequestAction::Read, &[], &[]);

        let mut request = AuthorizationRequest::new("anonymous", "/data", RequestAction::Read);
        request.anonymous = true;
        request.resource_name = HTTP_REQUEST_HANDLER.to_string();
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());
    }

    #[test]
    fn test_anonymous_other_resource_is_denied() {
        let fixture = fixture(AuthorizerConfig::default());
        add_policy(&fixture, "/data", RequestAction::Read, &[], &[]);

        let mut request = AuthorizationRequest::new("anonymous", "/data", RequestAction::Read);
        request.anonymous = true;
        request.resource_name = "GenerateFlowFile".to_string();
        assert!(matches!(
            fixture.authorizer.authorize(&request).unwrap(),
            AuthorizationResult::Denied(_)
        ));
    }

    #[test]
    fn test_unknown_identity_is_auto_generated_and_approved() {
        let fixture = fixture(AuthorizerConfig::default());
        add_policy(&fixture, "/data", RequestAction::Read, &[], &[]);

        let request = AuthorizationRequest::new("carol", "/data", RequestAction::Read);
        assert!(fixture.authorizer.authorize(&request).unwrap().is_approved());

        // the user now exists with a deterministic identifier and holds the
        // default policy
        let resolved = fixture.users.user_and_groups("carol").unwrap();
        let identifier = resolved.user.unwrap().identifier;
        assert_eq!(identifier, deterministic_identifier("carol"));
        let default_policy = fixture
            .policies
            .access_policy("/flow", RequestAction::Read)
            .unwrap()
            .unwrap();
        assert!(default_policy.users.contains(&identifier));
    }

    #[test]
    fn test_auto_generation_disabled_denies_unknown_identity() {
        let fixture = fixture(AuthorizerConfig {
            admin_identity: None,
            auto_generate_users: false,
        });
        add_policy(&fixture, "/data", RequestAction::Read, &[], &[]);

        let request = AuthorizationRequest::new("carol", "/data", RequestAction::Read);
        assert_eq!(
            fixture.authorizer.authorize(&request).unwrap(),
            AuthorizationResult::Denied("Unable to access!".to_string())
        );
        assert!(fixture.users.user_and_groups("carol").unwrap().user.is_none());
    }

    #[test]
    fn test_deterministic_identifier_shape() {
        let id = deterministic_identifier("alice");
        assert_eq!(id, deterministic_identifier("alice"));
        assert_ne!(id, deterministic_identifier("bob"));
        // hyphenated uuid rendering
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }

    #[test]
    fn test_fingerprint_round_trip() {
        let source = fixture(AuthorizerConfig::default());
        add_user(&source, "u1", "alice");
        add_policy(&source, "/data", RequestAction::Read, &["u1"], &[]);

        let target = fixture(AuthorizerConfig::default());
        target
            .authorizer
            .inherit_fingerprint(&source.authorizer.fingerprint().unwrap())
            .unwrap();

        assert_eq!(target.users.users().len(), 1);
        let policy = target
            .policies
            .access_policy("/data", RequestAction::Read)
            .unwrap()
            .unwrap();
        assert_eq!(policy.users, HashSet::from(["u1".to_string()]));
    }

    #[test]
    fn test_inherit_blank_fingerprint_is_a_no_op() {
        let fixture = fixture(AuthorizerConfig::default());
        fixture.authorizer.inherit_fingerprint("  ").unwrap();
        assert!(fixture.users.users().is_empty());
    }

    #[test]
    fn test_check_inheritability_rejects_read_only_providers() {
        let source = fixture(AuthorizerConfig::default());
        add_user(&source, "u1", "alice");
        let fingerprint = source.authorizer.fingerprint().unwrap();

        let users: Arc<MemoryUserGroupProvider> = Arc::new(MemoryUserGroupProvider::new());
        let policies = Arc::new(MemoryAccessPolicyProvider::new(Vec::new()));
        let read_only = ManagedAuthorizer::new(
            UserGroupProviderHandle::ReadOnly(users),
            AccessPolicyProviderHandle::Configurable(policies),
            AuthorizerConfig::default(),
        );

        assert!(matches!(
            read_only.check_inheritability(&fingerprint),
            Err(CascataError::UninheritableAuthorizations(_))
        ));
    }

    #[test]
    fn test_check_inheritability_rejects_malformed_document() {
        let fixture = fixture(AuthorizerConfig::default());
        assert!(fixture.authorizer.check_inheritability("{}").is_err());
        assert!(
            fixture
                .authorizer
                .check_inheritability("{\"accessPolicyProvider\": \"\", \"userGroupProvider\": \"\", \"extra\": 1}")
                .is_err()
        );
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

/// Caller-asserted identity tier. Trimmed on construction and compared
/// ASCII case-insensitively, so `"admin"` and `" Admin "` are the same role.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(String);

impl Role {
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::anonymous()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Role for a request that carried no claim at all.
    pub fn from_claim(claim: Option<&str>) -> Self {
        claim.map(Self::new).unwrap_or_else(Self::anonymous)
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn admin() -> Self {
        Self("Admin".to_string())
    }

    pub fn editor() -> Self {
        Self("Editor".to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::ANONYMOUS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

/// Named administrative action, e.g. `settings.write`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    pub const SETTINGS_WRITE: Capability = Capability(Cow::Borrowed("settings.write"));
    pub const ACTIVITY_READ: Capability = Capability(Cow::Borrowed("activity.read"));
    pub const ACTIVITY_CLEAR: Capability = Capability(Cow::Borrowed("activity.clear"));
    pub const CONTENT_WRITE: Capability = Capability(Cow::Borrowed("content.write"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into().trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking. Only `role` takes part in decisions; the rest is carried
/// through for the audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub role: Role,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
}

impl Principal {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            actor_id: None,
            actor_name: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Role::anonymous())
    }

    pub fn with_actor(mut self, id: Option<i64>, name: Option<String>) -> Self {
        self.actor_id = id;
        self.actor_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Name recorded in the activity log; falls back to the role.
    pub fn display_name(&self) -> &str {
        self.actor_name.as_deref().unwrap_or(self.role.as_str())
    }
}

/// Capability name to the roles allowed to invoke it. There is no implicit
/// bypass: a role not listed under a capability is denied it, and a
/// capability that is not listed at all is denied to everyone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    capabilities: BTreeMap<Capability, Vec<Role>>,
}

impl AccessPolicy {
    pub fn builtin() -> Self {
        Self::default()
            .with(Capability::SETTINGS_WRITE, [Role::admin(), Role::editor()])
            .with(Capability::ACTIVITY_READ, [Role::admin()])
            .with(Capability::ACTIVITY_CLEAR, [Role::admin()])
            .with(Capability::CONTENT_WRITE, [Role::admin(), Role::editor()])
    }

    pub fn with(mut self, capability: Capability, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut allowed: Vec<Role> = Vec::new();
        for role in roles {
            if !allowed.contains(&role) {
                allowed.push(role);
            }
        }
        self.capabilities.insert(capability, allowed);
        self
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let raw: AccessPolicy = serde_json::from_slice(bytes)?;
        // rebuild through `with` so duplicate role spellings collapse
        Ok(raw
            .capabilities
            .into_iter()
            .fold(Self::default(), |acc, (cap, roles)| acc.with(cap, roles)))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading access policy {}", path.display()))?;
        Self::from_json_slice(&bytes)
            .with_context(|| format!("parsing access policy {}", path.display()))
    }

    /// `FOLIO_POLICY_FILE` when set, otherwise [`AccessPolicy::builtin`].
    pub fn load_from_env() -> Result<Self> {
        match std::env::var("FOLIO_POLICY_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                let policy = Self::from_path(Path::new(path.trim()))?;
                tracing::info!(
                    target: "folio::policy",
                    path = %path.trim(),
                    capabilities = policy.capabilities.len(),
                    "loaded access policy file"
                );
                Ok(policy)
            }
            _ => Ok(Self::builtin()),
        }
    }

    pub fn allowed_roles(&self, capability: &Capability) -> Option<&[Role]> {
        self.capabilities.get(capability).map(Vec::as_slice)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.keys()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    RoleNotListed,
    UnknownCapability,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny {
        capability: Capability,
        role: Role,
        reason: DenyReason,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn explain(&self) -> Value {
        match self {
            Decision::Allow => json!({"decision": "allow"}),
            Decision::Deny {
                capability,
                role,
                reason,
            } => {
                let message = match reason {
                    DenyReason::RoleNotListed => {
                        format!("role '{role}' may not perform '{capability}'")
                    }
                    DenyReason::UnknownCapability => {
                        format!("'{capability}' is not granted to any role")
                    }
                };
                json!({
                    "decision": "deny",
                    "capability": capability,
                    "role": role,
                    "reason": reason,
                    "message": message,
                })
            }
        }
    }
}

/// Stateless check of a principal against the loaded [`AccessPolicy`].
#[derive(Clone, Debug)]
pub struct AccessGate {
    policy: Arc<AccessPolicy>,
}

impl AccessGate {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn check(&self, principal: &Principal, capability: &Capability) -> Decision {
        self.check_role(&principal.role, capability)
    }

    pub fn check_role(&self, role: &Role, capability: &Capability) -> Decision {
        let deny = |reason| Decision::Deny {
            capability: capability.clone(),
            role: role.clone(),
            reason,
        };
        match self.policy.allowed_roles(capability) {
            None => deny(DenyReason::UnknownCapability),
            Some(roles) if roles.contains(role) => Decision::Allow,
            Some(_) => deny(DenyReason::RoleNotListed),
        }
    }
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(AccessPolicy::builtin())
    }
}

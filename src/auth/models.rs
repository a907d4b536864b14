//! Authentication and authorization models

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

/// User roles, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Regular account - business operations
    User,
    /// Administrator - full access
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Viewer => write!(f, "viewer"),
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(crate::error::Error::Config(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

/// Immutable role-to-permission mapping, built once at startup.
///
/// Roles form a closed enumeration; changing the table requires a
/// redeploy. Admin implicitly passes every permission check.
#[derive(Debug, Clone)]
pub struct RoleTable {
    permissions: HashMap<Role, BTreeSet<String>>,
}

impl RoleTable {
    /// The standard table used when no custom mapping is supplied.
    pub fn standard() -> Self {
        let mut permissions = HashMap::new();
        permissions.insert(
            Role::Viewer,
            ["users:read"].iter().map(|s| s.to_string()).collect(),
        );
        permissions.insert(
            Role::User,
            ["users:read", "users:write"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        permissions.insert(
            Role::Admin,
            ["users:read", "users:write", "roles:manage", "permissions:manage"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        Self { permissions }
    }

    pub fn permissions(&self, role: Role) -> Option<&BTreeSet<String>> {
        self.permissions.get(&role)
    }

    /// Whether `role` carries the named permission.
    pub fn has_permission(&self, role: Role, permission: &str) -> bool {
        if role == Role::Admin {
            return true;
        }
        self.permissions
            .get(&role)
            .map(|set| set.contains(permission))
            .unwrap_or(false)
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What a protected operation requires of the caller
#[derive(Debug, Clone)]
pub enum Capability {
    /// Caller's role must rank at least this high.
    MinimumRole(Role),
    /// Caller's role must carry every listed permission.
    Permissions(Vec<String>),
}

impl Capability {
    pub fn permits(&self, role: Role, table: &RoleTable) -> bool {
        match self {
            Capability::MinimumRole(min) => role >= *min,
            Capability::Permissions(required) => required
                .iter()
                .all(|perm| table.has_permission(role, perm)),
        }
    }
}

/// Identity attached to a request after the guard admits it
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub subject_id: Uuid,
    pub role: Role,
}

/// A stored credential, owned by the external user store
#[derive(Debug, Clone)]
pub struct Credential {
    pub subject_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Login credentials
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Signup request for a new account
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Signup confirmation
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub email: String,
    pub role: Role,
}

/// Login response with both tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Refresh response with a freshly minted access token
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_at: i64,
}

/// Logout request; either token may be absent
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

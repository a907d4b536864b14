//! Authentication, authorization and revocation

pub mod middleware;
pub mod models;
pub mod revocation;
pub mod service;
pub mod token;

pub use middleware::{bearer_token, require_capability, AccessGuard, RouteGuard};
pub use models::{AuthContext, Capability, Credential, Role, RoleTable};
pub use revocation::RevocationList;
pub use service::{Authenticator, CredentialStore, InMemoryCredentialStore, TokenPair};
pub use token::{Claims, IssuedToken, TokenCodec, TokenKind};

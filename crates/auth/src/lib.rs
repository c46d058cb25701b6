//! `storeledger-auth`: who is calling and what they may do.
//!
//! Decoupled from HTTP and storage: token verification, claims validation,
//! the shop's role policy and the permission check used at the command
//! boundary.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use policy::{membership_for, role_permissions};
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;

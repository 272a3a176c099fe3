//! `shopfront-auth`: pure identity and authorization primitives.
//!
//! No HTTP and no storage here: this crate knows the
//! role ladder, the shape of an identity and a bearer credential, and how to
//! decide whether a role clears a requirement.

pub mod authorize;
pub mod claims;
pub mod credential;
pub mod identity;
pub mod roles;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DenialKind, authorize, explain_authorization,
    is_authorized, is_exact_role, role_satisfies,
};
pub use claims::{TokenClaims, TokenValidationError, decode_unverified, validate_claims};
pub use credential::Credential;
pub use identity::Identity;
pub use roles::{Role, UnknownRole, weight_of};

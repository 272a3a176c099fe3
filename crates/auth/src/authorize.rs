use serde::Serialize;
use thiserror::Error;

use crate::{Identity, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("forbidden: role '{actual}' does not meet required role '{required}'")]
    Forbidden { required: Role, actual: Role },
}

/// Does `user` clear `required`?
///
/// The single place where role weights are compared.
pub fn role_satisfies(user: Role, required: Role) -> bool {
    required.weight() <= user.weight()
}

/// Weight check against a raw role string.
///
/// - No IO
/// - No panics
/// - Unknown role strings fail closed
pub fn is_authorized(user_role: &str, required: Role) -> bool {
    match user_role.parse::<Role>() {
        Ok(user) => role_satisfies(user, required),
        Err(_) => false,
    }
}

/// Exact-role check, used where a token class (not a rank) is required, such
/// as the MFA-only credential.
pub fn is_exact_role(user_role: &str, required: Role) -> bool {
    matches!(user_role.parse::<Role>(), Ok(user) if user == required)
}

/// Authorize an optional identity against a required role.
pub fn authorize(identity: Option<&Identity>, required: Role) -> Result<(), AuthzError> {
    let identity = identity.ok_or(AuthzError::Unauthenticated)?;
    let actual = identity
        .role()
        .ok_or_else(|| AuthzError::UnknownRole(identity.role.clone()))?;

    if role_satisfies(actual, required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { required, actual })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Serializable account of one access decision, for debug logging.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_role: Role,
    pub required_weight: u8,
    pub granted: bool,
    pub reason: String,
    /// Raw role string of the identity, if there was one.
    pub actual_role: Option<String>,
    pub actual_weight: Option<u8>,
    pub denial: Option<DenialKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Unauthenticated,
    UnknownRole,
    InsufficientRole,
}

/// Explain why [`authorize`] would allow or deny.
pub fn explain_authorization(identity: Option<&Identity>, required: Role) -> AuthorizationExplanation {
    let actual_role = identity.map(|i| i.role.clone());
    let actual_weight = identity.and_then(|i| i.role()).map(Role::weight);

    let (granted, reason, denial) = match authorize(identity, required) {
        Ok(()) => (
            true,
            format!(
                "role '{}' (weight {}) meets '{}' (weight {})",
                actual_role.as_deref().unwrap_or_default(),
                actual_weight.unwrap_or_default(),
                required,
                required.weight()
            ),
            None,
        ),
        Err(AuthzError::Unauthenticated) => (
            false,
            "no identity in session".to_string(),
            Some(DenialKind::Unauthenticated),
        ),
        Err(err @ AuthzError::UnknownRole(_)) => {
            (false, err.to_string(), Some(DenialKind::UnknownRole))
        }
        Err(err @ AuthzError::Forbidden { .. }) => {
            (false, err.to_string(), Some(DenialKind::InsufficientRole))
        }
    };

    AuthorizationExplanation {
        required_role: required,
        required_weight: required.weight(),
        granted,
        reason,
        actual_role,
        actual_weight,
        denial,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use shopfront_core::UniqueKey;

    use super::*;

    fn identity_with(role: &str) -> Identity {
        Identity {
            email: "bob@example.com".to_string(),
            first_name: Some("Bob".to_string()),
            last_name: None,
            role: role.to_string(),
            unique_key: UniqueKey::new("BOB000000001"),
            username: None,
            mfa_enabled: false,
        }
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    #[test]
    fn user_cannot_reach_support_moderator() {
        assert!(!is_authorized("user", Role::SupportModerator));
        assert!(is_authorized("support_moderator", Role::SupportModerator));
        assert!(is_authorized("root_admin", Role::User));
    }

    #[test]
    fn unknown_roles_fail_closed() {
        for required in Role::ALL {
            assert!(!is_authorized("superuser", required));
            assert!(!is_authorized("", required));
            assert!(!is_authorized("ADMIN", required));
        }
    }

    #[test]
    fn exact_role_ignores_rank() {
        assert!(is_exact_role("partially_logged_in", Role::PartiallyLoggedIn));
        assert!(!is_exact_role("admin", Role::PartiallyLoggedIn));
    }

    #[test]
    fn authorize_reports_denial_branch() {
        assert_eq!(authorize(None, Role::User), Err(AuthzError::Unauthenticated));

        let wizard = identity_with("wizard");
        assert_eq!(
            authorize(Some(&wizard), Role::PartiallyLoggedIn),
            Err(AuthzError::UnknownRole("wizard".to_string()))
        );

        let user = identity_with("user");
        assert_eq!(
            authorize(Some(&user), Role::Admin),
            Err(AuthzError::Forbidden {
                required: Role::Admin,
                actual: Role::User
            })
        );
        assert!(authorize(Some(&user), Role::User).is_ok());
    }

    #[test]
    fn explanation_matches_decision() {
        let user = identity_with("user");

        let denied = explain_authorization(Some(&user), Role::SupportModerator);
        assert!(!denied.granted);
        assert_eq!(denied.denial, Some(DenialKind::InsufficientRole));
        assert_eq!(denied.actual_weight, Some(2));
        assert_eq!(denied.required_weight, 3);

        let anonymous = explain_authorization(None, Role::PartiallyLoggedIn);
        assert!(!anonymous.granted);
        assert_eq!(anonymous.denial, Some(DenialKind::Unauthenticated));

        let granted = explain_authorization(Some(&user), Role::User);
        assert!(granted.granted);
        assert!(granted.denial.is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the string-level check agrees with the weight table for
        /// every pair of roles.
        #[test]
        fn is_authorized_matches_weights(user in any_role(), required in any_role()) {
            prop_assert_eq!(
                is_authorized(user.as_str(), required),
                required.weight() <= user.weight()
            );
        }

        /// Property: no identity never passes, whatever the requirement.
        #[test]
        fn absent_identity_is_always_denied(required in any_role()) {
            prop_assert_eq!(authorize(None, required), Err(AuthzError::Unauthenticated));
        }

        /// Property: arbitrary strings outside the role set never authorize.
        #[test]
        fn arbitrary_strings_fail_closed(raw in "[a-zA-Z_]{0,24}", required in any_role()) {
            prop_assume!(raw.parse::<Role>().is_err());
            prop_assert!(!is_authorized(&raw, required));
        }
    }
}

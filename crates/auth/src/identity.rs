use serde::{Deserialize, Serialize};

use shopfront_core::UniqueKey;

use crate::Role;

/// The signed-in user as reported by `GET /users/me`.
///
/// `role` is kept as the raw string the server sent. An unrecognised role
/// must fail closed at decision time, not fail deserialization (which would
/// look like a transport error and could be retried forever).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: String,
    #[serde(rename = "ukey")]
    pub unique_key: UniqueKey,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

impl Identity {
    /// Parsed role, or `None` when the server sent a role this client does not know.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    /// Best-effort human label: full name, then username, then email.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => self.username.clone().unwrap_or_else(|| self.email.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_users_me_payload() {
        let json = r#"{
            "email": "ann@example.com",
            "first_name": "Ann",
            "last_name": null,
            "username": null,
            "ukey": "Q1W2E3R4T5Y6",
            "role": "support_moderator",
            "mfa_enabled": true
        }"#;

        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.unique_key.as_str(), "Q1W2E3R4T5Y6");
        assert_eq!(identity.role(), Some(Role::SupportModerator));
        assert!(identity.mfa_enabled);
        assert_eq!(identity.display_name(), "Ann");
    }

    #[test]
    fn unknown_role_still_deserializes() {
        let json = r#"{"email":"x@example.com","ukey":"K","role":"wizard"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.role(), None);
        assert!(!identity.mfa_enabled);
        assert_eq!(identity.display_name(), "x@example.com");
    }
}

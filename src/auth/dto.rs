use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::{Role, User};

/// `POST /auth` multiplexes sign-in and sign-up on this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthAction {
    Signin,
    Signup,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub action: AuthAction,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parses_lowercase() {
        let req: AuthRequest = serde_json::from_str(
            r#"{"action":"signup","email":"a@b.co","password":"secret1","name":"Ada"}"#,
        )
        .unwrap();
        assert_eq!(req.action, AuthAction::Signup);
        assert_eq!(req.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn name_is_optional_for_signin() {
        let req: AuthRequest =
            serde_json::from_str(r#"{"action":"signin","email":"a@b.co","password":"secret1"}"#)
                .unwrap();
        assert_eq!(req.action, AuthAction::Signin);
        assert!(req.name.is_none());
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<AuthRequest>(
            r#"{"action":"delete","email":"a@b.co","password":"secret1"}"#
        )
        .is_err());
    }
}

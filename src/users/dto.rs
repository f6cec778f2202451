use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{User, UserUpdate};

/// Public part of the user returned to the client. Never carries the hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Request body for `PATCH /users/me`. Any key outside this set is rejected,
/// including `is_active`: an account cannot reactivate itself.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        UserUpdate {
            email: req.email,
            ..UserUpdate::default()
        }
    }
}

/// Request body for `PUT /users/me/password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn update_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<UpdateUserRequest>(r#"{"password_hash":"x"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field"));

        let err = serde_json::from_str::<UpdateUserRequest>(r#"{"id":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));

        let err = serde_json::from_str::<UpdateUserRequest>(r#"{"is_active":true}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn update_request_maps_to_partial_update() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"email":"b@x.com"}"#).unwrap();
        let update = UserUpdate::from(req);
        assert_eq!(update.email.as_deref(), Some("b@x.com"));
        assert!(update.is_active.is_none());
        assert!(update.password_hash.is_none());
    }
}

//! # Customer Session
//!
//! The access token and user profile the storefront keeps in client
//! storage after a successful login.

use crate::error::RentalResult;
use crate::storage::KeyValueStorage;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Storage key of the bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the serialized user profile
pub const USER_KEY: &str = "user";

/// Customer profile as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "usuario_id")]
    pub id: i64,

    #[serde(rename = "nombre")]
    pub first_name: String,

    #[serde(rename = "apellido", default)]
    pub last_name: String,

    pub email: String,

    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Response of `POST /login`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: UserProfile,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A session restored from storage
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub user: Option<UserProfile>,
}

/// Persist a successful login
pub fn save_session<S: KeyValueStorage + ?Sized>(
    storage: &S,
    login: &LoginResponse,
) -> RentalResult<()> {
    storage.set(ACCESS_TOKEN_KEY, &login.access_token)?;
    storage.set(USER_KEY, &serde_json::to_string(&login.user)?)?;
    Ok(())
}

/// Restore the stored session, if any.
///
/// A token without a readable profile still counts as a session.
pub fn load_session<S: KeyValueStorage + ?Sized>(storage: &S) -> RentalResult<Option<AuthSession>> {
    let Some(access_token) = storage.get(ACCESS_TOKEN_KEY)? else {
        return Ok(None);
    };
    if access_token.is_empty() {
        return Ok(None);
    }

    let user = match storage.get(USER_KEY)? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring unreadable stored user profile: {}", e);
                None
            }
        },
        None => None,
    };

    Ok(Some(AuthSession { access_token, user }))
}

/// Forget the stored session (logout)
pub fn clear_session<S: KeyValueStorage + ?Sized>(storage: &S) -> RentalResult<()> {
    storage.remove(ACCESS_TOKEN_KEY)?;
    storage.remove(USER_KEY)
}

/// Whether a token is stored
pub fn is_authenticated<S: KeyValueStorage + ?Sized>(storage: &S) -> bool {
    matches!(storage.get(ACCESS_TOKEN_KEY), Ok(Some(token)) if !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn login() -> LoginResponse {
        serde_json::from_str(
            r#"{
                "access_token": "eyJhbGciOi",
                "token_type": "bearer",
                "user": {
                    "usuario_id": 12,
                    "nombre": "Ana",
                    "apellido": "Gómez",
                    "email": "ana@example.com",
                    "telefono": "3001234567",
                    "fecha_registro": "2025-01-10T12:00:00"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load_session() {
        let storage = MemoryStorage::new();
        assert!(!is_authenticated(&storage));

        save_session(&storage, &login()).unwrap();
        assert!(is_authenticated(&storage));

        let session = load_session(&storage).unwrap().unwrap();
        assert_eq!(session.access_token, "eyJhbGciOi");
        assert_eq!(session.user.unwrap().full_name(), "Ana Gómez");
    }

    #[test]
    fn test_corrupt_profile_keeps_token() {
        let storage = MemoryStorage::new()
            .with_entry(ACCESS_TOKEN_KEY, "tok")
            .with_entry(USER_KEY, "{broken");

        let session = load_session(&storage).unwrap().unwrap();
        assert_eq!(session.access_token, "tok");
        assert!(session.user.is_none());
    }

    #[test]
    fn test_clear_session() {
        let storage = MemoryStorage::new();
        save_session(&storage, &login()).unwrap();
        clear_session(&storage).unwrap();

        assert!(!is_authenticated(&storage));
        assert!(load_session(&storage).unwrap().is_none());
    }
}

//! Request-body checks run before any core call.

use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{FieldError, ServiceError};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose shape of a register/admin body; field types are checked by
/// [`validate_credentials`] so each bad field gets its own message.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub username: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
}

/// Validated `(username, password)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub fn validate_credentials(body: CredentialsBody) -> Result<Credentials, ServiceError> {
    let mut errors = Vec::new();

    let username = match body.username {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => {
            errors.push(FieldError::new("username", "username is required"));
            None
        }
    };

    let password = match body.password {
        Some(Value::String(s)) if s.chars().count() >= MIN_PASSWORD_LEN => Some(s),
        _ => {
            errors.push(FieldError::new(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
            None
        }
    };

    match (username, password) {
        (Some(username), Some(password)) => Ok(Credentials { username, password }),
        _ => Err(ServiceError::Validation(errors)),
    }
}

/// Turn an axum body rejection into a validation failure on `body`.
pub fn body_rejected(rejection: &JsonRejection) -> ServiceError {
    ServiceError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

/// Parse a query value as an integer, falling back to `default`.
pub fn int_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Item ids in paths; anything non-numeric names no item.
pub fn item_id(raw: &str) -> Result<u64, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::NotFound(format!("item {raw} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> CredentialsBody {
        serde_json::from_value(value).unwrap()
    }

    fn fields(err: ServiceError) -> Vec<String> {
        match err {
            ServiceError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_good_credentials() {
        let creds =
            validate_credentials(body(json!({"username": "alice", "password": "secret1"})))
                .unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret1");
    }

    #[test]
    fn short_password_is_rejected() {
        let err = validate_credentials(body(json!({"username": "alice", "password": "12345"})))
            .unwrap_err();
        assert_eq!(fields(err), vec!["password"]);
    }

    #[test]
    fn six_characters_is_enough() {
        assert!(
            validate_credentials(body(json!({"username": "a", "password": "123456"}))).is_ok()
        );
    }

    #[test]
    fn reports_every_failing_field() {
        let err = validate_credentials(body(json!({}))).unwrap_err();
        assert_eq!(fields(err), vec!["username", "password"]);
    }

    #[test]
    fn non_string_values_are_rejected() {
        let err =
            validate_credentials(body(json!({"username": 42, "password": ["a", "b", "c", "d", "e", "f"]})))
                .unwrap_err();
        assert_eq!(fields(err), vec!["username", "password"]);

        let err = validate_credentials(body(json!({"username": "", "password": "longenough"})))
            .unwrap_err();
        assert_eq!(fields(err), vec!["username"]);
    }

    #[test]
    fn query_ints_fall_back_to_defaults() {
        assert_eq!(int_or(None, 10), 10);
        assert_eq!(int_or(Some("abc"), 10), 10);
        assert_eq!(int_or(Some("25"), 10), 25);
        assert_eq!(int_or(Some("-3"), 1), -3);
    }

    #[test]
    fn item_ids_must_be_numeric() {
        assert_eq!(item_id("12").unwrap(), 12);
        assert!(matches!(item_id("abc"), Err(ServiceError::NotFound(_))));
        assert!(matches!(item_id("-1"), Err(ServiceError::NotFound(_))));
    }
}

//! Caller identity and role checks.
//!
//! Authentication happens upstream. The gateway forwards the caller's id in
//! `X-User-Id` and role in `X-User-Role`; handlers only check the role
//! against the operation.

use axum::http::HeaderMap;
use simtani_core::UserId;
use tracing::warn;

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    /// Field extension officer.
    Penyuluh,
    KepalaBidang,
    KepalaDinas,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "PENYULUH" => Some(Self::Penyuluh),
            "KEPALA_BIDANG" => Some(Self::KepalaBidang),
            "KEPALA_DINAS" => Some(Self::KepalaDinas),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Penyuluh => "PENYULUH",
            Self::KepalaBidang => "KEPALA_BIDANG",
            Self::KepalaDinas => "KEPALA_DINAS",
        }
    }
}

pub const ANY_ROLE: &[Role] = &[
    Role::Admin,
    Role::Penyuluh,
    Role::KepalaBidang,
    Role::KepalaDinas,
];
pub const EDITORS: &[Role] = &[Role::Penyuluh, Role::Admin];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const REPORT_READERS: &[Role] = &[Role::KepalaBidang, Role::KepalaDinas, Role::Admin];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the caller and check their role is one of `allowed`.
pub fn authorize(headers: &HeaderMap, allowed: &[Role]) -> Result<Actor, ApiError> {
    let Some(user_id) = header_value(headers, USER_ID_HEADER) else {
        return Err(ApiError::Unauthorized(
            "Missing caller identity".to_string(),
        ));
    };
    let Some(role) = header_value(headers, USER_ROLE_HEADER).and_then(Role::parse) else {
        return Err(ApiError::Unauthorized(
            "Missing or unknown caller role".to_string(),
        ));
    };

    if !allowed.contains(&role) {
        warn!(user_id, role = role.as_str(), "Rejected request for role");
        return Err(ApiError::Forbidden(format!(
            "Role {} may not perform this operation",
            role.as_str()
        )));
    }

    Ok(Actor {
        user_id: UserId::from(user_id),
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(user: Option<&'static str>, role: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(user) = user {
            headers.insert(USER_ID_HEADER, HeaderValue::from_static(user));
        }
        if let Some(role) = role {
            headers.insert(USER_ROLE_HEADER, HeaderValue::from_static(role));
        }
        headers
    }

    #[test]
    fn test_authorize_success() {
        let actor = authorize(&headers(Some("u-1"), Some("ADMIN")), ADMIN_ONLY).unwrap();
        assert_eq!(actor.user_id, UserId::from("u-1"));
        assert_eq!(actor.role, Role::Admin);
    }

    #[test]
    fn test_missing_user_is_unauthorized() {
        let err = authorize(&headers(None, Some("ADMIN")), ANY_ROLE).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let err = authorize(&headers(Some("u-1"), Some("FARMER")), ANY_ROLE).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_wrong_role_is_forbidden() {
        let err = authorize(&headers(Some("u-1"), Some("PENYULUH")), ADMIN_ONLY).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("kepala_dinas"), Some(Role::KepalaDinas));
        assert_eq!(Role::parse("Penyuluh"), Some(Role::Penyuluh));
    }
}

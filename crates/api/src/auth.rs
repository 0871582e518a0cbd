//! Caller identity resolved upstream and passed in request headers.
//!
//! `x-user-id` carries the user or guest session id and `x-roles` a
//! comma-separated role list. Credentials are verified before requests
//! reach this service.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLES_HEADER: &str = "x-roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("ROLE_").unwrap_or(name);
        match name.to_ascii_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(ApiError::BadRequest(format!("unknown role '{s}'"))),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }

    /// Allows the owner of a resource or an admin.
    pub fn require_owner_or_admin(&self, owner: UserId) -> Result<(), ApiError> {
        if self.user_id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("not the owner of this resource".to_string()))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;
        let user_id: UserId = raw
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;

        let roles = match parts.headers.get(ROLES_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("malformed {ROLES_HEADER} header")))?
                .split(',')
                .filter(|r| !r.trim().is_empty())
                .map(Role::from_str)
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![Role::User],
        };

        Ok(Caller { user_id, roles })
    }
}

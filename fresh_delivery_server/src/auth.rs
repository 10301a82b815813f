//! Caller identity.
//!
//! Authentication happens upstream. The authenticating proxy strips any client-supplied identity headers and injects
//! `X-User-Id` and `X-User-Role` for the verified caller, and the server trusts them as given.
use std::{
    fmt::Display,
    future::{ready, Ready},
    str::FromStr,
};

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpRequest};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Courier,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Courier => f.write_str("courier"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "courier" => Ok(Role::Courier),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Reads the identity headers. A missing role header means an ordinary user.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ServerError> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ServerError::Unauthorized(format!("No {USER_ID_HEADER} header")))?
            .to_str()
            .map_err(|e| ServerError::Unauthorized(format!("Unreadable {USER_ID_HEADER} header. {e}")))?
            .trim()
            .parse::<i64>()
            .map_err(|e| ServerError::Unauthorized(format!("Invalid {USER_ID_HEADER} header. {e}")))?;
        let role = match headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(v) => v
                .to_str()
                .map_err(|e| e.to_string())
                .and_then(Role::from_str)
                .map_err(|e| ServerError::Unauthorized(format!("Invalid {USER_ROLE_HEADER} header. {e}")))?,
        };
        Ok(Self { user_id, role })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl FromRequest for Caller {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = Caller::from_headers(req.headers());
        if let Err(e) = &result {
            debug!("💻️ Rejecting request to {}. {e}", req.path());
        }
        ready(result)
    }
}

//! Current-user extraction.
//!
//! Session handling lives upstream; the authenticated user arrives as
//! trusted `x-user-id` / `x-user-role` headers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use careplan_core::{Identity, Role};

use super::errors::ApiError;

/// Header carrying the numeric user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the role name
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Authenticated user of the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl CurrentUser {
    /// Reject users whose role may not change plans or attachments
    pub fn require_editor(&self) -> Result<&Identity, ApiError> {
        if self.0.can_edit_plans() {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden(format!(
                "Role '{}' may not modify treatment plans",
                self.0.role
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?
            .parse::<i64>()
            .map_err(|_| ApiError::Unauthorized("Malformed user id".to_string()))?;

        let role = header(parts, USER_ROLE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        Ok(CurrentUser(Identity::new(user_id, Role::from(role.to_string()))))
    }
}

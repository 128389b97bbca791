use crate::auth::Principal;
use crate::error::AppError;
use crate::models::Role;

/// Authorization tier attached to every RPC operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Public,
    /// Any authenticated principal.
    Protected,
    Admin,
    SuperAdmin,
}

/// Caller as seen by an operation once the gate has let it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Anonymous,
    Principal(Principal),
}

impl Access {
    pub fn principal(&self) -> Result<&Principal, AppError> {
        match self {
            Access::Principal(p) => Ok(p),
            Access::Anonymous => Err(AppError::Unauthorized(
                "Authentication required".to_string(),
            )),
        }
    }
}

/// Single entry point for tier checks. Runs before any operation is dispatched.
pub fn authorize(tier: Tier, principal: Option<Principal>) -> Result<Access, AppError> {
    let required_role = match tier {
        Tier::Public => {
            return Ok(principal.map_or(Access::Anonymous, Access::Principal));
        }
        Tier::Protected => None,
        Tier::Admin => Some(Role::Admin),
        Tier::SuperAdmin => Some(Role::SuperAdmin),
    };

    let Some(principal) = principal else {
        return Err(AppError::Unauthorized(
            "Authentication required".to_string(),
        ));
    };

    match required_role {
        Some(role) if principal.role != role => {
            tracing::debug!(user_id = %principal.id, ?tier, "Insufficient role");
            Err(AppError::Unauthorized("Insufficient privileges".to_string()))
        }
        _ => Ok(Access::Principal(principal)),
    }
}

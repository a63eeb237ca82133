use grofvuil_atoms::users::{Role, User};
use grofvuil_atoms::ServiceError;

pub fn require_caller(caller: Option<&User>) -> Result<&User, ServiceError> {
    caller.ok_or_else(|| ServiceError::Unauthorized("Unauthorized - no token".to_string()))
}

/// Workers and admins
pub fn require_staff(caller: Option<&User>) -> Result<&User, ServiceError> {
    let user = require_caller(caller)?;
    if !user.role.is_staff() {
        return Err(ServiceError::Forbidden(
            "Forbidden - only workers and admins can change status".to_string(),
        ));
    }
    Ok(user)
}

pub fn require_admin(caller: Option<&User>) -> Result<&User, ServiceError> {
    let user = require_caller(caller)?;
    if user.role != Role::Admin {
        return Err(ServiceError::Forbidden("Forbidden - admin only".to_string()));
    }
    Ok(user)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use grofvuil_atoms::users::{Role, User};

    pub fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@grofvuil.nl", id),
            name: format!("{:?} {}", role, id),
            role,
            avatar: None,
            neighborhood: None,
            created_at: Utc::now(),
        }
    }
}

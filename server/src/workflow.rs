//! Visa case workflow: which status changes are legal and who may make them.

use thiserror::Error;

use crate::error::ApiError;
use crate::models::{Role, VisaStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot move a visa application from {} to {}", .from.as_str(), .to.as_str())]
    Illegal { from: VisaStatus, to: VisaStatus },

    #[error("Only an admin can move a visa application from {} to {}", .from.as_str(), .to.as_str())]
    RoleRequired { from: VisaStatus, to: VisaStatus, role: Role },
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal { .. } => ApiError::bad_request(err.to_string()),
            TransitionError::RoleRequired { .. } => ApiError::forbidden(err.to_string()),
        }
    }
}

/// Role needed for `from -> to`; `None` inside `Some` means any signed-in user.
fn required_role(from: VisaStatus, to: VisaStatus) -> Option<Option<Role>> {
    use VisaStatus::*;

    match (from, to) {
        (Draft, Submitted) | (Submitted, Draft) | (Rejected, Draft) => Some(None),
        (Submitted, UnderReview)
        | (UnderReview, Locked)
        | (Locked, UnderReview)
        | (UnderReview | Locked, Approved | Rejected) => Some(Some(Role::Admin)),
        _ => None,
    }
}

pub fn check_transition(from: VisaStatus, to: VisaStatus, role: Role) -> Result<(), TransitionError> {
    match required_role(from, to) {
        None => Err(TransitionError::Illegal { from, to }),
        Some(Some(required)) if required != role => Err(TransitionError::RoleRequired { from, to, role }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VisaStatus::*;

    #[test]
    fn anyone_can_submit_and_withdraw() {
        for role in [Role::Staff, Role::Doctor, Role::Admin] {
            assert!(check_transition(Draft, Submitted, role).is_ok());
            assert!(check_transition(Submitted, Draft, role).is_ok());
            assert!(check_transition(Rejected, Draft, role).is_ok());
        }
    }

    #[test]
    fn review_steps_need_admin() {
        assert!(check_transition(Submitted, UnderReview, Role::Admin).is_ok());
        assert!(check_transition(UnderReview, Locked, Role::Admin).is_ok());
        assert!(check_transition(Locked, Approved, Role::Admin).is_ok());
        assert!(check_transition(UnderReview, Rejected, Role::Admin).is_ok());

        assert_eq!(
            check_transition(Submitted, UnderReview, Role::Staff),
            Err(TransitionError::RoleRequired {
                from: Submitted,
                to: UnderReview,
                role: Role::Staff
            })
        );
    }

    #[test]
    fn illegal_moves() {
        assert!(matches!(
            check_transition(Draft, Approved, Role::Admin),
            Err(TransitionError::Illegal { .. })
        ));
        assert!(check_transition(Approved, Draft, Role::Admin).is_err());
        assert!(check_transition(Draft, Draft, Role::Admin).is_err());
    }

    #[test]
    fn errors_map_to_statuses() {
        let illegal: ApiError = check_transition(Draft, Locked, Role::Admin).unwrap_err().into();
        assert_eq!(illegal.status(), axum::http::StatusCode::BAD_REQUEST);

        let forbidden: ApiError = check_transition(Locked, Approved, Role::Doctor).unwrap_err().into();
        assert_eq!(forbidden.status(), axum::http::StatusCode::FORBIDDEN);
    }
}

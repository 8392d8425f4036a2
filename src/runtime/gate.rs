/// Role-based approval gate
///
/// Decides whether an actor may apply an operation directly or whether the
/// operation has to be filed as an approval request.

use crate::error::{EngineError, Result};
use crate::process::types::{Actor, Role};

/// Who an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The role recorded on the instance's current element.
    ElementRole(Role),
    /// Admin or Manager; used for definition publication and deletion.
    Privileged,
}

/// Outcome of checking an actor against a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Defer,
}

/// Check `actor` against `requirement`.
///
/// Privileged actors always proceed. Others proceed only when their role is the
/// element's role; definition operations always defer for them.
pub fn check(actor: &Actor, requirement: Requirement) -> GateDecision {
    if actor.role.is_privileged() {
        return GateDecision::Proceed;
    }
    match requirement {
        Requirement::ElementRole(required) if actor.role == required => GateDecision::Proceed,
        _ => GateDecision::Defer,
    }
}

/// Only privileged actors resolve approval requests.
pub fn ensure_can_resolve(actor: &Actor) -> Result<()> {
    if actor.role.is_privileged() {
        Ok(())
    } else {
        Err(EngineError::Unauthorized(format!(
            "{} ({}) cannot resolve approval requests",
            actor.name, actor.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> Actor {
        Actor::new("u", "someone", role)
    }

    #[test]
    fn matching_role_proceeds() {
        assert_eq!(
            check(&actor(Role::Employee), Requirement::ElementRole(Role::Employee)),
            GateDecision::Proceed
        );
    }

    #[test]
    fn lower_role_defers_on_higher_element() {
        assert_eq!(
            check(&actor(Role::Employee), Requirement::ElementRole(Role::Manager)),
            GateDecision::Defer
        );
        assert_eq!(
            check(&actor(Role::Employee), Requirement::ElementRole(Role::Admin)),
            GateDecision::Defer
        );
    }

    #[test]
    fn privileged_roles_always_proceed() {
        for role in [Role::Admin, Role::Manager] {
            assert_eq!(
                check(&actor(role), Requirement::ElementRole(Role::Employee)),
                GateDecision::Proceed
            );
            assert_eq!(check(&actor(role), Requirement::Privileged), GateDecision::Proceed);
        }
    }

    #[test]
    fn employees_defer_on_definition_operations() {
        assert_eq!(
            check(&actor(Role::Employee), Requirement::Privileged),
            GateDecision::Defer
        );
    }

    #[test]
    fn only_privileged_resolve() {
        assert!(ensure_can_resolve(&actor(Role::Manager)).is_ok());
        assert!(matches!(
            ensure_can_resolve(&actor(Role::Employee)),
            Err(EngineError::Unauthorized(_))
        ));
    }
}

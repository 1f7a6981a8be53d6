// Authorization gate
// Decision: Pure functions over an already-resolved identity; no I/O, no caching
// Decision: Deny by default; admins pass every ownership check

use uuid::Uuid;

use super::session::Identity;

pub fn is_admin(identity: &Identity) -> bool {
    identity.is_admin()
}

pub fn is_owner(identity: &Identity, resource_owner_id: Uuid) -> bool {
    identity.id == resource_owner_id
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    AdminRequired,
    NotOwner,
}

impl DenyReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::AdminRequired => "Admin access required",
            Self::NotOwner => "You do not have access to this resource",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// What a route demands of the caller
#[derive(Debug, Clone, Copy)]
pub enum Requirement<'a> {
    Admin,
    /// Any of the listed users, or an admin
    OwnerOrAdmin(&'a [Uuid]),
}

pub fn decide(identity: &Identity, requirement: Requirement<'_>) -> Decision {
    if is_admin(identity) {
        return Decision::Allow;
    }

    match requirement {
        Requirement::Admin => Decision::Deny(DenyReason::AdminRequired),
        Requirement::OwnerOrAdmin(owners) => {
            if owners.iter().any(|owner| is_owner(identity, *owner)) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::Role;

    fn identity(role: Role) -> Identity {
        Identity {
            id: Uuid::now_v7(),
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            two_factor_enabled: false,
        }
    }

    #[test]
    fn test_is_admin_follows_role() {
        assert!(is_admin(&identity(Role::Admin)));
        assert!(!is_admin(&identity(Role::User)));
    }

    #[test]
    fn test_is_owner_compares_ids() {
        let user = identity(Role::User);
        assert!(is_owner(&user, user.id));
        assert!(!is_owner(&user, Uuid::now_v7()));
    }

    #[test]
    fn test_admin_requirement() {
        assert_eq!(
            decide(&identity(Role::User), Requirement::Admin),
            Decision::Deny(DenyReason::AdminRequired)
        );
        assert!(decide(&identity(Role::Admin), Requirement::Admin).is_allowed());
    }

    #[test]
    fn test_owner_or_admin_requirement() {
        let owner = identity(Role::User);
        let stranger = identity(Role::User);
        let admin = identity(Role::Admin);
        let owners = [owner.id];

        assert!(decide(&owner, Requirement::OwnerOrAdmin(&owners)).is_allowed());
        assert!(decide(&admin, Requirement::OwnerOrAdmin(&owners)).is_allowed());
        assert_eq!(
            decide(&stranger, Requirement::OwnerOrAdmin(&owners)),
            Decision::Deny(DenyReason::NotOwner)
        );
    }

    #[test]
    fn test_no_owners_denies_non_admin() {
        let user = identity(Role::User);
        assert!(!decide(&user, Requirement::OwnerOrAdmin(&[])).is_allowed());
    }

    #[test]
    fn test_decision_is_stable_for_unchanged_input() {
        let user = identity(Role::User);
        let owners = [Uuid::now_v7()];
        let first = decide(&user, Requirement::OwnerOrAdmin(&owners));
        let second = decide(&user, Requirement::OwnerOrAdmin(&owners));
        assert_eq!(first, second);
    }
}

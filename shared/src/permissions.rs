//! Permission resolution and guard predicates
//!
//! A user's capabilities are the union of the permission strings of every role
//! they hold. `all_access` satisfies any permission check. Role levels form a
//! separate, numeric authority ranking used for minimum-level gates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Role, RoleName};

pub const ALL_ACCESS: &str = "all_access";
pub const USER_MANAGEMENT: &str = "user_management";
pub const INVENTORY_MANAGEMENT: &str = "inventory_management";
pub const INVENTORY_VIEW: &str = "inventory_view";
pub const VEHICLE_MANAGEMENT: &str = "vehicle_management";
pub const REORDER_MANAGEMENT: &str = "reorder_management";
pub const VIEW_LOGS: &str = "view_logs";
pub const TRAINING_MANAGEMENT: &str = "training_management";
pub const TRAINING_ATTEND: &str = "training_attend";
pub const ATTENDANCE_MANAGEMENT: &str = "attendance_management";
pub const CERTIFICATE_MANAGEMENT: &str = "certificate_management";
pub const CIVILIAN_PORTAL: &str = "civilian_portal";

/// Every permission string the platform understands
pub const KNOWN_PERMISSIONS: [&str; 12] = [
    ALL_ACCESS,
    USER_MANAGEMENT,
    INVENTORY_MANAGEMENT,
    INVENTORY_VIEW,
    VEHICLE_MANAGEMENT,
    REORDER_MANAGEMENT,
    VIEW_LOGS,
    TRAINING_MANAGEMENT,
    TRAINING_ATTEND,
    ATTENDANCE_MANAGEMENT,
    CERTIFICATE_MANAGEMENT,
    CIVILIAN_PORTAL,
];

pub fn is_known_permission(permission: &str) -> bool {
    KNOWN_PERMISSIONS.contains(&permission)
}

/// Union of permission strings granted to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal membership, without the `all_access` escape hatch
    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn has_all_access(&self) -> bool {
        self.contains(ALL_ACCESS)
    }

    pub fn insert(&mut self, permission: impl Into<String>) {
        self.0.insert(permission.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Union of all permission strings across the given roles
pub fn resolve_permissions(roles: &[Role]) -> PermissionSet {
    roles
        .iter()
        .flat_map(|role| role.permissions.iter().cloned())
        .collect()
}

pub fn has_permission(permissions: &PermissionSet, required: &str) -> bool {
    permissions.has_all_access() || permissions.contains(required)
}

pub fn has_any_permission(permissions: &PermissionSet, required: &[&str]) -> bool {
    required.iter().any(|p| has_permission(permissions, p))
}

pub fn has_all_permissions(permissions: &PermissionSet, required: &[&str]) -> bool {
    required.iter().all(|p| has_permission(permissions, p))
}

/// Highest level among the given roles, 0 when there are none
pub fn user_level(roles: &[Role]) -> i32 {
    roles.iter().map(|r| r.level).max().unwrap_or(0)
}

pub fn has_minimum_level(user_level: i32, required: i32) -> bool {
    user_level >= required
}

pub fn has_role(roles: &[Role], name: RoleName) -> bool {
    roles.iter().any(|r| r.name == name)
}

pub fn has_any_role(roles: &[Role], names: &[RoleName]) -> bool {
    roles.iter().any(|r| names.contains(&r.name))
}

/// A single authorization check attached to a route.
///
/// Guards are evaluated in order by [`evaluate_guards`]; the first one that
/// fails decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Permission(&'static str),
    AnyPermission(&'static [&'static str]),
    AllPermissions(&'static [&'static str]),
    MinLevel(i32),
    Role(RoleName),
    AnyRole(&'static [RoleName]),
}

impl Guard {
    pub fn check(&self, roles: &[Role], permissions: &PermissionSet) -> bool {
        match *self {
            Guard::Permission(p) => has_permission(permissions, p),
            Guard::AnyPermission(ps) => has_any_permission(permissions, ps),
            Guard::AllPermissions(ps) => has_all_permissions(permissions, ps),
            Guard::MinLevel(level) => has_minimum_level(user_level(roles), level),
            Guard::Role(name) => has_role(roles, name),
            Guard::AnyRole(names) => has_any_role(roles, names),
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Permission(p) => write!(f, "Permission denied: requires {}", p),
            Guard::AnyPermission(ps) => {
                write!(f, "Permission denied: requires one of {}", ps.join(", "))
            }
            Guard::AllPermissions(ps) => {
                write!(f, "Permission denied: requires all of {}", ps.join(", "))
            }
            Guard::MinLevel(level) => write!(f, "Access denied: requires role level {} or higher", level),
            Guard::Role(name) => write!(f, "Access denied: requires role {}", name),
            Guard::AnyRole(names) => {
                let names: Vec<&str> = names.iter().map(RoleName::as_str).collect();
                write!(f, "Access denied: requires one of the roles {}", names.join(", "))
            }
        }
    }
}

/// Evaluate a chain of guards, returning the first one that fails
pub fn evaluate_guards<'g>(
    guards: &'g [Guard],
    roles: &[Role],
    permissions: &PermissionSet,
) -> Result<(), &'g Guard> {
    guards
        .iter()
        .find(|guard| !guard.check(roles, permissions))
        .map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_role, default_roles};

    fn perms(list: &[&str]) -> PermissionSet {
        list.iter().copied().collect()
    }

    #[test]
    fn test_resolve_permissions_unions_roles() {
        let roles = vec![
            default_role(RoleName::Firefighter),
            default_role(RoleName::SecondClassOfficer),
        ];
        let set = resolve_permissions(&roles);
        assert!(set.contains(INVENTORY_VIEW));
        assert!(set.contains(TRAINING_MANAGEMENT));
        assert!(set.contains(TRAINING_ATTEND));
        assert!(!set.contains(USER_MANAGEMENT));
        // training_attend and inventory_view appear in both roles
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_all_access_satisfies_everything() {
        let set = perms(&[ALL_ACCESS]);
        for p in KNOWN_PERMISSIONS {
            assert!(has_permission(&set, p));
        }
        assert!(has_permission(&set, "something_new"));
        assert!(has_all_permissions(&set, &[USER_MANAGEMENT, VIEW_LOGS]));
    }

    #[test]
    fn test_any_and_all_quantifiers() {
        let set = perms(&[INVENTORY_VIEW]);
        assert!(has_any_permission(&set, &[INVENTORY_MANAGEMENT, INVENTORY_VIEW]));
        assert!(!has_all_permissions(&set, &[INVENTORY_MANAGEMENT, INVENTORY_VIEW]));
        assert!(!has_any_permission(&set, &[]));
        assert!(has_all_permissions(&set, &[]));
    }

    #[test]
    fn test_user_level_is_max() {
        let roles = vec![
            default_role(RoleName::Volunteer),
            default_role(RoleName::FirstClassOfficer),
        ];
        assert_eq!(user_level(&roles), 70);
        assert_eq!(user_level(&[]), 0);
        assert!(has_minimum_level(70, 70));
        assert!(!has_minimum_level(69, 70));
    }

    #[test]
    fn test_role_membership() {
        let roles = vec![default_role(RoleName::Cfo)];
        assert!(has_role(&roles, RoleName::Cfo));
        assert!(!has_role(&roles, RoleName::Admin));
        assert!(has_any_role(&roles, &[RoleName::Admin, RoleName::Cfo]));
        assert!(!has_any_role(&roles, &[]));
    }

    #[test]
    fn test_guard_chain_reports_first_failure() {
        let roles = vec![default_role(RoleName::Firefighter)];
        let set = resolve_permissions(&roles);
        let guards = [
            Guard::MinLevel(20),
            Guard::Permission(INVENTORY_MANAGEMENT),
            Guard::Role(RoleName::Admin),
        ];
        assert_eq!(
            evaluate_guards(&guards, &roles, &set),
            Err(&Guard::Permission(INVENTORY_MANAGEMENT))
        );
        assert!(evaluate_guards(&guards[..1], &roles, &set).is_ok());
        assert!(evaluate_guards(&[], &roles, &set).is_ok());
    }

    #[test]
    fn test_admin_role_bypasses_permission_but_not_role_guards() {
        let roles = vec![default_role(RoleName::Admin)];
        let set = resolve_permissions(&roles);
        assert!(Guard::AllPermissions(&[VEHICLE_MANAGEMENT, INVENTORY_MANAGEMENT]).check(&roles, &set));
        assert!(!Guard::Role(RoleName::Cfo).check(&roles, &set));
    }

    #[test]
    fn test_default_catalogue_uses_known_permissions() {
        for role in default_roles() {
            for p in &role.permissions {
                assert!(is_known_permission(p), "{} grants unknown {}", role.name, p);
            }
        }
    }

    #[test]
    fn test_guard_messages() {
        assert_eq!(
            Guard::Permission(VIEW_LOGS).to_string(),
            "Permission denied: requires view_logs"
        );
        assert_eq!(
            Guard::AnyRole(&[RoleName::Admin, RoleName::FirstClassOfficer]).to_string(),
            "Access denied: requires one of the roles admin, 1st_class_officer"
        );
    }
}

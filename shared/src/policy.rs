//! User-management access policy and login portal rules
//!
//! User management is not a flat permission check. The requester falls into
//! one of three tiers, and each tier is described by a row in a static rules
//! table:
//!
//! | Tier       | list | create | others | delete | assign roles | hidden targets |
//! |------------|------|--------|--------|--------|--------------|----------------|
//! | `Admin`    | yes  | yes    | yes    | yes    | yes          | none           |
//! | `Officer`  | yes  | yes    | yes    | yes    | yes          | admin, cfo     |
//! | `SelfOnly` | no   | no     | no     | no     | no           | n/a            |
//!
//! Hidden targets are filtered from listings and re-checked on every
//! single-record access, and may not be assigned by that tier.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Role, RoleName};
use crate::permissions::has_role;
use crate::types::UserType;

/// Why a user-management request was refused
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Denial {
    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(&'static str),
    /// Request is malformed regardless of rights (400)
    #[error("{0}")]
    BadRequest(&'static str),
}

/// Operations on user records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    List,
    Create,
    Read,
    Update,
    Delete,
}

/// The access class a requester falls into for user management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAccessTier {
    Admin,
    Officer,
    SelfOnly,
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierRules {
    pub list: bool,
    pub create: bool,
    pub access_others: bool,
    pub delete: bool,
    pub assign_roles: bool,
    pub hidden_roles: &'static [RoleName],
}

const ADMIN_RULES: TierRules = TierRules {
    list: true,
    create: true,
    access_others: true,
    delete: true,
    assign_roles: true,
    hidden_roles: &[],
};

const OFFICER_RULES: TierRules = TierRules {
    list: true,
    create: true,
    access_others: true,
    delete: true,
    assign_roles: true,
    hidden_roles: &RoleName::PROTECTED,
};

const SELF_ONLY_RULES: TierRules = TierRules {
    list: false,
    create: false,
    access_others: false,
    delete: false,
    assign_roles: false,
    hidden_roles: &[],
};

pub const SELF_DELETE_MESSAGE: &str = "You cannot delete your own account";
pub const PROTECTED_TARGET_MESSAGE: &str =
    "You do not have permission to manage admin or cfo accounts";
pub const PROTECTED_ASSIGNMENT_MESSAGE: &str = "You cannot assign admin or cfo roles";
pub const OWN_RECORD_ONLY_MESSAGE: &str = "You can only access your own user record";

impl UserAccessTier {
    /// Tier for a requester holding the given roles
    pub fn for_roles(roles: &[Role]) -> Self {
        if has_role(roles, RoleName::Admin) {
            UserAccessTier::Admin
        } else if has_role(roles, RoleName::FirstClassOfficer) {
            UserAccessTier::Officer
        } else {
            UserAccessTier::SelfOnly
        }
    }

    pub const fn rules(self) -> TierRules {
        match self {
            UserAccessTier::Admin => ADMIN_RULES,
            UserAccessTier::Officer => OFFICER_RULES,
            UserAccessTier::SelfOnly => SELF_ONLY_RULES,
        }
    }

    /// Role names whose holders this tier may not see or manage
    pub fn hidden_roles(self) -> &'static [RoleName] {
        self.rules().hidden_roles
    }

    /// Whether a user holding `target_roles` is visible to this tier
    pub fn can_see(self, target_roles: &[RoleName]) -> bool {
        !target_roles
            .iter()
            .any(|r| self.hidden_roles().contains(r))
    }

    /// Collection-level actions that have no single target
    pub fn authorize(self, action: UserAction) -> Result<(), Denial> {
        let rules = self.rules();
        let allowed = match action {
            UserAction::List => rules.list,
            UserAction::Create => rules.create,
            UserAction::Read | UserAction::Update => true,
            UserAction::Delete => rules.delete,
        };
        if allowed {
            Ok(())
        } else {
            Err(Denial::Forbidden(match action {
                UserAction::List => "You do not have permission to list users",
                UserAction::Create => "You do not have permission to create users",
                UserAction::Delete => "You do not have permission to delete users",
                UserAction::Read | UserAction::Update => OWN_RECORD_ONLY_MESSAGE,
            }))
        }
    }

    /// Decide an action against one existing user record.
    ///
    /// Self-deletion is refused before any tier rule is consulted.
    pub fn authorize_target(
        self,
        action: UserAction,
        requester_id: Uuid,
        target_id: Uuid,
        target_roles: &[RoleName],
    ) -> Result<(), Denial> {
        let is_self = requester_id == target_id;
        if action == UserAction::Delete && is_self {
            return Err(Denial::BadRequest(SELF_DELETE_MESSAGE));
        }

        self.authorize(action)?;

        if is_self {
            return Ok(());
        }
        if !self.rules().access_others {
            return Err(Denial::Forbidden(OWN_RECORD_ONLY_MESSAGE));
        }
        if !self.can_see(target_roles) {
            return Err(Denial::Forbidden(PROTECTED_TARGET_MESSAGE));
        }
        Ok(())
    }

    /// Decide whether the requested role names may be assigned by this tier
    pub fn authorize_role_assignment(self, requested: &[RoleName]) -> Result<(), Denial> {
        let rules = self.rules();
        if !rules.assign_roles {
            return Err(Denial::Forbidden("You do not have permission to assign roles"));
        }
        if requested.iter().any(|r| rules.hidden_roles.contains(r)) {
            return Err(Denial::Forbidden(PROTECTED_ASSIGNMENT_MESSAGE));
        }
        Ok(())
    }
}

/// The two login entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Staff,
    Civilian,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PortalRejection {
    #[error("This login is for the civilian-only portal")]
    NotCivilian,
    #[error("Civilian accounts must use the civilian portal")]
    CivilianAtStaffPortal,
}

impl Portal {
    /// Second gate after a successful credential check: the account's roles
    /// must match the portal being used.
    pub fn admits(self, roles: &[RoleName]) -> Result<(), PortalRejection> {
        let is_civilian = roles.contains(&RoleName::Civilian);
        match self {
            Portal::Civilian if !is_civilian => Err(PortalRejection::NotCivilian),
            Portal::Staff if is_civilian && roles.iter().all(|r| *r == RoleName::Civilian) => {
                Err(PortalRejection::CivilianAtStaffPortal)
            }
            _ => Ok(()),
        }
    }

    pub fn user_type(self) -> UserType {
        match self {
            Portal::Staff => UserType::Staff,
            Portal::Civilian => UserType::Civilian,
        }
    }
}

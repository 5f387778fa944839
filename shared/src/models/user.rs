//! User and role models

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permissions::{
    ALL_ACCESS, ATTENDANCE_MANAGEMENT, CERTIFICATE_MANAGEMENT, CIVILIAN_PORTAL,
    INVENTORY_MANAGEMENT, INVENTORY_VIEW, REORDER_MANAGEMENT, TRAINING_ATTEND,
    TRAINING_MANAGEMENT, USER_MANAGEMENT, VEHICLE_MANAGEMENT, VIEW_LOGS,
};

/// Names of the roles a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleName {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "cfo")]
    Cfo,
    #[serde(rename = "1st_class_officer")]
    FirstClassOfficer,
    #[serde(rename = "2nd_class_officer")]
    SecondClassOfficer,
    #[serde(rename = "firefighter")]
    Firefighter,
    #[serde(rename = "volunteer")]
    Volunteer,
    #[serde(rename = "civilian")]
    Civilian,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl RoleName {
    pub const ALL: [RoleName; 7] = [
        RoleName::Admin,
        RoleName::Cfo,
        RoleName::FirstClassOfficer,
        RoleName::SecondClassOfficer,
        RoleName::Firefighter,
        RoleName::Volunteer,
        RoleName::Civilian,
    ];

    /// Roles only an administrator may hold, assign or manage
    pub const PROTECTED: [RoleName; 2] = [RoleName::Admin, RoleName::Cfo];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "admin",
            RoleName::Cfo => "cfo",
            RoleName::FirstClassOfficer => "1st_class_officer",
            RoleName::SecondClassOfficer => "2nd_class_officer",
            RoleName::Firefighter => "firefighter",
            RoleName::Volunteer => "volunteer",
            RoleName::Civilian => "civilian",
        }
    }

    pub fn is_protected(&self) -> bool {
        Self::PROTECTED.contains(self)
    }

    /// Level given to the role in the default catalogue
    pub fn default_level(&self) -> i32 {
        match self {
            RoleName::Admin => 100,
            RoleName::Cfo => 90,
            RoleName::FirstClassOfficer => 70,
            RoleName::SecondClassOfficer => 60,
            RoleName::Firefighter => 40,
            RoleName::Volunteer => 20,
            RoleName::Civilian => 10,
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A role as resolved onto a user: its name, authority level and permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub level: i32,
    pub permissions: Vec<String>,
}

impl Role {
    pub fn new(name: RoleName, level: i32, permissions: &[&str]) -> Self {
        Self {
            name,
            level,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Postal address embedded in a user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Personal details embedded in a user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PersonalInfo {
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

/// External qualification recorded on a profile (driving licence class,
/// first-aid card), as opposed to certificates issued by the department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCertification {
    pub name: String,
    pub issued_by: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
}

impl ProfileCertification {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_on.is_some_and(|d| d < today)
    }
}

/// Role names held by a set of roles
pub fn role_names(roles: &[Role]) -> Vec<RoleName> {
    roles.iter().map(|r| r.name).collect()
}

/// Default role catalogue seeded for a new department
pub fn default_roles() -> Vec<Role> {
    RoleName::ALL
        .into_iter()
        .map(|name| {
            let permissions: &[&str] = match name {
                RoleName::Admin => &[ALL_ACCESS],
                RoleName::Cfo => &[
                    INVENTORY_MANAGEMENT,
                    INVENTORY_VIEW,
                    VEHICLE_MANAGEMENT,
                    REORDER_MANAGEMENT,
                    VIEW_LOGS,
                ],
                RoleName::FirstClassOfficer => &[
                    USER_MANAGEMENT,
                    INVENTORY_MANAGEMENT,
                    INVENTORY_VIEW,
                    VEHICLE_MANAGEMENT,
                    REORDER_MANAGEMENT,
                    TRAINING_MANAGEMENT,
                    ATTENDANCE_MANAGEMENT,
                    CERTIFICATE_MANAGEMENT,
                    VIEW_LOGS,
                ],
                RoleName::SecondClassOfficer => &[
                    INVENTORY_VIEW,
                    TRAINING_MANAGEMENT,
                    ATTENDANCE_MANAGEMENT,
                    TRAINING_ATTEND,
                ],
                RoleName::Firefighter => &[INVENTORY_VIEW, TRAINING_ATTEND],
                RoleName::Volunteer => &[TRAINING_ATTEND],
                RoleName::Civilian => &[CIVILIAN_PORTAL],
            };
            Role::new(name, name.default_level(), permissions)
        })
        .collect()
}

/// Look up a role in the default catalogue
pub fn default_role(name: RoleName) -> Role {
    default_roles()
        .into_iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| Role::new(name, name.default_level(), &[]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_round_trip_through_str() {
        for role in RoleName::ALL {
            assert_eq!(role.as_str().parse::<RoleName>(), Ok(role));
        }
        assert!("chief".parse::<RoleName>().is_err());
    }

    #[test]
    fn test_role_name_serde_matches_as_str() {
        let json = serde_json::to_string(&RoleName::FirstClassOfficer).unwrap();
        assert_eq!(json, "\"1st_class_officer\"");
    }

    #[test]
    fn test_default_catalogue_levels_descend() {
        let roles = default_roles();
        assert_eq!(roles.len(), RoleName::ALL.len());
        for pair in roles.windows(2) {
            assert!(pair[0].level > pair[1].level);
        }
    }

    #[test]
    fn test_profile_certification_expiry() {
        let cert = ProfileCertification {
            name: "Heavy vehicle licence".into(),
            issued_by: None,
            issued_on: None,
            expires_on: NaiveDate::from_ymd_opt(2024, 1, 31),
        };
        assert!(cert.is_expired(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(!cert.is_expired(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
    }

    #[test]
    fn test_only_admin_and_cfo_are_protected() {
        let protected: Vec<_> = RoleName::ALL.into_iter().filter(|r| r.is_protected()).collect();
        assert_eq!(protected, vec![RoleName::Admin, RoleName::Cfo]);
    }
}

//! WebAssembly module for the Fire Department Administration Platform
//!
//! Lets the browser evaluate the same authorization rules as the server so
//! the UI can hide actions the user would be refused:
//! - Permission and level checks against the roles in a session
//! - User-management tier decisions
//! - Login portal checks
//! - Client-side form validation

use js_sys::Array;
use shared::{
    evaluate_guards, has_permission as holds, resolve_permissions, user_level as highest_level,
    Guard, Portal, Role, RoleName, UserAccessTier, UserAction,
};
use uuid::Uuid;
use wasm_bindgen::prelude::*;

pub use shared::validation::*;

fn parse_roles(roles_json: &str) -> Result<Vec<Role>, JsValue> {
    serde_json::from_str(roles_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid roles JSON: {}", e)))
}

fn parse_role_names(names_json: &str) -> Result<Vec<RoleName>, JsValue> {
    serde_json::from_str(names_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid role names JSON: {}", e)))
}

fn parse_id(id: &str) -> Result<Uuid, JsValue> {
    Uuid::parse_str(id).map_err(|_| JsValue::from_str("Invalid user id"))
}

fn parse_action(action: &str) -> Result<UserAction, JsValue> {
    match action {
        "list" => Ok(UserAction::List),
        "create" => Ok(UserAction::Create),
        "read" => Ok(UserAction::Read),
        "update" => Ok(UserAction::Update),
        "delete" => Ok(UserAction::Delete),
        other => Err(JsValue::from_str(&format!("Unknown action: {}", other))),
    }
}

/// Whether the roles (as a JSON array of `{name, level, permissions}`)
/// grant `permission`
#[wasm_bindgen]
pub fn has_permission(roles_json: &str, permission: &str) -> Result<bool, JsValue> {
    let roles = parse_roles(roles_json)?;
    Ok(holds(&resolve_permissions(&roles), permission))
}

#[wasm_bindgen]
pub fn user_level(roles_json: &str) -> Result<i32, JsValue> {
    Ok(highest_level(&parse_roles(roles_json)?))
}

#[wasm_bindgen]
pub fn meets_level(roles_json: &str, required: i32) -> Result<bool, JsValue> {
    let roles = parse_roles(roles_json)?;
    Ok(evaluate_guards(&[Guard::MinLevel(required)], &roles, &resolve_permissions(&roles)).is_ok())
}

/// Effective permissions, sorted
#[wasm_bindgen]
pub fn resolve_permission_list(roles_json: &str) -> Result<Array, JsValue> {
    let roles = parse_roles(roles_json)?;
    Ok(resolve_permissions(&roles)
        .iter()
        .map(JsValue::from_str)
        .collect())
}

/// User-management tier name: "admin", "officer" or "self_only"
#[wasm_bindgen]
pub fn access_tier(roles_json: &str) -> Result<String, JsValue> {
    Ok(tier_name(UserAccessTier::for_roles(&parse_roles(roles_json)?)).to_string())
}

fn tier_name(tier: UserAccessTier) -> &'static str {
    match tier {
        UserAccessTier::Admin => "admin",
        UserAccessTier::Officer => "officer",
        UserAccessTier::SelfOnly => "self_only",
    }
}

/// Decide a user-management action against a target record.
///
/// Returns `None` when allowed, otherwise the refusal message the server
/// would send.
#[wasm_bindgen]
pub fn can_manage_user(
    roles_json: &str,
    action: &str,
    requester_id: &str,
    target_id: &str,
    target_roles_json: &str,
) -> Result<Option<String>, JsValue> {
    let tier = UserAccessTier::for_roles(&parse_roles(roles_json)?);
    let action = parse_action(action)?;
    let target_roles = parse_role_names(target_roles_json)?;
    let decision = tier.authorize_target(
        action,
        parse_id(requester_id)?,
        parse_id(target_id)?,
        &target_roles,
    );
    Ok(decision.err().map(|denial| denial.to_string()))
}

/// Role names (JSON array such as `["firefighter"]`) the tier may not assign
#[wasm_bindgen]
pub fn can_assign_roles(roles_json: &str, requested_json: &str) -> Result<bool, JsValue> {
    let tier = UserAccessTier::for_roles(&parse_roles(roles_json)?);
    Ok(tier
        .authorize_role_assignment(&parse_role_names(requested_json)?)
        .is_ok())
}

/// Whether an account with these role names may sign in at `portal`
/// ("staff" or "civilian")
#[wasm_bindgen]
pub fn portal_admits(portal: &str, role_names_json: &str) -> Result<bool, JsValue> {
    let portal = match portal {
        "staff" => Portal::Staff,
        "civilian" => Portal::Civilian,
        other => return Err(JsValue::from_str(&format!("Unknown portal: {}", other))),
    };
    Ok(portal.admits(&parse_role_names(role_names_json)?).is_ok())
}

/// Form check mirroring the server's password rule; empty string when valid
#[wasm_bindgen]
pub fn check_password(password: &str) -> String {
    validate_password(password).err().unwrap_or_default().to_string()
}

#[wasm_bindgen]
pub fn check_plate_number(plate: &str) -> String {
    validate_plate_number(&plate.trim().to_uppercase())
        .err()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFIGHTER: &str =
        r#"[{"name":"firefighter","level":40,"permissions":["inventory_view","training_attend"]}]"#;
    const OFFICER: &str = r#"[{"name":"1st_class_officer","level":70,"permissions":["user_management"]}]"#;
    const ADMIN: &str = r#"[{"name":"admin","level":100,"permissions":["all_access"]}]"#;

    #[test]
    fn test_permission_checks() {
        assert_eq!(has_permission(FIREFIGHTER, "inventory_view"), Ok(true));
        assert_eq!(has_permission(FIREFIGHTER, "inventory_management"), Ok(false));
        assert_eq!(has_permission(ADMIN, "anything"), Ok(true));
    }

    #[test]
    fn test_levels() {
        assert_eq!(user_level(FIREFIGHTER), Ok(40));
        assert_eq!(user_level("[]"), Ok(0));
        assert_eq!(meets_level(FIREFIGHTER, 20), Ok(true));
        assert_eq!(meets_level(FIREFIGHTER, 60), Ok(false));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(access_tier(ADMIN).as_deref(), Ok("admin"));
        assert_eq!(access_tier(OFFICER).as_deref(), Ok("officer"));
        assert_eq!(access_tier(FIREFIGHTER).as_deref(), Ok("self_only"));
    }

    #[test]
    fn test_officer_user_management() {
        let me = Uuid::new_v4().to_string();
        let other = Uuid::new_v4().to_string();
        assert_eq!(
            can_manage_user(OFFICER, "update", &me, &other, r#"["firefighter"]"#),
            Ok(None)
        );
        assert!(matches!(
            can_manage_user(OFFICER, "update", &me, &other, r#"["admin"]"#),
            Ok(Some(_))
        ));
        assert_eq!(
            can_manage_user(OFFICER, "delete", &me, &me, "[]"),
            Ok(Some("You cannot delete your own account".to_string()))
        );
        assert_eq!(can_assign_roles(OFFICER, r#"["cfo"]"#), Ok(false));
        assert_eq!(can_assign_roles(ADMIN, r#"["cfo"]"#), Ok(true));
    }

    #[test]
    fn test_portals() {
        assert_eq!(portal_admits("civilian", r#"["civilian"]"#), Ok(true));
        assert_eq!(portal_admits("staff", r#"["civilian"]"#), Ok(false));
        assert_eq!(portal_admits("staff", r#"["volunteer"]"#), Ok(true));
    }

    #[test]
    fn test_form_checks() {
        assert_eq!(check_password("Engine12go"), "");
        assert!(!check_password("short").is_empty());
        assert_eq!(check_plate_number(" e-12 "), "");
        assert!(!check_plate_number("E 12").is_empty());
    }
}

/// Paths that build `JsValue`s, which only work inside a wasm runtime
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    const OFFICER: &str = r#"[{"name":"1st_class_officer","level":70,"permissions":["user_management","view_logs"]}]"#;

    #[wasm_bindgen_test]
    fn resolves_sorted_permission_list() {
        let list = resolve_permission_list(OFFICER).expect("list");
        let names: Vec<String> = list.iter().filter_map(|v| v.as_string()).collect();
        assert_eq!(names, vec!["user_management", "view_logs"]);
    }

    #[wasm_bindgen_test]
    fn malformed_roles_are_reported() {
        let err = has_permission("{not json", "view_logs").unwrap_err();
        assert!(err.as_string().unwrap_or_default().starts_with("Invalid roles JSON"));
    }

    #[wasm_bindgen_test]
    fn unknown_inputs_are_reported() {
        let id = Uuid::new_v4().to_string();
        let err = can_manage_user(OFFICER, "promote", &id, &id, "[]").unwrap_err();
        assert_eq!(err.as_string().as_deref(), Some("Unknown action: promote"));

        let err = can_manage_user(OFFICER, "read", "not-a-uuid", &id, "[]").unwrap_err();
        assert_eq!(err.as_string().as_deref(), Some("Invalid user id"));

        let err = portal_admits("kiosk", "[]").unwrap_err();
        assert_eq!(err.as_string().as_deref(), Some("Unknown portal: kiosk"));
    }
}

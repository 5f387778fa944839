//! Validation utilities for the Fire Department Administration Platform

use chrono::{DateTime, Utc};

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength: at least 8 characters with a letter and a digit
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_alphabetic()) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err("Password must contain at least one letter and one digit");
    }
    Ok(())
}

/// Validate a phone number: optional leading `+`, 10 to 15 digits, spaces and dashes ignored
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err("Phone number may only contain digits, spaces and dashes");
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(10..=15).contains(&digits) {
        return Err("Phone number must have 10 to 15 digits");
    }
    Ok(())
}

/// Validate a vehicle plate number (2-15 uppercase letters, digits or dashes)
pub fn validate_plate_number(plate: &str) -> Result<(), &'static str> {
    if plate.len() < 2 || plate.len() > 15 {
        return Err("Plate number must be 2 to 15 characters");
    }
    if !plate
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Plate number must be uppercase alphanumeric or dashes");
    }
    Ok(())
}

/// Validate a role level
pub fn validate_role_level(level: i32) -> Result<(), &'static str> {
    if !(0..=100).contains(&level) {
        return Err("Role level must be between 0 and 100");
    }
    Ok(())
}

/// Validate that a scheduled window ends after it starts
pub fn validate_time_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), &'static str> {
    if ends_at <= starts_at {
        return Err("End time must be after start time");
    }
    Ok(())
}

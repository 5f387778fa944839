//! Training and attendance models

use serde::{Deserialize, Serialize};

/// How an attendance record was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceMethod {
    Qr,
    Manual,
}

impl AttendanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceMethod::Qr => "qr",
            AttendanceMethod::Manual => "manual",
        }
    }
}

/// Lifetime bounds for attendance QR tokens, in minutes
pub const QR_TOKEN_MIN_TTL_MINUTES: i64 = 1;
pub const QR_TOKEN_MAX_TTL_MINUTES: i64 = 240;

/// Clamp a requested QR lifetime into the allowed window
pub fn clamp_qr_ttl(requested: Option<i64>, default_minutes: i64) -> i64 {
    requested
        .unwrap_or(default_minutes)
        .clamp(QR_TOKEN_MIN_TTL_MINUTES, QR_TOKEN_MAX_TTL_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_qr_ttl() {
        assert_eq!(clamp_qr_ttl(None, 15), 15);
        assert_eq!(clamp_qr_ttl(Some(0), 15), 1);
        assert_eq!(clamp_qr_ttl(Some(10_000), 15), 240);
    }
}

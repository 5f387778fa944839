//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Standard response envelope: `{ success, message, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success envelope without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Which login flow minted a token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Staff,
    Civilian,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Staff => "staff",
            UserType::Civilian => "civilian",
        }
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 100;

    /// Page size clamped to `1..=MAX_LIMIT`
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.clamp(1, Self::MAX_LIMIT))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }

    pub fn meta(&self, total_items: i64) -> PaginationMeta {
        let limit = self.limit();
        let total_items = total_items.max(0);
        PaginationMeta {
            page: self.page.max(1),
            limit: limit as u32,
            total_items: total_items as u64,
            total_pages: ((total_items + limit - 1) / limit) as u32,
        }
    }
}

/// Paginated response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedData<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset_and_meta() {
        let p = Pagination { page: 3, limit: 10 };
        assert_eq!(p.offset(), 20);
        let meta = p.meta(41);
        assert_eq!(meta.total_pages, 5);
        assert_eq!(meta.total_items, 41);
    }

    #[test]
    fn test_pagination_clamps_limit() {
        let p = Pagination { page: 0, limit: 500 };
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.meta(0).total_pages, 0);
    }

    #[test]
    fn test_message_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
    }
}

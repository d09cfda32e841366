//! Pagination utilities for list endpoints.
//!
//! Supports offset-based (`limit` + `offset`) and page-based (`limit` + `page`)
//! pagination. When `page` is present it takes precedence over `offset`.
//! `limit` is clamped to `[1, 100]` and defaults to 20.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::serde::deserialize_optional_parsed;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Metadata about a paginated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Total number of items across all pages
    pub total: i64,
    /// Maximum items per page (the limit that was applied)
    pub limit: i64,
    /// Number of items skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Current page number (only present if page-based pagination was used)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Whether there are more items after this page
    pub has_more: bool,
}

impl PaginationMeta {
    /// Builds the metadata for a page of `returned` items out of `total`.
    pub fn from_params(params: &PaginationParams, total: i64, returned: usize) -> Self {
        let offset = params.offset();
        Self {
            total,
            limit: params.limit(),
            offset: Some(offset),
            page: params.page(),
            has_more: offset + (returned as i64) < total,
        }
    }
}

/// Query parameters for pagination.
#[derive(Debug, Clone, Hash, Deserialize, ToSchema)]
pub struct PaginationParams {
    /// Maximum number of items to return (1-100, default: 20)
    #[serde(default, deserialize_with = "deserialize_optional_parsed")]
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0, ignored if `page` is set)
    #[serde(default, deserialize_with = "deserialize_optional_parsed")]
    pub offset: Option<i64>,
    /// Page number (1-indexed)
    #[serde(default, deserialize_with = "deserialize_optional_parsed")]
    pub page: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            offset: Some(0),
            page: None,
        }
    }
}

impl PaginationParams {
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        if let Some(page) = self.page {
            (page.max(1) - 1) * self.limit()
        } else {
            self.offset.unwrap_or(0).max(0)
        }
    }

    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page.map(|p| p.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.limit(), DEFAULT_LIMIT);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.page(), None);
    }

    #[test]
    fn test_limit_is_clamped() {
        for (input, expected) in [(Some(0), 1), (Some(-4), 1), (Some(250), 100), (Some(35), 35)] {
            let params = PaginationParams {
                limit: input,
                offset: None,
                page: None,
            };
            assert_eq!(params.limit(), expected);
        }
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let params = PaginationParams {
            limit: Some(10),
            offset: Some(7),
            page: Some(3),
        };
        assert_eq!(params.offset(), 20);
        assert_eq!(params.page(), Some(3));
    }

    #[test]
    fn test_negative_offset_is_zero() {
        let params = PaginationParams {
            limit: None,
            offset: Some(-5),
            page: None,
        };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_deserialize_from_query_strings() {
        let params: PaginationParams =
            serde_json::from_str(r#"{"limit":"25","offset":"","page":"2"}"#).unwrap();
        assert_eq!(params.limit(), 25);
        assert_eq!(params.offset(), 25);
    }

    #[test]
    fn test_meta_has_more() {
        let params = PaginationParams {
            limit: Some(10),
            offset: Some(0),
            page: None,
        };
        assert!(PaginationMeta::from_params(&params, 15, 10).has_more);
        assert!(!PaginationMeta::from_params(&params, 10, 10).has_more);
    }
}

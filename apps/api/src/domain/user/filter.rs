use serde::{Deserialize, Serialize};

use super::user::UserView;
use super::value_objects::{UserRole, UserStatus};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter and pagination for listing users
///
/// Name and email match as case-insensitive substrings; phone, status and
/// role match exactly. Field order is the serialization order, which the
/// filtered-query cache key relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
    pub role: Option<UserRole>,
    pub page: u32,
    pub size: u32,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            name: None,
            email: None,
            phone: None,
            status: None,
            role: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl UserFilter {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            ..Default::default()
        }
    }

    /// Canonical form: trimmed text, blank text dropped, name and email
    /// lowercased (they match case-insensitively anyway)
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>, lowercase: bool) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| if lowercase { v.to_lowercase() } else { v.to_string() })
        }

        Self {
            name: clean(&self.name, true),
            email: clean(&self.email, true),
            phone: clean(&self.phone, false),
            status: self.status,
            role: self.role,
            page: self.page,
            size: self.size,
        }
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }

    /// Checks the page bounds the boundary is expected to enforce
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be at least 1".to_string());
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(format!("size must be between 1 and {}", MAX_PAGE_SIZE));
        }
        Ok(())
    }
}

/// Pagination metadata returned with each page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u64,
    pub has_more: bool,
}

impl PageMeta {
    pub fn new(total: u64, page: u32, size: u32) -> Self {
        let size_wide = u64::from(size.max(1));
        Self {
            total,
            page,
            size,
            total_pages: total.div_ceil(size_wide),
            has_more: u64::from(page) * size_wide < total,
        }
    }
}

/// One page of users, cached verbatim under the filtered-query key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedUsers {
    pub data: Vec<UserView>,
    pub meta: PageMeta,
}

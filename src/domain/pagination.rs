//! Page-based pagination shared by list operations.
//!
//! Pages are 1-indexed and `totalPages = ceil(total / limit)`.

use serde::Serialize;

use crate::errors::{PasswordPalError, Result};

/// Largest page size any list operation will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Validate raw query values, applying `default_limit` when no limit is given.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Result<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);

        if page == 0 {
            return Err(PasswordPalError::validation_field("Page must be at least 1", "page"));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(PasswordPalError::validation_field(
                format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
                "limit",
            ));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

/// One page of results plus the totals a client needs to page further
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, request: PageRequest) -> Self {
        let limit = i64::from(request.limit);
        let total_pages = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        Self { data, total, page: request.page, limit: request.limit, total_pages }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let request = PageRequest::new(None, None, 20).unwrap();
        assert_eq!(request, PageRequest { page: 1, limit: 20 });
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn offset_is_zero_based() {
        let request = PageRequest::new(Some(3), Some(10), 50).unwrap();
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(PageRequest::new(Some(0), None, 20).is_err());
        assert!(PageRequest::new(None, Some(0), 20).is_err());
        assert!(PageRequest::new(None, Some(MAX_PAGE_SIZE + 1), 20).is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest::new(Some(1), Some(10), 10).unwrap();
        assert_eq!(Page::new(Vec::<u8>::new(), 0, request).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), 10, request).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), 11, request).total_pages, 2);
    }

    #[test]
    fn serializes_total_pages_in_camel_case() {
        let request = PageRequest::new(Some(2), Some(1), 10).unwrap();
        let json = serde_json::to_value(Page::new(vec!["a"], 3, request)).unwrap();
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["page"], 2);
        assert_eq!(json["data"][0], "a");
    }
}

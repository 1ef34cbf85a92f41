//! Shared pagination query for list endpoints.

use serde::Deserialize;

use crate::api::error::ApiError;
use crate::domain::PageRequest;

/// `?page&limit`; both optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationQuery {
    pub fn into_page_request(self, default_limit: u32) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(self.page, self.limit, default_limit)?)
    }
}

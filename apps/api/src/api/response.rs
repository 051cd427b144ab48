use serde::Serialize;

use crate::domain::user::{PageMeta, PaginatedUsers, UserView};

/// Success envelope: `{"data": ..., "meta": ...}`
///
/// `meta` is `null` for anything that is not a page.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: Option<PageMeta>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data, meta: None }
    }
}

impl From<PaginatedUsers> for ApiResponse<Vec<UserView>> {
    fn from(page: PaginatedUsers) -> Self {
        Self {
            data: page.data,
            meta: Some(page.meta),
        }
    }
}

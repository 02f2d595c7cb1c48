//! Paging and sorting shared by every list endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::util::page::{new_page, paged_items, Pagination};
use crate::core::util::sort::{sort_by_path_keyed, FieldNameMapper, SortError, SortValue, SortableByPath};

/// `?page=2&pageSize=20&sortOption.field=metadata.name&sortOption.asc=true`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    #[serde(default)]
    pub page: i32,
    #[serde(default)]
    pub page_size: i32,
    #[serde(default, rename = "sortOption.field")]
    pub sort_field: String,
    #[serde(default, rename = "sortOption.asc")]
    pub sort_asc: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ListResponse<T> {
    /// Page `items` without sorting; the pagination total is the length of `items`.
    pub fn paged(items: Vec<T>, page: i32, page_size: i32) -> Self {
        let pagination = new_page(page, page_size, items.len());
        Self {
            items: paged_items(items, page, page_size),
            pagination,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResponse<U> {
        ListResponse {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

impl ListOptions {
    /// Sort then page. `items` must already be filtered.
    pub fn apply<T: SortableByPath>(&self, items: Vec<T>, mapper: &FieldNameMapper) -> Result<ListResponse<T>, SortError> {
        self.apply_keyed(items, mapper, |_, _, value| value)
    }

    /// Like [`ListOptions::apply`] with `key_of` free to replace an item's sort value.
    pub fn apply_keyed<T, F>(&self, items: Vec<T>, mapper: &FieldNameMapper, key_of: F) -> Result<ListResponse<T>, SortError>
    where
        T: SortableByPath,
        F: Fn(&T, &[String], SortValue) -> SortValue,
    {
        let sorted = sort_by_path_keyed(items, &self.sort_field, self.sort_asc, mapper, key_of)?;
        Ok(ListResponse::paged(sorted, self.page, self.page_size))
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use heck::ToSnakeCase;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub start_item: u64,
    pub end_item: u64,
}

impl PageMeta {
    /// Derive the full metadata from page number, page size and total.
    pub fn compute(page: u32, limit: u32, total: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total_pages = u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);
        let first = u64::from(page - 1) * u64::from(limit);
        let (start_item, end_item) = if total == 0 || first >= total {
            (0, 0)
        } else {
            (first + 1, (first + u64::from(limit)).min(total))
        };

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
            start_item,
            end_item,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode a camelCased list response.
    ///
    /// Accepts a bare array or an object carrying the rows under `data` or
    /// `items`, plus optional `pagination` (or `meta`) and `total` fields.
    /// Missing metadata is computed from `query`.
    pub fn from_response(value: Value, query: &ListQuery) -> Result<Self, ApiError> {
        let (rows, meta, total) = match value {
            Value::Array(rows) => (rows, None, None),
            Value::Object(mut body) => {
                let rows = match body.remove("data").or_else(|| body.remove("items")) {
                    Some(Value::Array(rows)) => rows,
                    Some(other) => {
                        return Err(ApiError::Decode(format!(
                            "list rows must be an array, got {other}"
                        )))
                    }
                    None => return Err(ApiError::Decode("list response has no rows".into())),
                };
                let meta = body.remove("pagination").or_else(|| body.remove("meta"));
                let total = body.get("total").and_then(Value::as_u64);
                (rows, meta, total)
            }
            other => {
                return Err(ApiError::Decode(format!(
                    "unexpected list response: {other}"
                )))
            }
        };

        let items = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|err| ApiError::Decode(format!("list row: {err}")))?;

        let pagination = match meta {
            Some(meta) => serde_json::from_value(meta)
                .map_err(|err| ApiError::Decode(format!("pagination: {err}")))?,
            None => PageMeta::compute(
                query.page(),
                query.limit(),
                total.unwrap_or(items.len() as u64),
            ),
        };

        Ok(Self { items, pagination })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Listing parameters, sent as a snake_case query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    /// Field to sort by, in camelCase.
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = Some(order);
        self
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page().to_string()),
            ("limit".to_string(), self.limit().to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search".to_string(), search.trim().to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort_by".to_string(), sort.to_snake_case()));
            let order = match self.order.unwrap_or(SortOrder::Asc) {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            pairs.push(("sort_order".to_string(), order.to_string()));
        }
        pairs
    }
}

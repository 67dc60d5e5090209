//! REST plumbing: the HTTP client, key-case conversion, pagination and the
//! per-collection services.

pub mod case;
mod client;
pub mod models;
mod pagination;
mod services;

pub use client::{error_message, ApiClient};
pub use pagination::{ListQuery, Page, PageMeta, SortOrder, DEFAULT_PAGE_SIZE};
pub use services::{Resource, ResourceService, Services};

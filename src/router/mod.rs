//! Client-side routing on the URL hash.
//!
//! Patterns are made of literal text and `:name` placeholders, each matching
//! a single path segment; `*` registers a fallback. The browsing environment
//! is abstracted by [`History`], with [`MemoryHistory`] for hosts that keep
//! navigation state in-process.

mod history;
mod pattern;
mod router;

pub use history::{normalize_path, History, MemoryHistory};
pub use pattern::{PathPattern, RouteParams};
pub use router::{
    Dispatch, RouteFailure, RouteHandler, Router, RouterState, WeakRouter, WILDCARD,
};

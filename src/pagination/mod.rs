//! Pagination module
//!
//! Supports: next-page token (cursor, page number or next URL found in the
//! body) and a plain page counter.
//!
//! # Overview
//!
//! The [`PaginationWalker`] extracts items from each page, finds the token
//! for the next one and asks a [`PageFetcher`] for it. Fetch failures end
//! the walk early; the walker itself never fails.

mod types;
mod walker;

pub use types::{NextPage, PageFetcher, PageToken, PaginationState};
pub use walker::{normalize_items, PaginationWalker};

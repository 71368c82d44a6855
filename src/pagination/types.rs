//! Pagination types and traits

use crate::error::Result;
use crate::types::{JsonValue, ValueMap};
use async_trait::async_trait;

/// Token identifying the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// Opaque cursor or next-page URL
    Str(String),
    /// Page number or offset
    Int(i64),
}

impl PageToken {
    /// Accept only string and integer tokens
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(PageToken::Str(s.clone())),
            JsonValue::Number(n) => n.as_i64().map(PageToken::Int),
            _ => None,
        }
    }

    /// Empty strings and zero end pagination
    pub fn is_terminal(&self) -> bool {
        match self {
            PageToken::Str(s) => s.is_empty(),
            PageToken::Int(n) => *n == 0,
        }
    }

    /// Query parameter value for the next request
    pub fn to_value(&self) -> JsonValue {
        match self {
            PageToken::Str(s) => JsonValue::String(s.clone()),
            PageToken::Int(n) => JsonValue::from(*n),
        }
    }
}

impl std::fmt::Display for PageToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageToken::Str(s) => f.write_str(s),
            PageToken::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Request another page with this token
    Continue(PageToken),
    /// No more pages
    Done,
}

/// Progress through a paged resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Pages fetched so far, including the first
    pub pages_fetched: u32,
    /// Items collected so far
    pub items_fetched: usize,
    /// Page counter (page-counter mode)
    pub page: u32,
}

impl PaginationState {
    /// State after the first page has been received
    pub fn after_first_page(items: usize) -> Self {
        Self {
            pages_fetched: 1,
            items_fetched: items,
            page: 1,
        }
    }

    /// Record a fetched page
    pub fn add_page(&mut self, items: usize) {
        self.pages_fetched += 1;
        self.items_fetched += items;
    }
}

/// Fetches one more page given the full call parameters
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issue the page request and return the decoded body
    async fn fetch_page(&self, params: ValueMap) -> Result<JsonValue>;
}

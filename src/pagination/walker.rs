//! Pagination walker
//!
//! Follows a paged resource to completion, either by a next-page token
//! found in each body or, when no token path is configured, by counting
//! pages up to `max_pages`.

use super::types::{NextPage, PageFetcher, PageToken, PaginationState};
use crate::config::PaginationSpec;
use crate::types::{into_mapping, walk_path, JsonObject, JsonValue, ValueMap};
use tracing::{debug, error, warn};

/// Walks the pages of one endpoint
#[derive(Debug, Clone)]
pub struct PaginationWalker<'a> {
    spec: &'a PaginationSpec,
    endpoint: &'a str,
}

impl<'a> PaginationWalker<'a> {
    /// Create a walker for an endpoint's pagination rules
    pub fn new(spec: &'a PaginationSpec, endpoint: &'a str) -> Self {
        Self { spec, endpoint }
    }

    /// Items in a page body, normalized to mappings.
    ///
    /// Returns `None` when the data path is configured but missing.
    pub fn extract_items(&self, body: &JsonValue) -> Option<Vec<JsonObject>> {
        let items = match self.spec.data_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => walk_path(body, path)?,
            None => body,
        };
        Some(normalize_items(items.clone()))
    }

    /// Token for the page after `body`
    pub fn extract_next_token(&self, body: &JsonValue) -> Option<PageToken> {
        let path = self.spec.next_page_path.as_deref().filter(|p| !p.is_empty())?;
        walk_path(body, path)
            .and_then(PageToken::from_value)
            .filter(|token| !token.is_terminal())
    }

    /// Decide what to request after a page
    pub fn next_page(
        &self,
        body: &JsonValue,
        page_items: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        if self.spec.next_page_path.is_some() {
            return self
                .extract_next_token(body)
                .map_or(NextPage::Done, NextPage::Continue);
        }

        if page_items == 0 {
            return NextPage::Done;
        }
        state.page += 1;
        if state.page > self.spec.max_pages {
            return NextPage::Done;
        }
        NextPage::Continue(PageToken::Int(i64::from(state.page)))
    }

    /// Collect every item across all pages.
    ///
    /// Never fails: a page that cannot be fetched ends the walk and the
    /// items gathered so far are returned.
    pub async fn walk(
        &self,
        initial: JsonValue,
        params: Option<&ValueMap>,
        fetcher: &dyn PageFetcher,
    ) -> Vec<JsonObject> {
        if !initial.is_object() {
            return normalize_items(initial);
        }

        let Some(mut all_items) = self.extract_items(&initial) else {
            warn!(
                endpoint = %self.endpoint,
                data_path = ?self.spec.data_path,
                "Data path not found in response"
            );
            return vec![into_mapping(initial)];
        };

        let mut state = PaginationState::after_first_page(all_items.len());
        let mut next = self.next_page(&initial, all_items.len(), &mut state);

        while let NextPage::Continue(token) = next {
            let mut page_params = params.cloned().unwrap_or_default();
            page_params.insert(self.spec.page_param.clone(), token.to_value());
            debug!(endpoint = %self.endpoint, page = %token, "Fetching next page");

            let body = match fetcher.fetch_page(page_params).await {
                Ok(body) => body,
                Err(e) => {
                    error!(
                        endpoint = %self.endpoint,
                        page = %token,
                        error = %e,
                        "Error fetching page"
                    );
                    break;
                }
            };

            let page_items = self.extract_items(&body).unwrap_or_default();
            let count = page_items.len();
            state.add_page(count);
            all_items.extend(page_items);
            next = self.next_page(&body, count, &mut state);
        }

        debug!(
            endpoint = %self.endpoint,
            pages = state.pages_fetched,
            items = state.items_fetched,
            "Pagination complete"
        );
        all_items
    }
}

/// Normalize a list (or single value) into mappings; scalars become `{value: x}`
pub fn normalize_items(items: JsonValue) -> Vec<JsonObject> {
    match items {
        JsonValue::Array(list) => list.into_iter().map(into_mapping).collect(),
        other => vec![into_mapping(other)],
    }
}

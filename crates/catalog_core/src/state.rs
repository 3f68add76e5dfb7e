use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{AggregationFilter, ContentKind, DisplayType, Sort},
    protocol::{Aggregation, CatalogFlags, ContentItem, SearchMeta, SearchRequest, SearchResult},
};

pub const DEFAULT_PAGE: u32 = 1;

/// Snapshot of everything the catalog UI renders from.
///
/// The first block of fields is the search-relevant subset that feeds
/// [`SearchRequest`] and the URL; the rest is copied back from the latest result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDriverState {
    pub search_term: String,
    pub page: u32,
    pub token: Option<String>,
    pub token_label: Option<String>,
    pub sort: Option<Sort>,
    pub display_type: DisplayType,
    pub content_types: BTreeSet<ContentKind>,
    pub aggregation_filters: Vec<AggregationFilter>,
    pub is_curated: bool,

    pub content_items: Vec<ContentItem>,
    pub total: u64,
    pub has_more: bool,
    /// Whether the server answered from a curated list. The requested
    /// `is_curated` above is only ever changed by the caller.
    pub results_curated: bool,
    pub aggregations: Vec<Aggregation>,
    pub available_content_types: Vec<ContentKind>,
    pub selected_sort: Option<String>,
    pub results_display_type: Option<DisplayType>,
    pub flags: CatalogFlags,
}

impl Default for CatalogDriverState {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            page: DEFAULT_PAGE,
            token: None,
            token_label: None,
            sort: None,
            display_type: DisplayType::default(),
            content_types: BTreeSet::new(),
            aggregation_filters: Vec::new(),
            is_curated: false,
            content_items: Vec::new(),
            total: 0,
            has_more: false,
            results_curated: false,
            aggregations: Vec::new(),
            available_content_types: Vec::new(),
            selected_sort: None,
            results_display_type: None,
            flags: CatalogFlags::default(),
        }
    }
}

impl CatalogDriverState {
    pub fn to_request(&self) -> SearchRequest {
        SearchRequest {
            search_term: self.search_term.clone(),
            page: self.page,
            token: self.token.clone(),
            sort: self.sort,
            display_type: self.display_type,
            content_types: self.content_types.iter().copied().collect(),
            aggregation_filters: self.aggregation_filters.clone(),
            is_curated: self.is_curated,
        }
    }

    /// Copies result metadata in verbatim. Of the request fields only
    /// `token_label` is written, and only when the result carries one.
    pub fn merge_result(&mut self, result: SearchResult) {
        let SearchResult {
            content_items,
            meta,
        } = result;
        let SearchMeta {
            total,
            has_more,
            token_label,
            is_curated,
            aggregations,
            content_types,
            selected_sort,
            results_display_type,
            flags,
        } = meta;

        if token_label.is_some() {
            self.token_label = token_label;
        }
        self.content_items = content_items;
        self.total = total;
        self.has_more = has_more;
        self.results_curated = is_curated;
        self.aggregations = aggregations;
        self.available_content_types = content_types;
        self.selected_sort = selected_sort;
        self.results_display_type = results_display_type;
        self.flags = flags;
    }

    /// Paging continues from the cursor the last result handed back.
    pub(crate) fn adopt_returned_cursor(&mut self) {
        if let Some(cursor) = &self.token_label {
            self.token = Some(cursor.clone());
        }
    }

    pub(crate) fn reset_page(&mut self) {
        self.page = DEFAULT_PAGE;
    }

    /// Leaves curated mode's inherited request fields at their defaults.
    pub(crate) fn reset_for_curated_filter(&mut self) {
        let defaults = Self::default();
        self.content_types = defaults.content_types;
        self.search_term = defaults.search_term;
        self.token = defaults.token;
        self.token_label = defaults.token_label;
        self.page = defaults.page;
    }
}

/// Caller-supplied overrides applied on top of [`CatalogDriverState::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitialState {
    pub search_term: Option<String>,
    pub page: Option<u32>,
    pub token: Option<String>,
    pub token_label: Option<String>,
    pub sort: Option<Sort>,
    pub display_type: Option<DisplayType>,
    pub content_types: Option<Vec<ContentKind>>,
    pub aggregation_filters: Option<Vec<AggregationFilter>>,
    pub is_curated: Option<bool>,
}

impl InitialState {
    pub fn apply_to(self, state: &mut CatalogDriverState) {
        if let Some(search_term) = self.search_term {
            state.search_term = search_term;
        }
        // Zero is not a page; keep whatever was there.
        if let Some(page) = self.page.filter(|page| *page >= DEFAULT_PAGE) {
            state.page = page;
        }
        if let Some(token) = self.token {
            state.token = Some(token);
        }
        if let Some(token_label) = self.token_label {
            state.token_label = Some(token_label);
        }
        if let Some(sort) = self.sort {
            state.sort = Some(sort);
        }
        if let Some(display_type) = self.display_type {
            state.display_type = display_type;
        }
        if let Some(content_types) = self.content_types {
            state.content_types = content_types.into_iter().collect();
        }
        if let Some(aggregation_filters) = self.aggregation_filters {
            state.aggregation_filters = aggregation_filters;
        }
        if let Some(is_curated) = self.is_curated {
            state.is_curated = is_curated;
        }
    }

    pub fn into_state(self) -> CatalogDriverState {
        let mut state = CatalogDriverState::default();
        self.apply_to(&mut state);
        state
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;

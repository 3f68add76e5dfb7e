//! Reflects the search-relevant part of [`CatalogDriverState`] into URL query
//! parameters, and restores it from them.
//!
//! Parameters are written in a fixed order and, apart from `page`, only when
//! they differ from the default, so decoding a URL this module produced and
//! encoding it again yields the same query string. `page` is always written:
//! a URL that carries any catalog parameter describes the whole search, and
//! fields it omits are at their defaults. Parameters that do not belong to the
//! catalog are kept.

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use shared::domain::{AggregationFilter, ContentKind, DisplayType, Sort};
use tracing::warn;
use url::Url;

use crate::state::{CatalogDriverState, InitialState, DEFAULT_PAGE};

pub const QUERY_PARAM: &str = "query";
pub const PAGE_PARAM: &str = "page";
pub const TOKEN_PARAM: &str = "token";
pub const SORT_PARAM: &str = "sort";
pub const DISPLAY_TYPE_PARAM: &str = "display_type";
pub const CONTENT_TYPE_PARAM: &str = "content_type";
pub const FILTER_LABEL_PARAM: &str = "filter_label";
pub const FILTER_VALUE_PARAM: &str = "filter_value";
pub const CURATED_PARAM: &str = "curated";

const CATALOG_PARAMS: &[&str] = &[
    QUERY_PARAM,
    PAGE_PARAM,
    TOKEN_PARAM,
    SORT_PARAM,
    DISPLAY_TYPE_PARAM,
    CONTENT_TYPE_PARAM,
    FILTER_LABEL_PARAM,
    FILTER_VALUE_PARAM,
    CURATED_PARAM,
];

/// Where the driver reads its starting URL from and writes state back to.
pub trait UrlLocation: Send + Sync {
    fn read(&self) -> Option<Url>;
    fn write(&self, url: Url) -> Result<()>;
}

/// In-process location, for hosts without a real address bar and for tests.
#[derive(Debug)]
pub struct MemoryLocation {
    current: Mutex<Url>,
    writes: Mutex<Vec<Url>>,
}

impl MemoryLocation {
    pub fn new(url: Url) -> Self {
        Self {
            current: Mutex::new(url),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self::new(Url::parse(raw)?))
    }

    pub fn current(&self) -> Url {
        lock(&self.current).clone()
    }

    /// Every URL written so far, oldest first.
    pub fn history(&self) -> Vec<Url> {
        lock(&self.writes).clone()
    }
}

impl UrlLocation for MemoryLocation {
    fn read(&self) -> Option<Url> {
        Some(self.current())
    }

    fn write(&self, url: Url) -> Result<()> {
        *lock(&self.current) = url.clone();
        lock(&self.writes).push(url);
        Ok(())
    }
}

fn is_catalog_param(key: &str) -> bool {
    CATALOG_PARAMS.iter().any(|param| *param == key)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Catalog query pairs for `state`, in canonical order.
pub fn encode_params(state: &CatalogDriverState) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !state.search_term.is_empty() {
        params.push((QUERY_PARAM, state.search_term.clone()));
    }
    params.push((PAGE_PARAM, state.page.to_string()));
    if let Some(token) = &state.token {
        params.push((TOKEN_PARAM, token.clone()));
    }
    if let Some(sort) = state.sort {
        params.push((SORT_PARAM, sort.to_string()));
    }
    if state.display_type != DisplayType::default() {
        params.push((DISPLAY_TYPE_PARAM, state.display_type.to_string()));
    }
    for kind in &state.content_types {
        params.push((CONTENT_TYPE_PARAM, kind.to_string()));
    }
    for filter in &state.aggregation_filters {
        params.push((FILTER_LABEL_PARAM, filter.label.clone()));
        params.push((FILTER_VALUE_PARAM, filter.value.clone()));
    }
    if state.is_curated {
        params.push((CURATED_PARAM, "true".to_string()));
    }

    params
}

/// Returns `base` with its catalog parameters replaced by those of `state`.
pub fn encode_url(base: &Url, state: &CatalogDriverState) -> Url {
    let foreign: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| !is_catalog_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let catalog = encode_params(state);

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(&foreign)
        .extend_pairs(&catalog);
    url
}

/// Reads the search `url` describes, or `None` when it carries no catalog
/// parameter at all. Unparseable values are skipped so a hand-edited link
/// still opens the catalog.
pub fn decode_url(url: &Url) -> Option<InitialState> {
    if !url.query_pairs().any(|(key, _)| is_catalog_param(&key)) {
        return None;
    }

    let mut initial = InitialState::default();
    let mut content_types: Vec<ContentKind> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    for (key, value) in url.query_pairs() {
        match &*key {
            QUERY_PARAM => initial.search_term = Some(value.into_owned()),
            PAGE_PARAM => match value.parse::<u32>() {
                Ok(page) if page >= DEFAULT_PAGE => initial.page = Some(page),
                _ => warn!(value = %value, "url_state: ignoring invalid page"),
            },
            TOKEN_PARAM => initial.token = Some(value.into_owned()),
            SORT_PARAM => match value.parse::<Sort>() {
                Ok(sort) => initial.sort = Some(sort),
                Err(err) => warn!(error = %err, "url_state: ignoring invalid sort"),
            },
            DISPLAY_TYPE_PARAM => match value.parse::<DisplayType>() {
                Ok(display_type) => initial.display_type = Some(display_type),
                Err(err) => warn!(error = %err, "url_state: ignoring invalid display type"),
            },
            CONTENT_TYPE_PARAM => match value.parse::<ContentKind>() {
                Ok(kind) => {
                    if !content_types.contains(&kind) {
                        content_types.push(kind);
                    }
                }
                Err(err) => warn!(error = %err, "url_state: ignoring invalid content type"),
            },
            FILTER_LABEL_PARAM => labels.push(value.into_owned()),
            FILTER_VALUE_PARAM => values.push(value.into_owned()),
            CURATED_PARAM => initial.is_curated = Some(value == "true"),
            _ => {}
        }
    }

    if labels.len() != values.len() {
        warn!(
            labels = labels.len(),
            values = values.len(),
            "url_state: unpaired aggregation filter parameters"
        );
    }

    if !content_types.is_empty() {
        initial.content_types = Some(content_types);
    }
    if !labels.is_empty() && !values.is_empty() {
        initial.aggregation_filters = Some(
            labels
                .into_iter()
                .zip(values)
                .map(|(label, value)| AggregationFilter { label, value })
                .collect(),
        );
    }

    Some(initial)
}

#[cfg(test)]
#[path = "tests/url_state_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::domain::{AggregationFilter, ContentKind, DisplayType, Sort};

/// Variables sent with every `CatalogContent` search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub search_term: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    pub display_type: DisplayType,
    pub content_types: Vec<ContentKind>,
    pub aggregation_filters: Vec<AggregationFilter>,
    pub is_curated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub content_items: Vec<ContentItem>,
    pub meta: SearchMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_label: Option<String>,
    #[serde(default)]
    pub is_curated: bool,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    /// Content kinds the catalog offers as type facets.
    #[serde(default)]
    pub content_types: Vec<ContentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_display_type: Option<DisplayType>,
    #[serde(flatten)]
    pub flags: CatalogFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub buckets: Vec<AggregationBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationBucket {
    pub label: Option<String>,
    pub value: String,
    #[serde(default)]
    pub count: u64,
}

impl AggregationBucket {
    /// Filter that selects this bucket; falls back to the value when unlabelled.
    pub fn to_filter(&self) -> AggregationFilter {
        AggregationFilter::new(
            self.label.clone().unwrap_or_else(|| self.value.clone()),
            self.value.clone(),
        )
    }
}

/// Catalog presentation toggles reported by the server. Copied into state as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogFlags {
    pub sort_updated_at_enabled: bool,
    pub sort_created_at_enabled: bool,
    pub sort_title_enabled: bool,
    pub sort_publish_date_enabled: bool,
    pub sort_course_start_date_enabled: bool,
    pub sort_relevance_enabled: bool,
    pub display_type_list_enabled: bool,
    pub display_type_grid_enabled: bool,
    pub display_type_calendar_enabled: bool,
    pub display_start_date_enabled: bool,
    pub display_authors_enabled: bool,
    pub display_description_on_calendar: bool,
    pub content_type_filter_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub kind: Option<ContentKind>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_start_date: Option<String>,
    /// Remaining fields selected by the query, kept untouched for the caller.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

//! `SearchBackend` over the platform's `CatalogContent` GraphQL query.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{
    error::{GraphqlError, SearchException},
    protocol::{SearchRequest, SearchResult},
};
use tracing::debug;

use crate::SearchBackend;

pub const CATALOG_CONTENT_QUERY: &str = r#"query CatalogContent(
  $searchTerm: String
  $page: Int!
  $token: String
  $sort: SortInput
  $displayType: ContentItemDisplayType
  $contentTypes: [ContentKind!]
  $aggregationFilters: [AggregationFilterInput!]
  $isCurated: Boolean
) {
  CatalogContent(
    query: $searchTerm
    page: $page
    token: $token
    sort: $sort
    resultsDisplayType: $displayType
    contentTypes: $contentTypes
    aggregationFilters: $aggregationFilters
    isCurated: $isCurated
  ) {
    contentItems {
      id
      slug
      title
      kind
      isActive
      hasChildren
      courseStartDate
    }
    meta {
      total
      hasMore
      tokenLabel
      isCurated
      contentTypes
      selectedSort
      resultsDisplayType
      aggregations {
        key
        label
        buckets {
          label
          value
          count
        }
      }
      sortUpdatedAtEnabled
      sortCreatedAtEnabled
      sortTitleEnabled
      sortPublishDateEnabled
      sortCourseStartDateEnabled
      sortRelevanceEnabled
      displayTypeListEnabled
      displayTypeGridEnabled
      displayTypeCalendarEnabled
      displayStartDateEnabled
      displayAuthorsEnabled
      displayDescriptionOnCalendar
      contentTypeFilterEnabled
    }
  }
}"#;

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    query: &'a str,
    variables: &'a SearchRequest,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<CatalogContentData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct CatalogContentData {
    #[serde(rename = "CatalogContent")]
    catalog_content: Option<SearchResult>,
}

pub struct GraphqlSearchBackend {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl GraphqlSearchBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            api_token: None,
        }
    }

    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchBackend for GraphqlSearchBackend {
    async fn search(&self, request: SearchRequest) -> Result<SearchResult> {
        let body = GraphqlRequest {
            operation_name: "CatalogContent",
            query: CATALOG_CONTENT_QUERY,
            variables: &request,
        };

        let mut call = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            call = call.bearer_auth(token);
        }

        let response: GraphqlResponse = call
            .send()
            .await
            .with_context(|| format!("failed to reach catalog endpoint {}", self.endpoint))?
            .error_for_status()?
            .json()
            .await
            .context("catalog endpoint returned a malformed GraphQL response")?;

        if let Some(first) = response.errors.into_iter().next() {
            return Err(SearchException::from(first).into());
        }

        let result = response
            .data
            .and_then(|data| data.catalog_content)
            .ok_or_else(|| anyhow!("CatalogContent missing from GraphQL response"))?;
        debug!(
            total = result.meta.total,
            items = result.content_items.len(),
            "graphql: catalog content received"
        );
        Ok(result)
    }
}

#[cfg(test)]
#[path = "tests/graphql_tests.rs"]
mod tests;

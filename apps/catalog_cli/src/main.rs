use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_core::{
    CatalogAction, CatalogActions, CatalogDriver, DriverConfig, DriverError,
    GraphqlSearchBackend, MemoryLocation,
};
use clap::Parser;
use shared::domain::{AggregationFilter, ContentKind, DisplayType, Sort};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Search the content catalog and print the resulting driver state")]
struct Args {
    /// GraphQL endpoint; overrides catalog.toml and the environment.
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    api_token: Option<String>,
    /// Catalog page URL to restore the starting state from.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    sort: Option<Sort>,
    #[arg(long)]
    display_type: Option<DisplayType>,
    #[arg(long = "content-type")]
    content_types: Vec<ContentKind>,
    /// Facet filter as `label=value`; repeatable.
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<AggregationFilter>,
    #[arg(long)]
    page: Option<u32>,
    /// Also print the synchronized catalog URL.
    #[arg(long)]
    print_url: bool,
}

fn parse_filter(raw: &str) -> Result<AggregationFilter, String> {
    match raw.split_once('=') {
        Some((label, value)) if !value.is_empty() => Ok(AggregationFilter::new(label, value)),
        _ => Err(format!("expected label=value, got '{raw}'")),
    }
}

impl Args {
    /// Flags in the order a user would click through the catalog UI.
    fn actions(&self) -> Vec<CatalogAction> {
        let mut actions = Vec::new();
        if let Some(query) = &self.query {
            actions.push(CatalogAction::SetSearchTerm(query.clone()));
        }
        if let Some(sort) = self.sort {
            actions.push(CatalogAction::SetSort(sort));
        }
        if let Some(display_type) = self.display_type {
            actions.push(CatalogAction::SetDisplayType(display_type));
        }
        for kind in &self.content_types {
            actions.push(CatalogAction::AddContentType(*kind));
        }
        for filter in &self.filters {
            actions.push(CatalogAction::AddAggregationFilter(filter.clone()));
        }
        if let Some(page) = self.page {
            actions.push(CatalogAction::SetPage(page));
        }
        actions
    }
}

/// Runs `action` through the driver's bound action methods.
async fn apply(actions: CatalogActions<'_>, action: CatalogAction) -> Result<(), DriverError> {
    match action {
        CatalogAction::SetSearchTerm(term) => actions.set_search_term(term).await,
        CatalogAction::AddAggregationFilter(filter) => actions.add_aggregation_filter(filter).await,
        CatalogAction::RemoveAggregationFilter(filter) => {
            actions.remove_aggregation_filter(filter).await
        }
        CatalogAction::AddContentType(kind) => actions.add_content_type(kind).await,
        CatalogAction::RemoveContentType(kind) => actions.remove_content_type(kind).await,
        CatalogAction::SetSort(sort) => actions.set_sort(sort.field, sort.direction).await,
        CatalogAction::SetDisplayType(display_type) => actions.set_display_type(display_type).await,
        CatalogAction::SetPage(page) => actions.set_page(page).await,
        CatalogAction::NextPage => actions.next_page().await,
        CatalogAction::PrevPage => actions.prev_page().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(api_token) = &args.api_token {
        settings.api_token = Some(api_token.clone());
    }
    if let Some(url) = &args.url {
        settings.base_url = url.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_url = Url::parse(&settings.base_url)
        .with_context(|| format!("invalid catalog url '{}'", settings.base_url))?;
    let location = Arc::new(MemoryLocation::new(base_url));

    let mut backend = GraphqlSearchBackend::new(settings.endpoint.clone());
    if let Some(api_token) = &settings.api_token {
        backend = backend.with_api_token(api_token.clone());
    }
    info!(endpoint = backend.endpoint(), "catalog_cli: starting");

    let actions = args.actions();
    let driver = CatalogDriver::new(
        DriverConfig::new(Arc::new(backend))
            .with_location(location.clone())
            .skip_init(!actions.is_empty()),
    )
    .await
    .context("initial catalog search failed")?;

    for action in actions {
        let name = action.name();
        apply(driver.actions(), action)
            .await
            .with_context(|| format!("catalog action {name} failed"))?;
    }

    println!("{}", serde_json::to_string_pretty(&*driver.state())?);
    if args.print_url {
        println!("{}", location.current());
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{SearchRequest, SearchResult};

mod driver;
pub mod error;
pub mod graphql;
pub mod reducer;
pub mod state;
pub mod url_state;

pub use driver::{CatalogActions, CatalogDriver, DriverConfig, Subscription};
pub use error::DriverError;
pub use graphql::GraphqlSearchBackend;
pub use reducer::CatalogAction;
pub use state::{CatalogDriverState, InitialState, DEFAULT_PAGE};
pub use url_state::{MemoryLocation, UrlLocation};

/// The driver's only network boundary.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchResult>;
}

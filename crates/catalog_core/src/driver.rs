use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, Weak,
};

use shared::{
    domain::{AggregationFilter, ContentKind, DisplayType, Sort, SortDirection, SortField},
    protocol::SearchResult,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::DriverError,
    reducer::{reduce, CatalogAction, Transition},
    state::{CatalogDriverState, InitialState},
    url_state::{decode_url, encode_url, UrlLocation},
    SearchBackend,
};

pub struct DriverConfig {
    pub search: Option<Arc<dyn SearchBackend>>,
    pub initial_state: InitialState,
    pub track_url_state: bool,
    pub skip_init: bool,
    pub location: Option<Arc<dyn UrlLocation>>,
    /// Drop results that resolve after a newer search's result was applied.
    pub discard_stale_results: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            search: None,
            initial_state: InitialState::default(),
            track_url_state: true,
            skip_init: false,
            location: None,
            discard_stale_results: false,
        }
    }
}

impl DriverConfig {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self {
            search: Some(search),
            ..Self::default()
        }
    }

    pub fn with_initial_state(mut self, initial_state: InitialState) -> Self {
        self.initial_state = initial_state;
        self
    }

    pub fn with_location(mut self, location: Arc<dyn UrlLocation>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn track_url_state(mut self, track: bool) -> Self {
        self.track_url_state = track;
        self
    }

    pub fn skip_init(mut self, skip: bool) -> Self {
        self.skip_init = skip;
        self
    }

    pub fn discard_stale_results(mut self, discard: bool) -> Self {
        self.discard_stale_results = discard;
        self
    }
}

type Listener = Arc<dyn Fn(&CatalogDriverState) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

fn lock(registry: &Mutex<ListenerRegistry>) -> MutexGuard<'_, ListenerRegistry> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`CatalogDriver::subscribe`].
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the catalog search state and drives searches from it.
///
/// There is no cancellation: overlapping actions each issue a search, and
/// results are applied in completion order unless
/// [`DriverConfig::discard_stale_results`] is set.
pub struct CatalogDriver {
    search: Arc<dyn SearchBackend>,
    state: watch::Sender<Arc<CatalogDriverState>>,
    listeners: Arc<Mutex<ListenerRegistry>>,
    location: Option<Arc<dyn UrlLocation>>,
    discard_stale_results: bool,
    issued_searches: AtomicU64,
    applied_search: AtomicU64,
    initialized: AtomicBool,
}

impl CatalogDriver {
    /// Builds the driver and, unless `skip_init` is set, runs the first search.
    pub async fn new(config: DriverConfig) -> Result<Self, DriverError> {
        let DriverConfig {
            search,
            initial_state,
            track_url_state,
            skip_init,
            location,
            discard_stale_results,
        } = config;
        let search = search.ok_or(DriverError::MissingSearchBackend)?;

        let location = if track_url_state {
            if location.is_none() {
                debug!("catalog: url tracking enabled without a location; skipping");
            }
            location
        } else {
            None
        };

        // A URL with catalog parameters describes the whole search and
        // replaces `initial_state` rather than layering on top of it.
        let restored = location
            .as_ref()
            .and_then(|location| location.read())
            .and_then(|url| {
                let from_url = decode_url(&url)?;
                debug!(url = %url, "catalog: restoring state from url");
                Some(from_url)
            });
        let state = match restored {
            Some(from_url) => from_url.into_state(),
            None => initial_state.into_state(),
        };

        let (state, _) = watch::channel(Arc::new(state));
        let driver = Self {
            search,
            state,
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            location,
            discard_stale_results,
            issued_searches: AtomicU64::new(0),
            applied_search: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
        };

        if !skip_init {
            driver.init().await?;
        }
        Ok(driver)
    }

    pub fn state(&self) -> Arc<CatalogDriverState> {
        self.state.borrow().clone()
    }

    pub fn actions(&self) -> CatalogActions<'_> {
        CatalogActions { driver: self }
    }

    /// Registers `listener` to run, in registration order, after every state replacement.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CatalogDriverState) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.listeners);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    /// Async view of the same snapshots the listeners receive.
    pub fn watch_state(&self) -> watch::Receiver<Arc<CatalogDriverState>> {
        self.state.subscribe()
    }

    /// Runs the first search against the current state.
    pub async fn init(&self) -> Result<(), DriverError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!("catalog: init called more than once");
        }
        let snapshot = self.state();
        self.publish(&snapshot);
        self.search_and_merge(&snapshot).await
    }

    pub(crate) async fn dispatch(&self, action: CatalogAction) -> Result<(), DriverError> {
        let name = action.name();
        let mut outcome = Ok(None);
        self.state.send_if_modified(|current| match reduce(&**current, action) {
            Ok(Transition::Changed(next)) => {
                let next = Arc::new(next);
                *current = Arc::clone(&next);
                outcome = Ok(Some(next));
                true
            }
            Ok(Transition::Unchanged) => false,
            Err(err) => {
                outcome = Err(err);
                false
            }
        });

        match outcome? {
            Some(snapshot) => {
                debug!(action = name, page = snapshot.page, "catalog: state replaced");
                self.publish(&snapshot);
                self.search_and_merge(&snapshot).await
            }
            None => {
                // Nothing changed; the backend still sees the request, listeners do not.
                debug!(action = name, "catalog: action left state unchanged");
                let snapshot = self.state();
                self.run_search(&snapshot).await.map(|_| ())
            }
        }
    }

    async fn search_and_merge(&self, snapshot: &CatalogDriverState) -> Result<(), DriverError> {
        let (sequence, result) = self.run_search(snapshot).await?;
        self.merge_result(sequence, result);
        Ok(())
    }

    async fn run_search(
        &self,
        snapshot: &CatalogDriverState,
    ) -> Result<(u64, SearchResult), DriverError> {
        let sequence = self.issued_searches.fetch_add(1, Ordering::SeqCst) + 1;
        let request = snapshot.to_request();
        info!(
            sequence,
            page = request.page,
            content_types = request.content_types.len(),
            filters = request.aggregation_filters.len(),
            "catalog: issuing search"
        );
        let result = self
            .search
            .search(request)
            .await
            .map_err(DriverError::search)?;
        debug!(
            sequence,
            total = result.meta.total,
            items = result.content_items.len(),
            "catalog: search resolved"
        );
        Ok((sequence, result))
    }

    fn merge_result(&self, sequence: u64, result: SearchResult) {
        let mut merged = None;
        self.state.send_if_modified(|current| {
            let newest = self.applied_search.fetch_max(sequence, Ordering::SeqCst);
            if self.discard_stale_results && sequence < newest {
                debug!(sequence, newest, "catalog: discarding stale search result");
                return false;
            }
            let mut next = (**current).clone();
            next.merge_result(result);
            if next == **current {
                return false;
            }
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            merged = Some(next);
            true
        });

        if let Some(snapshot) = merged {
            self.publish(&snapshot);
        }
    }

    fn publish(&self, snapshot: &CatalogDriverState) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }

        self.write_url(snapshot);
    }

    fn write_url(&self, snapshot: &CatalogDriverState) {
        let Some(location) = &self.location else {
            return;
        };
        let Some(base) = location.read() else {
            return;
        };
        let url = encode_url(&base, snapshot);
        if url == base {
            return;
        }
        if let Err(err) = location.write(url) {
            warn!(error = %err, "catalog: failed to write state to url");
        }
    }
}

/// Action methods bound to one driver. Each one updates state and searches.
#[derive(Clone, Copy)]
pub struct CatalogActions<'a> {
    driver: &'a CatalogDriver,
}

impl CatalogActions<'_> {
    pub async fn set_search_term(&self, term: impl Into<String>) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::SetSearchTerm(term.into()))
            .await
    }

    pub async fn add_aggregation_filter(&self, filter: AggregationFilter) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::AddAggregationFilter(filter))
            .await
    }

    pub async fn remove_aggregation_filter(
        &self,
        filter: AggregationFilter,
    ) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::RemoveAggregationFilter(filter))
            .await
    }

    pub async fn add_content_type(&self, kind: ContentKind) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::AddContentType(kind))
            .await
    }

    pub async fn remove_content_type(&self, kind: ContentKind) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::RemoveContentType(kind))
            .await
    }

    pub async fn set_sort(
        &self,
        field: SortField,
        direction: SortDirection,
    ) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::SetSort(Sort::new(field, direction)))
            .await
    }

    pub async fn set_display_type(&self, display_type: DisplayType) -> Result<(), DriverError> {
        self.driver
            .dispatch(CatalogAction::SetDisplayType(display_type))
            .await
    }

    pub async fn set_page(&self, page: u32) -> Result<(), DriverError> {
        self.driver.dispatch(CatalogAction::SetPage(page)).await
    }

    pub async fn next_page(&self) -> Result<(), DriverError> {
        self.driver.dispatch(CatalogAction::NextPage).await
    }

    pub async fn prev_page(&self) -> Result<(), DriverError> {
        self.driver.dispatch(CatalogAction::PrevPage).await
    }
}

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod tests;

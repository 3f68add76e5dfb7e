use super::*;
use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{ContentKind, DisplayType, SortDirection, SortField},
    protocol::{
        Aggregation, AggregationBucket, CatalogFlags, ContentItem, SearchMeta, SearchRequest,
    },
};
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use crate::{state::DEFAULT_PAGE, url_state::MemoryLocation};

enum Reply {
    Result(SearchResult),
    Fail(String),
    Gate(oneshot::Receiver<SearchResult>),
}

struct RecordingBackend {
    requests: AsyncMutex<Vec<SearchRequest>>,
    replies: AsyncMutex<VecDeque<Reply>>,
    fallback: SearchResult,
}

impl RecordingBackend {
    fn new() -> Arc<Self> {
        Self::with_fallback(mock_search_result(None, false))
    }

    fn with_fallback(fallback: SearchResult) -> Arc<Self> {
        Arc::new(Self {
            requests: AsyncMutex::new(Vec::new()),
            replies: AsyncMutex::new(VecDeque::new()),
            fallback,
        })
    }

    async fn push(&self, reply: Reply) {
        self.replies.lock().await.push_back(reply);
    }

    async fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().await.clone()
    }

    async fn last_request(&self) -> SearchRequest {
        self.requests
            .lock()
            .await
            .last()
            .cloned()
            .expect("at least one search")
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn search(&self, request: SearchRequest) -> anyhow::Result<SearchResult> {
        self.requests.lock().await.push(request);
        let reply = self.replies.lock().await.pop_front();
        match reply {
            None => Ok(self.fallback.clone()),
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::Fail(message)) => Err(anyhow!(message)),
            Some(Reply::Gate(gate)) => gate.await.map_err(|_| anyhow!("gate dropped")),
        }
    }
}

fn all_flags() -> CatalogFlags {
    CatalogFlags {
        sort_updated_at_enabled: true,
        sort_created_at_enabled: true,
        sort_title_enabled: true,
        sort_publish_date_enabled: true,
        sort_course_start_date_enabled: true,
        sort_relevance_enabled: true,
        display_type_list_enabled: true,
        display_type_grid_enabled: true,
        display_type_calendar_enabled: true,
        display_start_date_enabled: true,
        display_authors_enabled: true,
        display_description_on_calendar: true,
        content_type_filter_enabled: true,
    }
}

fn mock_search_result(token_label: Option<&str>, is_curated: bool) -> SearchResult {
    SearchResult {
        content_items: vec![ContentItem {
            id: "test-id".into(),
            slug: Some("test-slug".into()),
            is_active: true,
            ..ContentItem::default()
        }],
        meta: SearchMeta {
            total: 1000,
            has_more: true,
            token_label: token_label.map(str::to_string),
            is_curated,
            aggregations: vec![Aggregation {
                key: "key-1".into(),
                label: Some("label-1".into()),
                buckets: vec![AggregationBucket {
                    label: Some("bucket-1".into()),
                    value: "value-1".into(),
                    count: 10,
                }],
            }],
            content_types: Vec::new(),
            selected_sort: Some("createdAt:desc".into()),
            results_display_type: Some(DisplayType::List),
            flags: all_flags(),
        },
    }
}

type Seen = Arc<Mutex<Vec<CatalogDriverState>>>;

struct Harness {
    driver: CatalogDriver,
    backend: Arc<RecordingBackend>,
    seen: Seen,
    _subscription: Subscription,
}

impl Harness {
    fn seen(&self) -> Vec<CatalogDriverState> {
        self.seen.lock().expect("seen").clone()
    }

    fn last_seen(&self) -> CatalogDriverState {
        self.seen().last().cloned().expect("a notification")
    }
}

async fn setup(config: DriverConfig, backend: Arc<RecordingBackend>) -> Harness {
    let config = DriverConfig {
        search: Some(backend.clone()),
        ..config
    };
    let driver = CatalogDriver::new(config).await.expect("driver");
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = driver.subscribe(move |state| {
        sink.lock().expect("sink").push(state.clone());
    });
    Harness {
        driver,
        backend,
        seen,
        _subscription: subscription,
    }
}

async fn setup_with(initial_state: InitialState) -> Harness {
    setup(
        DriverConfig::default()
            .with_initial_state(initial_state)
            .track_url_state(false),
        RecordingBackend::new(),
    )
    .await
}

fn filter(label: &str, value: &str) -> AggregationFilter {
    AggregationFilter::new(label, value)
}

#[tokio::test]
async fn construction_without_backend_fails() {
    let err = CatalogDriver::new(DriverConfig::default())
        .await
        .err()
        .expect("missing backend must fail");
    assert!(matches!(err, DriverError::MissingSearchBackend));
}

#[tokio::test]
async fn construction_runs_the_first_search_unless_skipped() {
    let backend = RecordingBackend::new();
    let driver = CatalogDriver::new(DriverConfig::new(backend.clone()))
        .await
        .expect("driver");
    assert_eq!(backend.requests().await.len(), 1);
    assert_eq!(driver.state().total, 1000);

    let backend = RecordingBackend::new();
    let driver = CatalogDriver::new(DriverConfig::new(backend.clone()).skip_init(true))
        .await
        .expect("driver");
    assert!(backend.requests().await.is_empty());
    assert_eq!(driver.state().total, 0);

    driver.init().await.expect("init");
    assert_eq!(backend.requests().await.len(), 1);
    assert!(driver.state().flags.sort_title_enabled);
}

#[tokio::test]
async fn init_notifies_before_searching() {
    let harness = setup(
        DriverConfig::default().skip_init(true).track_url_state(false),
        RecordingBackend::new(),
    )
    .await;

    harness.driver.init().await.expect("init");

    let seen = harness.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].total, 0);
    assert_eq!(seen[1].total, 1000);
}

#[tokio::test]
async fn remove_content_type_updates_state() {
    let harness = setup_with(InitialState {
        content_types: Some(vec![ContentKind::Bundle]),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .remove_content_type(ContentKind::Bundle)
        .await
        .expect("remove");

    assert!(harness.last_seen().content_types.is_empty());
    assert!(harness.backend.last_request().await.content_types.is_empty());
}

#[tokio::test]
async fn remove_content_type_keeps_other_request_state() {
    let harness = setup(
        DriverConfig::default()
            .with_initial_state(InitialState {
                search_term: Some("test".into()),
                aggregation_filters: Some(vec![filter("label", "value")]),
                page: Some(3),
                token: Some("abc".into()),
                sort: Some(Sort::new(SortField::Title, SortDirection::Asc)),
                display_type: Some(DisplayType::Grid),
                content_types: Some(vec![ContentKind::Bundle]),
                ..InitialState::default()
            })
            .skip_init(true)
            .track_url_state(false),
        RecordingBackend::new(),
    )
    .await;

    harness.driver.init().await.expect("init");
    harness
        .driver
        .actions()
        .remove_content_type(ContentKind::Bundle)
        .await
        .expect("remove");

    let state = harness.last_seen();
    assert_eq!(state.search_term, "test");
    assert_eq!(state.aggregation_filters, vec![filter("label", "value")]);
    assert_eq!(state.token.as_deref(), Some("abc"));
    assert_eq!(state.sort, Some(Sort::new(SortField::Title, SortDirection::Asc)));
    assert_eq!(state.display_type, DisplayType::Grid);
    assert_eq!(state.page, DEFAULT_PAGE);
}

#[tokio::test]
async fn removing_an_absent_content_type_still_searches_but_changes_nothing() {
    let harness = setup(
        DriverConfig::default()
            .with_initial_state(InitialState {
                search_term: Some("test".into()),
                content_types: Some(vec![ContentKind::Course, ContentKind::CourseGroup]),
                ..InitialState::default()
            })
            .skip_init(true)
            .track_url_state(false),
        RecordingBackend::new(),
    )
    .await;

    harness.driver.init().await.expect("init");
    let before = harness.driver.state();
    let notifications = harness.seen().len();

    harness
        .driver
        .actions()
        .remove_content_type(ContentKind::Bundle)
        .await
        .expect("remove");

    assert_eq!(*harness.driver.state(), *before);
    assert_eq!(harness.seen().len(), notifications);
    assert_eq!(harness.backend.requests().await.len(), 2);
    assert_eq!(
        harness.backend.last_request().await.content_types,
        vec![ContentKind::Course, ContentKind::CourseGroup]
    );
}

#[tokio::test]
async fn add_aggregation_filter_appends() {
    let harness = setup_with(InitialState {
        aggregation_filters: Some(vec![filter("label1", "value1")]),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .add_aggregation_filter(filter("label2", "value2"))
        .await
        .expect("add");

    assert_eq!(
        harness.last_seen().aggregation_filters,
        vec![filter("label1", "value1"), filter("label2", "value2")]
    );
    assert_eq!(
        harness.backend.last_request().await.aggregation_filters,
        vec![filter("label1", "value1"), filter("label2", "value2")]
    );
}

#[tokio::test]
async fn add_aggregation_filter_keeps_other_request_state() {
    let harness = setup_with(InitialState {
        search_term: Some("test".into()),
        page: Some(3),
        token: Some("abc".into()),
        sort: Some(Sort::new(SortField::Title, SortDirection::Asc)),
        display_type: Some(DisplayType::Grid),
        content_types: Some(vec![ContentKind::Article]),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .add_aggregation_filter(filter("label", "value"))
        .await
        .expect("add");

    let state = harness.last_seen();
    assert_eq!(state.search_term, "test");
    assert_eq!(state.token.as_deref(), Some("abc"));
    assert_eq!(state.sort, Some(Sort::new(SortField::Title, SortDirection::Asc)));
    assert_eq!(state.display_type, DisplayType::Grid);
    assert_eq!(
        state.content_types.iter().copied().collect::<Vec<_>>(),
        vec![ContentKind::Article]
    );
    assert_eq!(state.page, DEFAULT_PAGE);
}

#[tokio::test]
async fn add_aggregation_filter_while_curated_resets_request_state() {
    let harness = setup(
        DriverConfig::default()
            .with_initial_state(InitialState {
                search_term: Some("test".into()),
                page: Some(3),
                token: Some("foo".into()),
                content_types: Some(vec![ContentKind::Article]),
                aggregation_filters: Some(vec![filter("label1", "value1")]),
                is_curated: Some(true),
                ..InitialState::default()
            })
            .track_url_state(false),
        RecordingBackend::new(),
    )
    .await;
    // The init result reports a non-curated answer; the request stays curated.
    assert!(harness.driver.state().is_curated);
    assert!(!harness.driver.state().results_curated);

    harness
        .driver
        .actions()
        .add_aggregation_filter(filter("label2", "value2"))
        .await
        .expect("add");

    let defaults = CatalogDriverState::default();
    let state = harness.driver.state();
    assert_eq!(state.content_types, defaults.content_types);
    assert_eq!(state.search_term, defaults.search_term);
    assert_eq!(state.token, defaults.token);
    assert_eq!(state.token_label, defaults.token_label);
    assert_eq!(state.page, defaults.page);
    assert_eq!(state.aggregation_filters, vec![filter("label2", "value2")]);

    let request = harness.backend.last_request().await;
    assert_eq!(request.aggregation_filters, vec![filter("label2", "value2")]);
    assert!(request.search_term.is_empty());
    assert_eq!(request.token, None);
    assert!(request.is_curated);
}

#[tokio::test]
async fn add_aggregation_filter_in_calendar_resets_page() {
    let harness = setup_with(InitialState {
        page: Some(3),
        display_type: Some(DisplayType::Calendar),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .add_aggregation_filter(filter("label2", "value2"))
        .await
        .expect("add");

    let state = harness.last_seen();
    assert_eq!(state.page, DEFAULT_PAGE);
    assert_eq!(state.aggregation_filters, vec![filter("label2", "value2")]);
}

#[tokio::test]
async fn switching_to_calendar_resets_page() {
    let harness = setup_with(InitialState {
        page: Some(3),
        display_type: Some(DisplayType::Grid),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .set_display_type(DisplayType::Calendar)
        .await
        .expect("display type");

    let state = harness.last_seen();
    assert_eq!(state.page, DEFAULT_PAGE);
    assert_eq!(state.display_type, DisplayType::Calendar);
}

#[tokio::test]
async fn switching_away_from_calendar_resets_page() {
    let harness = setup_with(InitialState {
        page: Some(3),
        display_type: Some(DisplayType::Calendar),
        ..InitialState::default()
    })
    .await;

    harness
        .driver
        .actions()
        .set_display_type(DisplayType::List)
        .await
        .expect("display type");

    assert_eq!(harness.last_seen().page, DEFAULT_PAGE);
}

#[tokio::test]
async fn paging_actions_move_the_page() {
    let harness = setup_with(InitialState::default()).await;
    let actions = harness.driver.actions();

    actions.set_page(4).await.expect("set page");
    assert_eq!(harness.driver.state().page, 4);
    actions.next_page().await.expect("next");
    assert_eq!(harness.driver.state().page, 5);
    actions.prev_page().await.expect("prev");
    assert_eq!(harness.backend.last_request().await.page, 4);

    let searches = harness.backend.requests().await.len();
    let err = actions.set_page(0).await.expect_err("page zero");
    assert!(matches!(err, DriverError::InvalidPage(0)));
    assert_eq!(harness.backend.requests().await.len(), searches);
    assert_eq!(harness.driver.state().page, 4);
}

#[tokio::test]
async fn next_page_sends_the_cursor_from_the_last_result() {
    let harness = setup(
        DriverConfig::default().track_url_state(false),
        RecordingBackend::with_fallback(mock_search_result(Some("cursor-2"), false)),
    )
    .await;
    assert_eq!(harness.driver.state().token, None);
    assert_eq!(harness.driver.state().token_label.as_deref(), Some("cursor-2"));

    harness.driver.actions().next_page().await.expect("next");

    let request = harness.backend.last_request().await;
    assert_eq!(request.page, 2);
    assert_eq!(request.token.as_deref(), Some("cursor-2"));
    assert_eq!(harness.driver.state().token.as_deref(), Some("cursor-2"));
}

#[tokio::test]
async fn set_search_term_and_sort_reset_page() {
    let harness = setup_with(InitialState {
        page: Some(7),
        ..InitialState::default()
    })
    .await;
    let actions = harness.driver.actions();

    actions.set_search_term("rust").await.expect("term");
    assert_eq!(harness.driver.state().page, DEFAULT_PAGE);
    assert_eq!(harness.backend.last_request().await.search_term, "rust");

    actions.set_page(2).await.expect("page");
    actions
        .set_sort(SortField::Relevance, SortDirection::Desc)
        .await
        .expect("sort");
    let state = harness.driver.state();
    assert_eq!(state.page, DEFAULT_PAGE);
    assert_eq!(
        state.sort,
        Some(Sort::new(SortField::Relevance, SortDirection::Desc))
    );
}

#[tokio::test]
async fn search_failure_surfaces_and_keeps_optimistic_state() {
    let harness = setup_with(InitialState::default()).await;
    harness
        .backend
        .push(Reply::Fail("upstream exploded".into()))
        .await;

    let err = harness
        .driver
        .actions()
        .add_content_type(ContentKind::Video)
        .await
        .expect_err("search failure");

    assert!(matches!(err, DriverError::Search { .. }));
    assert_eq!(
        err.search_error().map(|source| source.to_string()),
        Some("upstream exploded".to_string())
    );
    assert!(harness
        .driver
        .state()
        .content_types
        .contains(&ContentKind::Video));
}

#[tokio::test]
async fn result_metadata_is_merged_and_notified() {
    let harness = setup_with(InitialState::default()).await;
    harness
        .backend
        .push(Reply::Result(mock_search_result(Some("Tag: rust"), false)))
        .await;

    harness
        .driver
        .actions()
        .set_search_term("rust")
        .await
        .expect("term");

    let seen = harness.seen();
    assert_eq!(seen.len(), 2, "one notification for the action, one for the result");
    assert_eq!(seen[0].token_label, None);
    assert_eq!(seen[1].token_label.as_deref(), Some("Tag: rust"));
    assert_eq!(seen[1].flags, all_flags());
    assert_eq!(seen[1].aggregations[0].key, "key-1");
    assert_eq!(harness.backend.requests().await.len(), 2);
}

#[tokio::test]
async fn listeners_run_in_order_until_unsubscribed() {
    let driver = CatalogDriver::new(
        DriverConfig::new(RecordingBackend::new())
            .skip_init(true)
            .track_url_state(false),
    )
    .await
    .expect("driver");

    let calls = Arc::new(Mutex::new(Vec::new()));
    let first_calls = Arc::clone(&calls);
    let first = driver.subscribe(move |_| first_calls.lock().expect("calls").push("first"));
    let second_calls = Arc::clone(&calls);
    let second = driver.subscribe(move |_| second_calls.lock().expect("calls").push("second"));

    driver
        .actions()
        .add_content_type(ContentKind::Article)
        .await
        .expect("add");
    assert_eq!(
        *calls.lock().expect("calls"),
        vec!["first", "second", "first", "second"]
    );

    first.unsubscribe();
    calls.lock().expect("calls").clear();
    driver
        .actions()
        .add_content_type(ContentKind::Video)
        .await
        .expect("add");
    assert_eq!(*calls.lock().expect("calls"), vec!["second"]);

    second.unsubscribe();
}

#[tokio::test]
async fn listeners_may_read_state_while_notified() {
    let driver = Arc::new(
        CatalogDriver::new(
            DriverConfig::new(RecordingBackend::new())
                .skip_init(true)
                .track_url_state(false),
        )
        .await
        .expect("driver"),
    );

    let pages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pages);
    let observer = Arc::downgrade(&driver);
    let subscription = driver.subscribe(move |state| {
        if let Some(driver) = observer.upgrade() {
            assert_eq!(driver.state().page, state.page);
        }
        sink.lock().expect("pages").push(state.page);
    });

    driver.actions().set_page(2).await.expect("page");
    // Once for the action, once more when the first result lands.
    assert_eq!(*pages.lock().expect("pages"), vec![2, 2]);
    subscription.unsubscribe();
}

#[tokio::test]
async fn watch_state_sees_replacements() {
    let harness = setup_with(InitialState::default()).await;
    let mut watcher = harness.driver.watch_state();
    watcher.borrow_and_update();

    harness
        .driver
        .actions()
        .set_search_term("watched")
        .await
        .expect("term");

    assert!(watcher.has_changed().expect("sender alive"));
    assert_eq!(watcher.borrow_and_update().search_term, "watched");
}

#[tokio::test]
async fn url_state_is_restored_and_written_back() {
    let location = Arc::new(
        MemoryLocation::parse(
            "https://learn.example.com/catalog?ref=nav&query=from-url&content_type=video&page=2",
        )
        .expect("location"),
    );
    let harness = setup(
        DriverConfig::default()
            .with_initial_state(InitialState {
                search_term: Some("from-initial".into()),
                display_type: Some(DisplayType::Grid),
                ..InitialState::default()
            })
            .with_location(location.clone()),
        RecordingBackend::new(),
    )
    .await;

    // The url replaces initial_state outright: display type falls back to the default.
    let state = harness.driver.state();
    assert_eq!(state.search_term, "from-url");
    assert_eq!(state.page, 2);
    assert_eq!(state.display_type, DisplayType::List);
    assert!(state.content_types.contains(&ContentKind::Video));
    assert_eq!(
        location.current().query(),
        Some("ref=nav&query=from-url&page=2&content_type=video")
    );

    harness
        .driver
        .actions()
        .add_aggregation_filter(filter("Topic", "rust"))
        .await
        .expect("add");

    assert_eq!(
        location.current().query(),
        Some(
            "ref=nav&query=from-url&page=1&content_type=video\
             &filter_label=Topic&filter_value=rust"
        )
    );
}

#[tokio::test]
async fn clearing_a_field_survives_a_reload() {
    let location = Arc::new(MemoryLocation::parse("https://x.test/catalog").expect("location"));
    let config = || {
        DriverConfig::default()
            .with_initial_state(InitialState {
                search_term: Some("test".into()),
                ..InitialState::default()
            })
            .with_location(location.clone())
    };

    let first = setup(config(), RecordingBackend::new()).await;
    assert_eq!(first.driver.state().search_term, "test");
    first
        .driver
        .actions()
        .set_search_term("")
        .await
        .expect("clear term");
    assert_eq!(location.current().as_str(), "https://x.test/catalog?page=1");

    let reloaded = setup(config(), RecordingBackend::new()).await;
    assert_eq!(reloaded.driver.state().search_term, "");
    assert_eq!(reloaded.backend.last_request().await.search_term, "");
}

#[tokio::test]
async fn url_is_ignored_when_tracking_is_off() {
    let location = Arc::new(
        MemoryLocation::parse("https://learn.example.com/catalog?query=from-url")
            .expect("location"),
    );
    let harness = setup(
        DriverConfig::default()
            .with_location(location.clone())
            .track_url_state(false),
        RecordingBackend::new(),
    )
    .await;

    harness
        .driver
        .actions()
        .set_search_term("typed")
        .await
        .expect("term");

    assert_eq!(harness.driver.state().search_term, "typed");
    assert!(location.history().is_empty());
    assert_eq!(location.current().query(), Some("query=from-url"));
}

struct FailingLocation;

impl UrlLocation for FailingLocation {
    fn read(&self) -> Option<url::Url> {
        url::Url::parse("https://learn.example.com/catalog").ok()
    }

    fn write(&self, _url: url::Url) -> anyhow::Result<()> {
        Err(anyhow!("history api unavailable"))
    }
}

#[tokio::test]
async fn url_write_failure_does_not_fail_the_action() {
    let harness = setup(
        DriverConfig::default().with_location(Arc::new(FailingLocation)),
        RecordingBackend::new(),
    )
    .await;

    harness
        .driver
        .actions()
        .set_search_term("still works")
        .await
        .expect("term");
    assert_eq!(harness.driver.state().search_term, "still works");
}

async fn overlapping_searches(discard_stale_results: bool) -> Option<String> {
    let backend = RecordingBackend::new();
    let driver = CatalogDriver::new(
        DriverConfig::new(backend.clone())
            .skip_init(true)
            .track_url_state(false)
            .discard_stale_results(discard_stale_results),
    )
    .await
    .expect("driver");

    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    backend.push(Reply::Gate(first_rx)).await;
    backend.push(Reply::Gate(second_rx)).await;

    let mut watcher = driver.watch_state();
    let actions = driver.actions();
    let resolve = async move {
        second_tx
            .send(mock_search_result(Some("second"), false))
            .expect("second gate");
        watcher
            .wait_for(|state| state.search_term == "b" && state.total == 1000)
            .await
            .expect("second result applied");
        first_tx
            .send(mock_search_result(Some("first"), false))
            .expect("first gate");
    };

    let (first, second, ()) = tokio::join!(
        actions.set_search_term("a"),
        actions.set_search_term("b"),
        resolve
    );
    first.expect("first action");
    second.expect("second action");

    driver.state().token_label.clone()
}

#[tokio::test]
async fn overlapping_searches_apply_in_completion_order() {
    assert_eq!(overlapping_searches(false).await.as_deref(), Some("first"));
}

#[tokio::test]
async fn stale_results_can_be_discarded() {
    assert_eq!(overlapping_searches(true).await.as_deref(), Some("second"));
}

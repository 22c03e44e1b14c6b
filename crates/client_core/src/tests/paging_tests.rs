use super::*;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    id: String,
}

impl Row {
    fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl PageItem for Row {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}

struct ScriptedPages {
    pages: HashMap<u32, Page<Row>>,
    failures: Mutex<HashMap<u32, FetchError>>,
    gates: HashMap<u32, Arc<Semaphore>>,
    started: Mutex<Vec<u32>>,
    fetched: Mutex<Vec<u32>>,
}

impl ScriptedPages {
    fn with_pages(pages: Vec<Page<Row>>) -> Self {
        Self {
            pages: pages.into_iter().map(|page| (page.number, page)).collect(),
            failures: Mutex::new(HashMap::new()),
            gates: HashMap::new(),
            started: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// A collection of `total` rows with ids "1".."total", split into
    /// pages of `per_page`.
    fn uniform(total: u32, per_page: u32) -> Self {
        let total_pages = total.div_ceil(per_page).max(1);
        let pages = (1..=total_pages)
            .map(|number| {
                let start = (number - 1) * per_page + 1;
                let end = (start + per_page - 1).min(total);
                Page {
                    number,
                    total_pages,
                    total_count: u64::from(total),
                    items: (start..=end).map(|id| Row::new(id.to_string())).collect(),
                }
            })
            .collect();
        Self::with_pages(pages)
    }

    fn gate(&mut self, page: u32, gate: Arc<Semaphore>) {
        self.gates.insert(page, gate);
    }

    async fn fail_page(&self, page: u32, error: FetchError) {
        self.failures.lock().await.insert(page, error);
    }

    async fn clear_failures(&self) {
        self.failures.lock().await.clear();
    }

    async fn started_log(&self) -> Vec<u32> {
        self.started.lock().await.clone()
    }

    async fn fetch_log(&self) -> Vec<u32> {
        self.fetched.lock().await.clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedPages {
    type Item = Row;

    async fn fetch_page(
        &self,
        page: u32,
        _per_page: u32,
        _filters: &PageFilters,
    ) -> RemoteState<Page<Row>> {
        self.started.lock().await.push(page);
        if let Some(gate) = self.gates.get(&page) {
            let _permit = gate.acquire().await.expect("gate closed");
        }
        self.fetched.lock().await.push(page);

        if let Some(error) = self.failures.lock().await.get(&page) {
            return RemoteState::Failed(error.clone());
        }
        match self.pages.get(&page) {
            Some(scripted) => RemoteState::Ready(scripted.clone()),
            None => RemoteState::Failed(FetchError::new(
                ErrorKind::NotFound,
                format!("no scripted page {page}"),
            )),
        }
    }
}

fn cache_over(fetcher: Arc<ScriptedPages>) -> PagedCache<Row> {
    PagedCache::new(fetcher, 15, PageFilters::default())
}

fn ids(range: RangeInclusive<u32>) -> Vec<String> {
    range.map(|id| id.to_string()).collect()
}

fn merged_ids(snapshot: &CacheSnapshot<Row>) -> Vec<String> {
    match &snapshot.state {
        RemoteState::Ready(rows) => rows.iter().map(|row| row.id.clone()).collect(),
        other => panic!("expected ready state, got {other:?}"),
    }
}

async fn wait_for_started(fetcher: &ScriptedPages, count: usize) {
    for _ in 0..200 {
        if fetcher.started_log().await.len() >= count {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("gated fetches never started");
}

#[tokio::test]
async fn snapshot_is_loading_before_any_request_completes() {
    let cache = cache_over(Arc::new(ScriptedPages::uniform(30, 15)));
    let snapshot = cache.snapshot().await;
    assert!(snapshot.state.is_loading());
    assert_eq!(snapshot.window, None);
    assert_eq!(snapshot.total_pages, None);
}

#[tokio::test]
async fn request_clamps_nonpositive_pages_to_page_one() {
    let fetcher = Arc::new(ScriptedPages::with_pages(vec![Page {
        number: 1,
        total_pages: 2,
        total_count: 7,
        items: (1..=5).map(|id| Row::new(id.to_string())).collect(),
    }]));
    let cache = cache_over(Arc::clone(&fetcher));

    let snapshot = cache.request(-1).await;
    assert_eq!(snapshot.window, Some(CacheWindow::single(1)));
    assert_eq!(merged_ids(&snapshot), ids(1..=5));
    assert_eq!(snapshot.total_pages, Some(2));
    assert_eq!(snapshot.total_count, Some(7));
    assert_eq!(fetcher.fetch_log().await, vec![1]);

    // `request(0)` behaves identically to `request(1)`: fully covered now.
    let again = cache.request(0).await;
    assert_eq!(again, snapshot);
    assert_eq!(fetcher.fetch_log().await, vec![1]);
}

#[tokio::test]
async fn request_of_page_two_from_empty_fetches_both_pages() {
    let fetcher = Arc::new(ScriptedPages::uniform(30, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    let snapshot = cache.request(2).await;
    assert_eq!(snapshot.window, Some(CacheWindow { low: 1, high: 2 }));
    assert_eq!(merged_ids(&snapshot), ids(1..=30));

    let mut log = fetcher.fetch_log().await;
    log.sort_unstable();
    assert_eq!(log, vec![1, 2]);
}

#[tokio::test]
async fn forward_requests_merge_pages_in_order_with_one_fetch_each() {
    let fetcher = Arc::new(ScriptedPages::uniform(45, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    cache.request(1).await;
    cache.request(2).await;
    let snapshot = cache.request(3).await;

    assert_eq!(snapshot.window, Some(CacheWindow { low: 1, high: 3 }));
    assert_eq!(merged_ids(&snapshot), ids(1..=45));
    assert_eq!(fetcher.fetch_log().await, vec![1, 2, 3]);
}

#[tokio::test]
async fn covered_requests_are_idempotent_and_refetch_nothing() {
    let fetcher = Arc::new(ScriptedPages::uniform(30, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    let first = cache.request(2).await;
    let second = cache.request(2).await;
    let third = cache.request(1).await;

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(fetcher.fetch_log().await.len(), 2);
}

#[tokio::test]
async fn forward_jump_collapses_window_to_two_page_span() {
    let fetcher = Arc::new(ScriptedPages::uniform(90, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    cache.request(1).await;
    let snapshot = cache.request(5).await;

    assert_eq!(snapshot.window, Some(CacheWindow { low: 4, high: 5 }));
    assert_eq!(merged_ids(&snapshot), ids(46..=75));

    let mut log = fetcher.fetch_log().await;
    log.sort_unstable();
    assert_eq!(log, vec![1, 4, 5]);
}

#[tokio::test]
async fn request_below_window_collapses_to_two_page_span() {
    let fetcher = Arc::new(ScriptedPages::uniform(90, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    cache.request(4).await;
    let snapshot = cache.request(2).await;

    assert_eq!(snapshot.window, Some(CacheWindow { low: 1, high: 2 }));
    assert_eq!(merged_ids(&snapshot), ids(1..=30));

    let mut log = fetcher.fetch_log().await;
    log.sort_unstable();
    assert_eq!(log, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn failed_page_fails_the_request_and_preserves_previous_data() {
    let fetcher = Arc::new(ScriptedPages::uniform(30, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    let before = cache.request(1).await;
    assert_eq!(merged_ids(&before), ids(1..=15));

    fetcher
        .fail_page(2, FetchError::new(ErrorKind::ServerFault, "boom"))
        .await;
    let failed = cache.request(2).await;
    assert_eq!(
        failed.state.failure(),
        Some(&FetchError::new(ErrorKind::ServerFault, "boom"))
    );
    assert_eq!(failed.window, Some(CacheWindow::single(1)));

    // An explicit retry succeeds without refetching the retained page.
    fetcher.clear_failures().await;
    let recovered = cache.request(2).await;
    assert_eq!(recovered.window, Some(CacheWindow { low: 1, high: 2 }));
    assert_eq!(merged_ids(&recovered), ids(1..=30));
    assert_eq!(fetcher.fetch_log().await, vec![1, 2, 2]);
}

#[tokio::test]
async fn first_error_in_page_order_wins() {
    let fetcher = Arc::new(ScriptedPages::uniform(30, 15));
    fetcher
        .fail_page(1, FetchError::new(ErrorKind::Conflict, "first"))
        .await;
    fetcher
        .fail_page(2, FetchError::new(ErrorKind::NotFound, "second"))
        .await;
    let cache = cache_over(Arc::clone(&fetcher));

    let snapshot = cache.request(2).await;
    assert_eq!(
        snapshot.state.failure(),
        Some(&FetchError::new(ErrorKind::Conflict, "first"))
    );
    assert_eq!(snapshot.window, None);
}

#[tokio::test]
async fn duplicate_ids_across_pages_merge_once() {
    let fetcher = Arc::new(ScriptedPages::with_pages(vec![
        Page {
            number: 1,
            total_pages: 2,
            total_count: 4,
            items: vec![Row::new("a"), Row::new("b"), Row::new("c")],
        },
        Page {
            number: 2,
            total_pages: 2,
            total_count: 4,
            items: vec![Row::new("c"), Row::new("d")],
        },
    ]));
    let cache = cache_over(fetcher);

    let snapshot = cache.request(2).await;
    assert_eq!(merged_ids(&snapshot), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn newer_request_supersedes_older_completion() {
    let gate = Arc::new(Semaphore::new(0));
    let mut scripted = ScriptedPages::uniform(90, 15);
    scripted.gate(4, Arc::clone(&gate));
    scripted.gate(5, Arc::clone(&gate));
    let fetcher = Arc::new(scripted);
    let cache = Arc::new(cache_over(Arc::clone(&fetcher)));

    let superseded = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.request(5).await })
    };
    wait_for_started(&fetcher, 2).await;

    let winner = cache.request(2).await;
    assert_eq!(winner.window, Some(CacheWindow { low: 1, high: 2 }));
    assert_eq!(merged_ids(&winner), ids(1..=30));

    gate.add_permits(2);
    let dropped = superseded.await.expect("join superseded request");
    assert_eq!(dropped.window, Some(CacheWindow { low: 1, high: 2 }));

    let current = cache.snapshot().await;
    assert_eq!(current.window, Some(CacheWindow { low: 1, high: 2 }));
    assert_eq!(merged_ids(&current), ids(1..=30));
}

#[tokio::test]
async fn in_flight_request_does_not_disturb_ready_state() {
    let gate = Arc::new(Semaphore::new(0));
    let mut scripted = ScriptedPages::uniform(30, 15);
    scripted.gate(2, Arc::clone(&gate));
    let fetcher = Arc::new(scripted);
    let cache = Arc::new(cache_over(Arc::clone(&fetcher)));

    cache.request(1).await;

    let pending = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.request(2).await })
    };
    wait_for_started(&fetcher, 2).await;

    // Status is mutated only by completed requests.
    let during = cache.snapshot().await;
    assert_eq!(merged_ids(&during), ids(1..=15));
    assert_eq!(during.window, Some(CacheWindow::single(1)));

    gate.add_permits(1);
    let settled = pending.await.expect("join pending request");
    assert_eq!(merged_ids(&settled), ids(1..=30));
}

#[tokio::test]
async fn filter_change_resets_cache_and_forces_refetch() {
    let fetcher = Arc::new(ScriptedPages::uniform(30, 15));
    let cache = cache_over(Arc::clone(&fetcher));

    cache.request(2).await;

    let mut filters = PageFilters::default();
    filters.search = Some("bud".to_string());
    assert!(cache.set_filters(filters.clone()).await);
    assert!(!cache.set_filters(filters).await);

    let reset = cache.snapshot().await;
    assert!(reset.state.is_loading());
    assert_eq!(reset.window, None);

    let refetched = cache.request(1).await;
    assert_eq!(merged_ids(&refetched), ids(1..=15));
    assert_eq!(fetcher.fetch_log().await, vec![1, 2, 1]);
}

#[tokio::test]
async fn filter_change_invalidates_in_flight_request() {
    let gate = Arc::new(Semaphore::new(0));
    let mut scripted = ScriptedPages::uniform(45, 15);
    scripted.gate(3, Arc::clone(&gate));
    let fetcher = Arc::new(scripted);
    let cache = Arc::new(cache_over(Arc::clone(&fetcher)));

    cache.request(2).await;

    let pending = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.request(3).await })
    };
    wait_for_started(&fetcher, 3).await;

    let mut filters = PageFilters::default();
    filters.ascending = false;
    assert!(cache.set_filters(filters).await);

    gate.add_permits(1);
    pending.await.expect("join pending request");

    let after = cache.snapshot().await;
    assert!(after.state.is_loading());
    assert_eq!(after.window, None);
}

//! Tests for server-side pagination and pushed row streams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gridline::{
    ColumnDef, CoreError, FetchError, Grid, GridError, GridOptions, PageRequest, PageResult, PaginationMode,
    RefreshOptions, TaskSpawner,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;

type Reply = oneshot::Sender<Result<PageResult<Value>, FetchError>>;
type Pending = Arc<Mutex<Vec<(PageRequest, Option<Reply>)>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn grid() -> Grid<Value> {
    let grid = Grid::new(GridOptions::default());
    grid.set_column_defs(vec![ColumnDef::field("name"), ColumnDef::field("age")]);
    grid
}

/// A fetcher whose responses are sent by the test.
fn controlled_fetcher(grid: &Grid<Value>) -> Pending {
    let pending: Pending = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::clone(&pending);
    grid.set_server_fetcher(move |request: PageRequest| {
        let (tx, rx) = oneshot::channel();
        queue.lock().push((request, Some(tx)));
        async move { rx.await.unwrap_or_else(|_| Err(FetchError::server("reply dropped"))) }
    });
    pending
}

fn reply(pending: &Pending, index: usize, result: Result<PageResult<Value>, FetchError>) {
    let tx = pending.lock()[index].1.take().expect("reply already sent");
    // The receiver is gone when the fetch was cancelled.
    let _ = tx.send(result);
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn let_tasks_run() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_latest_request_wins() {
    init_tracing();
    let grid = grid();
    let pending = controlled_fetcher(&grid);

    grid.set_pagination_mode(PaginationMode::Server);
    assert!(grid.page_state().loading);
    grid.set_page_size(10);
    assert_eq!(pending.lock().len(), 2);
    assert_eq!(pending.lock()[0].0.page_size, 25);
    assert_eq!(pending.lock()[1].0.page_size, 10);

    reply(
        &pending,
        0,
        Ok(PageResult {
            rows: vec![json!({"name": "stale"})],
            total: 7,
        }),
    );
    let_tasks_run().await;
    assert!(grid.page_state().loading);
    assert!(grid.visible_rows().is_empty());

    reply(
        &pending,
        1,
        Ok(PageResult {
            rows: vec![json!({"name": "fresh"})],
            total: 42,
        }),
    );
    wait_until(|| !grid.page_state().loading).await;

    assert_eq!(*grid.visible_rows(), vec![json!({"name": "fresh"})]);
    let state = grid.page_state();
    assert_eq!(state.total, 42);
    assert_eq!(state.page_count, 5);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn test_failure_shows_empty_page_with_error() {
    init_tracing();
    let grid = grid();
    grid.set_server_fetcher(|_request: PageRequest| async {
        Err::<PageResult<Value>, _>(FetchError::server("boom"))
    });
    grid.set_pagination_mode(PaginationMode::Server);

    wait_until(|| !grid.page_state().loading).await;
    let state = grid.page_state();
    assert_eq!(state.error, Some(FetchError::server("boom")));
    assert_eq!(state.total, 0);
    assert_eq!(state.page_count, 1);
    assert!(grid.visible_rows().is_empty());
}

#[tokio::test]
async fn test_request_carries_sort_filter_and_meta() {
    let grid = grid();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    grid.set_server_fetcher(move |request: PageRequest| {
        log.lock().push(request);
        async { Ok::<_, FetchError>(PageResult::<Value>::empty()) }
    });

    grid.set_global_filter("abc");
    grid.set_request_meta(Some(json!({"tenant": "t1"})));
    assert!(requests.lock().is_empty());

    grid.set_pagination_mode(PaginationMode::Server);
    wait_until(|| !grid.page_state().loading).await;
    grid.header_click("age", None);
    wait_until(|| !grid.page_state().loading).await;

    let requests = requests.lock();
    assert_eq!(requests.len(), 2);
    let first = &requests[0];
    assert!(first.sort_model.is_empty());
    assert_eq!(first.filter_model.as_ref().map(|f| f.global_text.as_str()), Some("abc"));
    assert_eq!(first.meta, Some(json!({"tenant": "t1"})));
    assert_eq!(requests[1].sort_model.len(), 1);
    assert_eq!(requests[1].sort_model[0].col_id, "age");
}

#[tokio::test]
async fn test_leaving_server_mode_drops_in_flight_fetch() {
    let grid = grid();
    grid.set_row_data(vec![json!({"name": "local", "age": 1})]);
    let pending = controlled_fetcher(&grid);

    grid.set_pagination_mode(PaginationMode::Server);
    assert!(grid.visible_rows().is_empty());

    grid.set_pagination_mode(PaginationMode::Client);
    let state = grid.page_state();
    assert!(!state.loading);
    assert_eq!(state.error, None);
    assert_eq!(state.total, 1);

    reply(
        &pending,
        0,
        Ok(PageResult {
            rows: vec![json!({"name": "remote"})],
            total: 99,
        }),
    );
    let_tasks_run().await;
    assert_eq!(*grid.visible_rows(), vec![json!({"name": "local", "age": 1})]);
    assert_eq!(grid.page_state().total, 1);
}

#[tokio::test]
async fn test_shrinking_total_clamps_and_refetches() {
    let grid = grid();
    let total = Arc::new(AtomicUsize::new(100));
    let pages = Arc::new(Mutex::new(Vec::new()));
    let (server_total, log) = (Arc::clone(&total), Arc::clone(&pages));
    grid.set_server_fetcher(move |request: PageRequest| {
        log.lock().push(request.page_index);
        let total = server_total.load(Ordering::SeqCst);
        async move {
            Ok::<_, FetchError>(PageResult {
                rows: vec![json!({"page": request.page_index})],
                total,
            })
        }
    });

    grid.set_pagination_mode(PaginationMode::Server);
    wait_until(|| !grid.page_state().loading).await;
    grid.set_page_index(3);
    wait_until(|| !grid.page_state().loading).await;
    assert_eq!(grid.page_index(), 3);

    total.store(30, Ordering::SeqCst);
    grid.refresh(RefreshOptions { keep_page: true });
    wait_until(|| pages.lock().len() == 4 && !grid.page_state().loading).await;

    assert_eq!(*pages.lock(), vec![0, 3, 3, 1]);
    assert_eq!(grid.page_index(), 1);
    assert_eq!(*grid.visible_rows(), vec![json!({"page": 1})]);
}

#[tokio::test]
async fn test_refresh_returns_to_first_page() {
    let grid = grid();
    let pages = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&pages);
    grid.set_server_fetcher(move |request: PageRequest| {
        log.lock().push(request.page_index);
        async { Ok::<_, FetchError>(PageResult::<Value> { rows: Vec::new(), total: 500 }) }
    });
    grid.set_pagination_mode(PaginationMode::Server);
    wait_until(|| !grid.page_state().loading).await;
    grid.last_page();
    wait_until(|| !grid.page_state().loading).await;
    assert_eq!(grid.page_index(), 19);

    grid.refresh(RefreshOptions::default());
    wait_until(|| !grid.page_state().loading).await;
    assert_eq!(grid.page_index(), 0);
    assert_eq!(*pages.lock(), vec![0, 19, 0]);
}

#[tokio::test]
async fn test_destroy_cancels_pending_fetch() {
    let grid = grid();
    let pending = controlled_fetcher(&grid);
    grid.set_pagination_mode(PaginationMode::Server);
    grid.destroy();
    assert!(!grid.page_state().loading);

    reply(
        &pending,
        0,
        Ok(PageResult {
            rows: vec![json!({"name": "late"})],
            total: 1,
        }),
    );
    let_tasks_run().await;
    assert!(grid.visible_rows().is_empty());

    grid.refresh(RefreshOptions::default());
    assert_eq!(pending.lock().len(), 1);
}

#[tokio::test]
async fn test_row_stream_replaces_rows() {
    let grid = grid();
    grid.set_row_data(vec![json!({"name": "static"})]);

    let (tx, rx) = mpsc::unbounded_channel();
    grid.set_row_stream(UnboundedReceiverStream::new(rx)).expect("runtime available");
    assert!(grid.visible_rows().is_empty());

    tx.send(vec![json!({"name": "a"}), json!({"name": "b"})]).expect("stream open");
    wait_until(|| grid.visible_rows().len() == 2).await;
    tx.send(vec![json!({"name": "c"})]).expect("stream open");
    wait_until(|| grid.visible_rows().len() == 1).await;
    assert_eq!(grid.page_state().total, 1);

    grid.clear_row_stream();
    assert_eq!(*grid.visible_rows(), vec![json!({"name": "static"})]);

    // Emissions after unbinding are ignored.
    let _ = tx.send(vec![json!({"name": "d"}), json!({"name": "e"})]);
    let_tasks_run().await;
    assert_eq!(*grid.visible_rows(), vec![json!({"name": "static"})]);
}

#[tokio::test]
async fn test_new_stream_replaces_old_one() {
    let grid = grid();
    let (old_tx, old_rx) = mpsc::unbounded_channel();
    let (new_tx, new_rx) = mpsc::unbounded_channel();
    grid.set_row_stream(UnboundedReceiverStream::new(old_rx)).expect("runtime available");
    grid.set_row_stream(UnboundedReceiverStream::new(new_rx)).expect("runtime available");

    let _ = old_tx.send(vec![json!({"name": "old"})]);
    new_tx.send(vec![json!({"name": "new"})]).expect("stream open");
    wait_until(|| !grid.visible_rows().is_empty()).await;
    let_tasks_run().await;
    assert_eq!(*grid.visible_rows(), vec![json!({"name": "new"})]);
}

#[test]
fn test_stream_needs_a_runtime() {
    let grid: Grid<Value> = Grid::with_spawner(GridOptions::default(), TaskSpawner::detached());
    grid.set_row_data(vec![json!({"name": "static"})]);
    let (_tx, rx) = mpsc::unbounded_channel::<Vec<Value>>();

    let err = grid.set_row_stream(UnboundedReceiverStream::new(rx)).unwrap_err();
    assert!(matches!(err, GridError::Core(CoreError::NoRuntime)));
    assert_eq!(grid.visible_rows().len(), 1);
}

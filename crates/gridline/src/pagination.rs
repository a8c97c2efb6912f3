//! Pagination engine.
//!
//! A synchronous state machine over page index, page size and mode.
//!
//! In client mode the total is the number of filtered rows and
//! [`PaginationEngine::apply`] slices the current page out of its input. In
//! server mode the total and the rows come from the last applied fetch, and
//! `apply` ignores its input.
//!
//! Fetches are split in two steps so that the engine never touches a
//! runtime: [`begin_fetch`](PaginationEngine::begin_fetch) hands out a
//! [`FetchTicket`] and cancels whatever was in flight, and
//! [`complete_fetch`](PaginationEngine::complete_fetch) applies a result only
//! if it belongs to the latest ticket.

use serde::{Deserialize, Serialize};

use gridline_core::logging::targets;
use gridline_core::CancellationToken;

use crate::error::FetchError;
use crate::fetch::{PageRequest, PageResult};
use crate::filter::FilterModel;
use crate::sort::SortModelItem;

/// Page size used when the grid config does not set one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Where page contents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Pages are sliced from the locally filtered and sorted rows.
    #[default]
    Client,
    /// Pages are fetched from a server.
    Server,
}

/// Number of pages for a total: never less than one.
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// Page position and size, as carried by page change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChange {
    pub page_index: usize,
    pub page_size: usize,
    pub total: usize,
    pub page_count: usize,
}

/// Snapshot of the whole pagination state.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub mode: PaginationMode,
    pub page_index: usize,
    pub page_size: usize,
    pub total: usize,
    pub page_count: usize,
    pub loading: bool,
    /// The last fetch failure, until the next fetch succeeds.
    pub error: Option<FetchError>,
}

impl PageState {
    pub fn change(&self) -> PageChange {
        PageChange {
            page_index: self.page_index,
            page_size: self.page_size,
            total: self.total,
            page_count: self.page_count,
        }
    }
}

/// A started fetch. The orchestrator runs `request` and reports back with `seq`.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub seq: u64,
    pub request: PageRequest,
    /// Cancelled as soon as a newer fetch starts or server mode ends.
    pub token: CancellationToken,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A newer fetch was started in the meantime; the result was dropped.
    Stale,
    /// The result is now the visible page. `page_clamped` is set when the new
    /// total moved the page index, which calls for another fetch.
    Applied { page_clamped: bool },
}

#[derive(Debug)]
pub struct PaginationEngine<T> {
    mode: PaginationMode,
    page_index: usize,
    page_size: usize,
    client_total: usize,
    total_override: Option<usize>,
    server_rows: Vec<T>,
    loading: bool,
    error: Option<FetchError>,
    seq: u64,
    in_flight: Option<CancellationToken>,
}

impl<T> Default for PaginationEngine<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T> PaginationEngine<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            mode: PaginationMode::Client,
            page_index: 0,
            page_size: page_size.max(1),
            client_total: 0,
            total_override: None,
            server_rows: Vec::new(),
            loading: false,
            error: None,
            seq: 0,
            in_flight: None,
        }
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    pub fn is_server(&self) -> bool {
        self.mode == PaginationMode::Server
    }

    /// Switches mode. Leaving server mode cancels any in-flight fetch and
    /// drops the fetched page, its total, and the loading and error flags.
    pub fn set_mode(&mut self, mode: PaginationMode) -> bool {
        if self.mode == mode {
            return false;
        }
        tracing::debug!(target: targets::PAGINATION, ?mode, "pagination mode changed");
        self.mode = mode;
        if mode == PaginationMode::Client {
            self.cancel_in_flight();
            self.total_override = None;
            self.server_rows.clear();
            self.error = None;
        }
        self.clamp();
        true
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows available to page through.
    pub fn total(&self) -> usize {
        match self.mode {
            PaginationMode::Client => self.client_total,
            PaginationMode::Server => self.total_override.unwrap_or(0),
        }
    }

    pub fn page_count(&self) -> usize {
        page_count(self.total(), self.page_size)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Updates the client-side row count and re-clamps the page index.
    pub fn set_client_total(&mut self, total: usize) -> bool {
        self.client_total = total;
        self.clamp()
    }

    /// Keeps the page index inside `[0, page_count - 1]`. Returns `true` if
    /// it had to move.
    pub fn clamp(&mut self) -> bool {
        let max = self.page_count() - 1;
        if self.page_index > max {
            self.page_index = max;
            true
        } else {
            false
        }
    }

    /// Moves to a page, clamped into range. Returns `true` if the index changed.
    pub fn set_page_index(&mut self, index: usize) -> bool {
        let clamped = index.min(self.page_count() - 1);
        if clamped == self.page_index {
            return false;
        }
        tracing::debug!(target: targets::PAGINATION, page_index = clamped, "page index set");
        self.page_index = clamped;
        true
    }

    /// Sets the page size (at least 1) and returns to the first page.
    pub fn set_page_size(&mut self, size: usize) -> bool {
        let size = size.max(1);
        let changed = size != self.page_size || self.page_index != 0;
        self.page_size = size;
        self.page_index = 0;
        if changed {
            tracing::debug!(target: targets::PAGINATION, page_size = size, "page size set");
        }
        changed
    }

    pub fn next(&mut self) -> bool {
        self.set_page_index(self.page_index.saturating_add(1))
    }

    pub fn prev(&mut self) -> bool {
        self.set_page_index(self.page_index.saturating_sub(1))
    }

    pub fn first(&mut self) -> bool {
        self.set_page_index(0)
    }

    pub fn last(&mut self) -> bool {
        self.set_page_index(self.page_count() - 1)
    }

    /// Starts a new fetch for the current page, cancelling the previous one.
    pub fn begin_fetch(
        &mut self,
        sort_model: Vec<SortModelItem>,
        filter_model: Option<FilterModel>,
        meta: Option<serde_json::Value>,
    ) -> FetchTicket {
        self.cancel_in_flight();
        self.seq += 1;
        self.loading = true;

        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());

        let request = PageRequest {
            page_index: self.page_index,
            page_size: self.page_size,
            sort_model,
            filter_model,
            meta,
        };
        tracing::debug!(
            target: targets::PAGINATION,
            seq = self.seq,
            page_index = request.page_index,
            page_size = request.page_size,
            "fetch started"
        );
        FetchTicket {
            seq: self.seq,
            request,
            token,
        }
    }

    /// Applies the result of fetch `seq` if it is still the latest one.
    ///
    /// A failure shows as an empty page with a total of zero and keeps the
    /// error for inspection.
    pub fn complete_fetch(&mut self, seq: u64, result: Result<PageResult<T>, FetchError>) -> FetchOutcome {
        if seq != self.seq || !self.is_server() {
            tracing::trace!(target: targets::PAGINATION, seq, current = self.seq, "stale fetch result dropped");
            return FetchOutcome::Stale;
        }

        self.in_flight = None;
        self.loading = false;
        match result {
            Ok(page) => {
                self.total_override = Some(page.total);
                self.server_rows = page.rows;
                self.error = None;
            }
            Err(err) => {
                tracing::warn!(target: targets::PAGINATION, seq, error = %err, "server fetch failed");
                self.total_override = Some(0);
                self.server_rows = Vec::new();
                self.error = Some(err);
            }
        }
        FetchOutcome::Applied {
            page_clamped: self.clamp(),
        }
    }

    /// Cancels the in-flight fetch, if any, and clears the loading flag.
    pub fn cancel_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            tracing::trace!(target: targets::PAGINATION, seq = self.seq, "in-flight fetch cancelled");
            token.cancel();
        }
        self.loading = false;
    }

    pub fn page_state(&self) -> PageState {
        PageState {
            mode: self.mode,
            page_index: self.page_index,
            page_size: self.page_size,
            total: self.total(),
            page_count: self.page_count(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

impl<T: Clone> PaginationEngine<T> {
    /// The visible page: a slice of `rows` in client mode, the fetched rows
    /// in server mode.
    pub fn apply(&self, rows: &[T]) -> Vec<T> {
        match self.mode {
            PaginationMode::Server => self.server_rows.clone(),
            PaginationMode::Client => {
                let start = self.page_index.saturating_mul(self.page_size);
                if start >= rows.len() {
                    return Vec::new();
                }
                let end = start.saturating_add(self.page_size).min(rows.len());
                rows[start..end].to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_engine() -> PaginationEngine<u32> {
        let mut engine = PaginationEngine::new(2);
        engine.set_mode(PaginationMode::Server);
        engine
    }

    #[test]
    fn test_page_count_bounds() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(5, 2), 3);
        assert_eq!(page_count(6, 2), 3);
        assert_eq!(page_count(7, 0), 7);
    }

    #[test]
    fn test_set_page_index_clamps() {
        let mut engine = PaginationEngine::<u32>::new(2);
        engine.set_client_total(5);
        assert_eq!(engine.page_count(), 3);
        engine.set_page_index(10);
        assert_eq!(engine.page_index(), 2);
    }

    #[test]
    fn test_shrinking_total_clamps() {
        let mut engine = PaginationEngine::<u32>::new(2);
        engine.set_client_total(10);
        engine.last();
        assert_eq!(engine.page_index(), 4);
        assert!(engine.set_client_total(3));
        assert_eq!(engine.page_index(), 1);
        engine.set_client_total(0);
        assert_eq!(engine.page_index(), 0);
    }

    #[test]
    fn test_page_size_floors_and_resets() {
        let mut engine = PaginationEngine::<u32>::new(2);
        engine.set_client_total(10);
        engine.next();
        engine.set_page_size(0);
        assert_eq!(engine.page_size(), 1);
        assert_eq!(engine.page_index(), 0);
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut engine = PaginationEngine::<u32>::new(5);
        engine.set_client_total(12);
        assert!(!engine.prev());
        assert!(engine.next());
        assert!(engine.next());
        assert!(!engine.next());
        assert_eq!(engine.page_index(), 2);
        assert!(engine.first());
        assert_eq!(engine.page_index(), 0);
    }

    #[test]
    fn test_client_apply_slices() {
        let mut engine = PaginationEngine::new(2);
        let rows = vec![1, 2, 3, 4, 5];
        engine.set_client_total(rows.len());
        engine.last();
        assert_eq!(engine.apply(&rows), vec![5]);
        engine.first();
        assert_eq!(engine.apply(&rows), vec![1, 2]);
    }

    #[test]
    fn test_latest_fetch_wins() {
        let mut engine = server_engine();
        let first = engine.begin_fetch(Vec::new(), None, None);
        let second = engine.begin_fetch(Vec::new(), None, None);
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(engine.is_loading());

        let stale = engine.complete_fetch(first.seq, Ok(PageResult { rows: vec![1], total: 1 }));
        assert_eq!(stale, FetchOutcome::Stale);
        assert!(engine.is_loading());

        let applied = engine.complete_fetch(second.seq, Ok(PageResult { rows: vec![7, 8], total: 40 }));
        assert_eq!(applied, FetchOutcome::Applied { page_clamped: false });
        assert_eq!(engine.apply(&[1, 2, 3]), vec![7, 8]);
        assert_eq!(engine.total(), 40);
        assert_eq!(engine.page_count(), 20);
        assert!(!engine.is_loading());
    }

    #[test]
    fn test_failed_fetch_empties_page() {
        let mut engine = server_engine();
        let ticket = engine.begin_fetch(Vec::new(), None, None);
        engine.complete_fetch(ticket.seq, Ok(PageResult { rows: vec![1], total: 9 }));

        let ticket = engine.begin_fetch(Vec::new(), None, None);
        engine.complete_fetch(ticket.seq, Err(FetchError::server("boom")));
        let state = engine.page_state();
        assert_eq!(state.total, 0);
        assert_eq!(state.error, Some(FetchError::server("boom")));
        assert!(!state.loading);
        assert!(engine.apply(&[]).is_empty());
    }

    #[test]
    fn test_smaller_total_reports_clamp() {
        let mut engine = server_engine();
        let ticket = engine.begin_fetch(Vec::new(), None, None);
        engine.complete_fetch(ticket.seq, Ok(PageResult { rows: vec![1, 2], total: 10 }));
        engine.set_page_index(4);

        let ticket = engine.begin_fetch(Vec::new(), None, None);
        assert_eq!(ticket.request.page_index, 4);
        let outcome = engine.complete_fetch(ticket.seq, Ok(PageResult { rows: vec![], total: 3 }));
        assert_eq!(outcome, FetchOutcome::Applied { page_clamped: true });
        assert_eq!(engine.page_index(), 1);
    }

    #[test]
    fn test_switch_to_client_clears_server_state() {
        let mut engine = server_engine();
        let ticket = engine.begin_fetch(Vec::new(), None, None);
        engine.set_mode(PaginationMode::Client);
        assert!(ticket.token.is_cancelled());

        let state = engine.page_state();
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(engine.complete_fetch(ticket.seq, Ok(PageResult::empty())), FetchOutcome::Stale);
    }
}

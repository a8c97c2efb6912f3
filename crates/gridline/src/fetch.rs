//! Server fetch protocol.
//!
//! In server pagination mode the grid does not slice rows itself. It sends a
//! [`PageRequest`] to a [`ServerFetcher`] and shows whatever [`PageResult`]
//! comes back. Any async function from `PageRequest` to
//! `Result<PageResult<T>, FetchError>` is a fetcher:
//!
//! ```
//! use gridline::{FetchError, PageRequest, PageResult, ServerFetcher};
//! use serde_json::{json, Value};
//!
//! let fetcher = |request: PageRequest| async move {
//!     let start = request.page_index * request.page_size;
//!     let rows: Vec<Value> = (start..start + request.page_size).map(|i| json!({"id": i})).collect();
//!     Ok::<_, FetchError>(PageResult { rows, total: 1000 })
//! };
//!
//! fn assert_fetcher<F: ServerFetcher<Value>>(_: &F) {}
//! assert_fetcher(&fetcher);
//! ```

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::filter::FilterModel;
use crate::sort::SortModelItem;

/// What the grid asks the server for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_index: usize,
    pub page_size: usize,
    #[serde(default)]
    pub sort_model: Vec<SortModelItem>,
    /// Present when any filter is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_model: Option<FilterModel>,
    /// Caller-defined extras, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// One page of rows plus the total row count on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

impl<T> PageResult<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
        }
    }
}

/// Supplies pages in server mode.
pub trait ServerFetcher<T>: Send + Sync {
    /// Starts fetching one page. The returned future may be dropped before
    /// completion when the request is superseded.
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, Result<PageResult<T>, FetchError>>;
}

impl<T, F, Fut> ServerFetcher<T> for F
where
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PageResult<T>, FetchError>> + Send + 'static,
{
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, Result<PageResult<T>, FetchError>> {
        self(request).boxed()
    }
}

/// A shared, type-erased fetcher.
pub type SharedFetcher<T> = Arc<dyn ServerFetcher<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let request = PageRequest {
            page_index: 2,
            page_size: 10,
            sort_model: vec![SortModelItem::new("age", SortDirection::Desc)],
            filter_model: None,
            meta: Some(json!({"tenant": "t1"})),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "pageIndex": 2,
                "pageSize": 10,
                "sortModel": [{"colId": "age", "sort": "desc", "sortIndex": 0}],
                "meta": {"tenant": "t1"}
            })
        );
    }

    #[test]
    fn test_result_parses() {
        let result: PageResult<serde_json::Value> =
            serde_json::from_value(json!({"rows": [{"id": 1}], "total": 41})).unwrap();
        assert_eq!(result.total, 41);
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_closure_is_a_fetcher() {
        let fetcher: SharedFetcher<u32> = Arc::new(|request: PageRequest| async move {
            if request.page_index > 0 {
                return Err(FetchError::server("out of range"));
            }
            Ok(PageResult { rows: vec![1u32, 2], total: 2 })
        });

        let first = fetcher
            .fetch(PageRequest {
                page_index: 0,
                page_size: 2,
                sort_model: Vec::new(),
                filter_model: None,
                meta: None,
            })
            .await;
        assert_eq!(first, Ok(PageResult { rows: vec![1, 2], total: 2 }));
    }
}

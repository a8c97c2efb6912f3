//! Grid change events.
//!
//! Every event is delivered as a [`GridEvent`]: the payload, a handle to the
//! grid that raised it, and the click that caused it, if any. Events can be
//! observed three ways: the callbacks in [`GridOptions`](crate::GridOptions),
//! slots connected to the grid's signals, or an [`EventStream`].

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use gridline_core::{Signal, Subscription};

use crate::grid::Grid;
use crate::sort::SortModelItem;

/// Modifier state of the click behind an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClickEvent {
    pub shift_key: bool,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
}

/// An event raised by a grid.
pub struct GridEvent<T, E> {
    /// The grid that raised the event.
    pub api: Grid<T>,
    pub event: E,
    pub original_event: Option<ClickEvent>,
}

impl<T, E: Clone> Clone for GridEvent<T, E> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            event: self.event.clone(),
            original_event: self.original_event,
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for GridEvent<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEvent")
            .field("event", &self.event)
            .field("original_event", &self.original_event)
            .finish_non_exhaustive()
    }
}

/// Payload of sort change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortChange {
    pub sort_model: Vec<SortModelItem>,
}

/// Payload of selection change events: the selected rows in data order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange<T> {
    pub selected: Vec<T>,
}

/// Payload of row click events.
#[derive(Debug, Clone, PartialEq)]
pub struct RowClick<T> {
    pub data: T,
    pub row_index: usize,
}

/// An async stream of events from one signal.
///
/// Events are buffered without bound until polled. Dropping the stream
/// disconnects it; the stream ends when the grid is destroyed.
#[must_use = "streams do nothing unless polled"]
pub struct EventStream<E: Send + 'static> {
    inner: UnboundedReceiverStream<E>,
    _subscription: Subscription<E>,
}

impl<E: Clone + Send + 'static> EventStream<E> {
    pub(crate) fn subscribe(signal: &Arc<Signal<E>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Signal::subscribe(signal, move |event: &E| {
            // A closed receiver means the stream is being dropped.
            let _ = tx.send(event.clone());
        });
        Self {
            inner: UnboundedReceiverStream::new(rx),
            _subscription: subscription,
        }
    }
}

impl<E: Send + 'static> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<E: Send + 'static> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

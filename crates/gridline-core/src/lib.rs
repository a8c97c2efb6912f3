//! Core reactive primitives for gridline.
//!
//! This crate provides the building blocks the grid engines are wired with:
//!
//! - **Signal/Slot System**: Type-safe, synchronous change notification
//! - **Property System**: Versioned values for pull-based memoization
//! - **Runtime**: Cancellable background tasks on a Tokio runtime
//!
//! # Example
//!
//! ```
//! use gridline_core::{Property, Signal};
//!
//! struct Counter {
//!     value: Property<i32>,
//!     value_changed: Signal<i32>,
//! }
//!
//! impl Counter {
//!     fn increment(&self) {
//!         let new_value = self.value.get() + 1;
//!         if self.value.set(new_value) {
//!             self.value_changed.emit(new_value);
//!         }
//!     }
//! }
//!
//! let counter = Counter { value: Property::new(0), value_changed: Signal::new() };
//! counter.value_changed.connect(|v| println!("now {v}"));
//! counter.increment();
//! ```

mod error;
pub mod logging;
pub mod property;
pub mod runtime;
pub mod signal;

pub use error::{CoreError, Result};
pub use property::Property;
pub use runtime::{CancellationToken, TaskHandle, TaskSpawner};
pub use signal::{ConnectionId, Signal, Subscription};

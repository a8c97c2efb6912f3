//! Versioned reactive properties.
//!
//! A [`Property<T>`] wraps a value with change detection and a monotonically
//! increasing version. Derived state (such as the grid's visible rows) keys
//! its cache on the versions of every property it reads, which replaces an
//! automatic dependency graph with explicit, pull-based memoization.
//!
//! # Example
//!
//! ```
//! use gridline_core::property::Property;
//!
//! let prop = Property::new(42);
//! let before = prop.version();
//!
//! assert!(!prop.set(42));
//! assert_eq!(prop.version(), before);
//!
//! assert!(prop.set(100));
//! assert_eq!(prop.get(), 100);
//! assert!(prop.version() > before);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// A reactive property that tracks changes.
///
/// `set()` compares the new value with the current one and only bumps the
/// version when it actually changed. `replace_with()` and `update()` always
/// count as a change, which suits values without a cheap `PartialEq`.
pub struct Property<T> {
    value: RwLock<T>,
    version: AtomicU64,
}

impl<T> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            version: AtomicU64::new(0),
        }
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Mutate the value in place. Always counts as a change.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let result = f(&mut self.value.write());
        self.bump();
        result
    }

    /// Mutate the value in place; the closure reports whether it changed
    /// anything. Only a reported change bumps the version.
    pub fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        let changed = f(&mut self.value.write());
        if changed {
            self.bump();
        }
        changed
    }

    /// Replace the value unconditionally, returning the old one.
    pub fn replace_with(&self, value: T) -> T {
        let old = std::mem::replace(&mut *self.value.write(), value);
        self.bump();
        old
    }

    /// Current version. Starts at 0 and grows on every change.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Mark the value as changed without touching it.
    pub fn touch(&self) {
        self.bump();
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl<T: Clone> Property<T> {
    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    ///
    /// The caller should emit the associated notification signal when this
    /// returns `true`.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            drop(current);
            self.bump();
            true
        } else {
            false
        }
    }
}

impl<T: Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.value.read())
            .field("version", &self.version())
            .finish()
    }
}

static_assertions::assert_impl_all!(Property<Vec<String>>: Send, Sync);

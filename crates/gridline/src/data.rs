//! Row data source.
//!
//! The grid reads rows either from a static collection or from a pushed
//! stream of collections. While a stream is bound its latest emission
//! replaces the rows wholesale (nothing is shown before the first one);
//! unbinding falls back to the static rows.

use gridline_core::logging::targets;
use gridline_core::TaskHandle;

#[derive(Debug)]
pub struct DataSource<T> {
    static_rows: Vec<T>,
    stream: Option<StreamBinding<T>>,
    generation: u64,
}

#[derive(Debug)]
struct StreamBinding<T> {
    generation: u64,
    task: Option<TaskHandle>,
    latest: Vec<T>,
}

impl<T> Default for DataSource<T> {
    fn default() -> Self {
        Self {
            static_rows: Vec::new(),
            stream: None,
            generation: 0,
        }
    }
}

impl<T> DataSource<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            static_rows: rows,
            ..Self::default()
        }
    }

    /// The rows currently in effect.
    pub fn rows(&self) -> &[T] {
        match &self.stream {
            Some(binding) => &binding.latest,
            None => &self.static_rows,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Replaces the static rows. Returns `true` if they are the rows in
    /// effect, i.e. no stream is bound.
    pub fn set_static_rows(&mut self, rows: Vec<T>) -> bool {
        self.static_rows = rows;
        self.stream.is_none()
    }

    /// Starts a new stream binding and returns its generation. Any previous
    /// binding's task is cancelled.
    pub fn begin_stream(&mut self) -> u64 {
        self.end_stream();
        self.generation += 1;
        self.stream = Some(StreamBinding {
            generation: self.generation,
            task: None,
            latest: Vec::new(),
        });
        tracing::debug!(target: targets::DATA, generation = self.generation, "row stream bound");
        self.generation
    }

    /// Records the task forwarding the stream of `generation`.
    ///
    /// If that binding is already gone the task is cancelled right away.
    pub fn attach_task(&mut self, generation: u64, task: TaskHandle) {
        match &mut self.stream {
            Some(binding) if binding.generation == generation => binding.task = Some(task),
            _ => task.cancel(),
        }
    }

    /// Applies one stream emission. Emissions from a replaced or unbound
    /// stream are ignored; returns `true` if the rows were applied.
    pub fn push_stream_rows(&mut self, generation: u64, rows: Vec<T>) -> bool {
        match &mut self.stream {
            Some(binding) if binding.generation == generation => {
                tracing::trace!(target: targets::DATA, rows = rows.len(), "row stream emitted");
                binding.latest = rows;
                true
            }
            _ => false,
        }
    }

    /// Unbinds the stream, cancelling its task. Returns `true` if one was bound.
    pub fn end_stream(&mut self) -> bool {
        match self.stream.take() {
            Some(binding) => {
                if let Some(task) = binding.task {
                    task.cancel();
                }
                tracing::debug!(target: targets::DATA, generation = binding.generation, "row stream unbound");
                true
            }
            None => false,
        }
    }
}

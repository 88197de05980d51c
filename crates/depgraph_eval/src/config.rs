//! Evaluator configuration.

/// Configuration for an [`Evaluator`](crate::Evaluator).
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Label for this evaluator in logs (e.g. `"viewport"`).
    pub label: String,
    /// Run the flush pass before walking the schedule, so tags propagate
    /// downstream along relations. On by default; turn off only when the
    /// caller flushed already.
    pub flush: bool,
}

impl EvalConfig {
    /// Create a config with the given label and flushing enabled.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            flush: true,
        }
    }

    /// Disable the flush pass.
    #[must_use]
    pub fn without_flush(mut self) -> Self {
        self.flush = false;
        self
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self::new("evaluator")
    }
}

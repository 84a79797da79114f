use std::time::Duration;

use super::Item;

/// One item a worker failed to process.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorItem {
    /// The offending item.
    pub item: Item,
    /// Why it failed.
    pub message: String,
}

impl ErrorItem {
    /// Pairs an item with a failure message.
    #[must_use]
    pub fn new(item: Item, message: impl Into<String>) -> Self {
        Self {
            item,
            message: message.into(),
        }
    }
}

/// Outcome of one run-loop tick or one batch within it.
///
/// A tick that processed no batch keeps `iterations == 0`; see
/// [`ResultProcess::is_idle`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultProcess {
    /// Queue or partition label from the worker spec.
    pub queue: String,
    /// Elapsed time.
    pub duration: Duration,
    /// Items handed to `processing`.
    pub total: usize,
    /// Resident memory in bytes when the result was finalised.
    pub memory: u64,
    /// Per-item failures in processing order.
    pub error_items: Vec<ErrorItem>,
    /// Batches processed.
    pub iterations: usize,
    /// Whether the memory ceiling cut the tick short.
    pub backpressure: bool,
}

impl ResultProcess {
    /// Fresh result for `queue`.
    #[must_use]
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Self::default()
        }
    }

    /// Whether no batch was processed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.iterations == 0
    }

    /// Folds one batch's result into the tick total.
    pub fn absorb(&mut self, batch: Self) {
        self.total += batch.total;
        self.error_items.extend(batch.error_items);
        self.iterations += 1;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn absorbing_batches_accumulates_counts() {
        let mut tick = ResultProcess::new("orders");
        assert!(tick.is_idle());

        let mut first = ResultProcess::new("orders");
        first.total = 3;
        first.error_items.push(ErrorItem::new(json!({"id": "a"}), "bad"));
        let mut second = ResultProcess::new("orders");
        second.total = 2;

        tick.absorb(first);
        tick.absorb(second);

        assert_eq!(tick.total, 5);
        assert_eq!(tick.iterations, 2);
        assert_eq!(tick.error_items.len(), 1);
        assert!(!tick.is_idle());
    }
}

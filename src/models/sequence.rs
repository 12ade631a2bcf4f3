//! Order sequence model.
//!
//! An order sequence binds a list of transport orders to a single vehicle:
//! the orders are processed strictly in list order, and no other vehicle may
//! take any of them while the sequence is in progress.

use serde::{Deserialize, Serialize};

/// An ordered list of transport orders processed by one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSequence {
    /// Unique sequence identifier.
    pub id: String,
    /// Transport order IDs in processing order.
    pub orders: Vec<String>,
    /// Index of the first order not yet finished. Equal to `orders.len()`
    /// when every order is done.
    pub next_unfinished: usize,
    /// Whether no further orders will be appended.
    pub complete: bool,
    /// Whether processing has ended (all orders done, or aborted).
    pub finished: bool,
    /// Whether a failed member order aborts the remainder of the sequence.
    pub failure_fatal: bool,
    /// Vehicle currently processing the sequence.
    pub processing_vehicle: Option<String>,
    /// Vehicle that must process the sequence, if constrained.
    pub intended_vehicle: Option<String>,
}

impl OrderSequence {
    /// Creates an empty, open sequence.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            orders: Vec::new(),
            next_unfinished: 0,
            complete: false,
            finished: false,
            failure_fatal: false,
            processing_vehicle: None,
            intended_vehicle: None,
        }
    }

    /// Appends an order to the sequence.
    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.orders.push(order_id.into());
        self
    }

    /// Marks the sequence as complete (no further orders).
    pub fn with_complete(mut self, complete: bool) -> Self {
        self.complete = complete;
        self
    }

    /// Sets whether a member failure aborts the remainder.
    pub fn with_failure_fatal(mut self, failure_fatal: bool) -> Self {
        self.failure_fatal = failure_fatal;
        self
    }

    /// Constrains processing to one specific vehicle.
    pub fn with_intended_vehicle(mut self, vehicle_id: impl Into<String>) -> Self {
        self.intended_vehicle = Some(vehicle_id.into());
        self
    }

    /// The next order to process, if any.
    pub fn next_order(&self) -> Option<&str> {
        if self.finished {
            return None;
        }
        self.orders.get(self.next_unfinished).map(|s| s.as_str())
    }

    /// Whether `order_id` is the order the sequence is waiting on.
    pub fn is_next_order(&self, order_id: &str) -> bool {
        self.next_order() == Some(order_id)
    }

    /// Records that the current order finished; advances the cursor and
    /// finishes the sequence when it was the last order of a complete
    /// sequence.
    pub fn advance(&mut self) {
        if self.next_unfinished < self.orders.len() {
            self.next_unfinished += 1;
        }
        if self.complete && self.next_unfinished >= self.orders.len() {
            self.finished = true;
        }
    }

    /// Aborts the remainder of the sequence.
    pub fn abort(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sequence() -> OrderSequence {
        OrderSequence::new("Seq-1")
            .with_order("TO-1")
            .with_order("TO-2")
            .with_complete(true)
    }

    #[test]
    fn test_next_order() {
        let seq = sample_sequence();
        assert_eq!(seq.next_order(), Some("TO-1"));
        assert!(seq.is_next_order("TO-1"));
        assert!(!seq.is_next_order("TO-2"));
    }

    #[test]
    fn test_advance_finishes_complete_sequence() {
        let mut seq = sample_sequence();
        seq.advance();
        assert_eq!(seq.next_order(), Some("TO-2"));
        assert!(!seq.finished);

        seq.advance();
        assert!(seq.finished);
        assert_eq!(seq.next_order(), None);
    }

    #[test]
    fn test_incomplete_sequence_stays_open() {
        let mut seq = OrderSequence::new("Seq-1").with_order("TO-1");
        seq.advance();
        // More orders may still be appended
        assert!(!seq.finished);
        assert_eq!(seq.next_order(), None);
    }

    #[test]
    fn test_abort() {
        let mut seq = sample_sequence();
        seq.abort();
        assert!(seq.finished);
        assert_eq!(seq.next_order(), None);
    }
}

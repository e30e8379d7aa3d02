//! Incremental line metrics for a live, mutable text buffer
//!
//! Line starts are never stored as absolute offsets. Each line keeps only
//! its weight (byte length) in a sum-aggregated tree, so an edit far from
//! the end shifts every downstream line without rewriting anything, and
//! mutation notifications are coalesced behind a threshold so per-keystroke
//! edits do not reparse anything until a read needs fresh data.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use line_metrics::{Buffer, DocumentMetrics, StorageMonitor};
//!
//! let buffer = Rc::new(Buffer::new(""));
//! let metrics = Rc::new(RefCell::new(DocumentMetrics::new(buffer.clone())));
//! let monitor: Rc<RefCell<dyn StorageMonitor>> = metrics.clone();
//! buffer.add_monitor(Rc::downgrade(&monitor));
//!
//! buffer.replace_range(0..0, "abc\ndef\n");
//! assert_eq!(metrics.borrow_mut().line_count(), 2);
//! assert_eq!(metrics.borrow_mut().line(1).unwrap().range, 4..8);
//! ```

pub mod batch;
pub mod list;
pub mod metrics;
pub mod parse;
pub mod storage;

pub use batch::{BatchConfig, MutationBatcher, RangeMutation};
pub use list::{Entry, Record, RelativeList};
pub use metrics::{DocumentMetrics, Line};
pub use parse::{LineParser, LineValue};
pub use storage::{Buffer, StorageMonitor, TextContent};

use thiserror::Error;

/// Recoverable caller errors from index queries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("line index {index} out of bounds (line count {count})")]
    OutOfBounds { index: usize, count: usize },
}

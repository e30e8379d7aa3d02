//! Mutation coalescing behind a minimum-delta threshold
//!
//! Editors emit one mutation per keystroke; reparsing on each would stall
//! input. The batcher folds consecutive mutations into a single pending
//! net range+delta and hands it out only once the accumulated magnitude
//! crosses the configured threshold, or when a read forces it out early.

use std::ops::Range;

use tracing::{debug, trace};

/// Shift an offset by a signed delta, pinned at zero
#[inline]
pub(crate) fn shift(offset: usize, delta: isize) -> usize {
    offset.saturating_add_signed(delta)
}

// === Core Types ===

/// A single applied edit: the replaced range in pre-edit coordinates plus
/// the length delta it caused
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeMutation {
    pub range: Range<usize>,
    pub delta: isize,
    /// Pre-edit buffer length, when the producer knows it
    pub limit: Option<usize>,
}

impl RangeMutation {
    pub fn new(range: Range<usize>, delta: isize) -> Self {
        Self {
            range,
            delta,
            limit: None,
        }
    }

    pub fn with_limit(range: Range<usize>, delta: isize, limit: usize) -> Self {
        Self {
            range,
            delta,
            limit: Some(limit),
        }
    }

    /// Highest offset still reachable once everything from `range.end`
    /// onward has shifted by `delta`
    pub fn post_apply_limit(&self) -> usize {
        shift(self.limit.unwrap_or(self.range.end), self.delta)
    }
}

/// Batching policy knobs
#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    /// Accumulated magnitude that forces a flush; 0 flushes on every edit
    pub minimum_delta: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { minimum_delta: 1024 }
    }
}

/// The coalesced net mutation accumulated since the last flush
#[derive(Clone, Debug)]
struct PendingWindow {
    range: Range<usize>,
    delta: isize,
    magnitude: usize,
}

impl PendingWindow {
    fn open(mutation: &RangeMutation) -> Self {
        Self {
            range: mutation.range.clone(),
            delta: mutation.delta,
            magnitude: magnitude_of(mutation),
        }
    }

    /// Fold one more applied mutation into the window
    ///
    /// The incoming range is in coordinates that already include every
    /// previously merged delta, so it is translated back into the window's
    /// space before taking the union.
    fn merge(&mut self, mutation: &RangeMutation) {
        let start = self.translate(mutation.range.start);
        let end = self.translate(mutation.range.end);

        self.range = self.range.start.min(start)..self.range.end.max(end);
        self.delta += mutation.delta;
        self.magnitude += magnitude_of(mutation);
    }

    fn translate(&self, offset: usize) -> usize {
        if offset < self.range.start {
            offset
        } else {
            shift(offset, -self.delta).max(self.range.start)
        }
    }
}

fn magnitude_of(mutation: &RangeMutation) -> usize {
    mutation.range.len() + mutation.delta.unsigned_abs()
}

/// Threshold-gated accumulator over buffer mutation notifications
pub struct MutationBatcher {
    config: BatchConfig,
    pending: Option<PendingWindow>,
}

impl MutationBatcher {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    /// Pre-edit bracket; establishes the coordinate baseline only
    pub fn will_apply(&mut self, _mutations: &[RangeMutation]) {}

    /// Merge an applied batch; returns the coalesced effective change when
    /// the accumulated magnitude has crossed the threshold
    ///
    /// The threshold check runs once per batch rather than per mutation:
    /// the buffer already reflects the whole batch by the time this runs,
    /// so a mid-batch flush would hand out coordinates the buffer content
    /// no longer matches.
    pub fn did_apply(&mut self, mutations: &[RangeMutation]) -> Option<RangeMutation> {
        for mutation in mutations {
            match &mut self.pending {
                Some(window) => window.merge(mutation),
                None => self.pending = Some(PendingWindow::open(mutation)),
            }
            trace!(
                start = mutation.range.start,
                end = mutation.range.end,
                delta = mutation.delta,
                "coalesced mutation"
            );
        }

        let over = self
            .pending
            .as_ref()
            .is_some_and(|window| window.magnitude > self.config.minimum_delta);
        if over {
            self.flush()
        } else {
            None
        }
    }

    /// Flush regardless of threshold; `None` when nothing is pending
    pub fn force_flush(&mut self) -> Option<RangeMutation> {
        self.flush()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn flush(&mut self) -> Option<RangeMutation> {
        let window = self.pending.take()?;
        debug!(
            start = window.range.start,
            end = window.range.end,
            delta = window.delta,
            magnitude = window.magnitude,
            "flushing coalesced window"
        );
        Some(RangeMutation::new(window.range, window.delta))
    }
}

//! Line metrics engine: batched invalidation, minimal re-extraction, splice
//!
//! Subscribes to storage mutation notifications, coalesces them through the
//! batcher, and on flush re-parses only the run of lines the net change
//! could have touched. Queries force a flush first, so they always observe
//! an index consistent with every applied edit.

use std::ops::Range;
use std::rc::Rc;

use tracing::debug;

use crate::batch::{shift, BatchConfig, MutationBatcher, RangeMutation};
use crate::list::RelativeList;
use crate::parse::{LineParser, LineValue};
use crate::storage::{StorageMonitor, TextContent};
use crate::MetricsError;

/// One line of the document as currently indexed
///
/// A read-only projection; its range covers the terminator, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub index: usize,
    pub range: Range<usize>,
    pub whitespace_only: bool,
}

/// Incremental line index over a storage the engine never mutates
pub struct DocumentMetrics {
    content: Rc<dyn TextContent>,
    parser: LineParser,
    lines: RelativeList<LineValue>,
    batcher: MutationBatcher,
}

impl DocumentMetrics {
    /// Index `content` with the default batching policy
    pub fn new(content: Rc<dyn TextContent>) -> Self {
        Self::with_config(content, BatchConfig::default())
    }

    /// Index `content`, treating any existing text as one initial insertion
    pub fn with_config(content: Rc<dyn TextContent>, config: BatchConfig) -> Self {
        let mut metrics = Self {
            content,
            parser: LineParser,
            lines: RelativeList::new(),
            batcher: MutationBatcher::new(config),
        };

        let length = metrics.content.length();
        if length > 0 {
            metrics.apply_change(RangeMutation::new(0..0, length as isize));
        }
        metrics
    }

    /// The line at `index`, flushing any pending mutations first
    pub fn line(&mut self, index: usize) -> Result<Line, MetricsError> {
        self.flush_pending();

        let entry = self.lines.get(index)?;
        Ok(Line {
            index,
            range: entry.dependency..entry.dependency + entry.weight,
            whitespace_only: entry.value.whitespace_only,
        })
    }

    /// Number of indexed lines, flushing any pending mutations first
    pub fn line_count(&mut self) -> usize {
        self.flush_pending();
        self.lines.len()
    }

    /// True while coalesced mutations have not yet been folded in
    pub fn is_pending(&self) -> bool {
        self.batcher.is_pending()
    }

    fn flush_pending(&mut self) {
        if let Some(change) = self.batcher.force_flush() {
            self.apply_change(change);
        }
    }

    /// Fold one coalesced effective change into the index
    ///
    /// The affected region is widened to the nearest stable line starts on
    /// both sides: an edit can merge or split lines, so re-extracting only
    /// the literal edited bytes would miss content that changed lines.
    fn apply_change(&mut self, change: RangeMutation) {
        // Index coverage equals the pre-edit buffer length, which bounds
        // post-edit extraction.
        let mutation = RangeMutation::with_limit(change.range, change.delta, self.lines.total_weight());
        let limit = mutation.post_apply_limit();
        let range = mutation.range;
        let delta = mutation.delta;

        let lower = self.lines.last_index_where(|dependency| dependency <= range.start);
        let upper = self.lines.first_index_where(|dependency| dependency > range.end);

        let lower_read = lower.and_then(|index| self.lines.dependency(index)).unwrap_or(0);
        let upper_read = upper
            .and_then(|index| self.lines.dependency(index))
            .map(|dependency| shift(dependency, delta).min(limit))
            .unwrap_or(limit);

        let affected = lower_read..upper_read;
        let Some(text) = self.content.substring(affected.clone()) else {
            panic!(
                "line index desynchronized from storage: cannot read {}..{} (storage length {})",
                affected.start,
                affected.end,
                self.content.length()
            );
        };

        let records = self.parser.split(&text);
        debug!(
            start = affected.start,
            end = affected.end,
            lines = records.len(),
            "resplicing affected region"
        );

        let splice_range = lower.unwrap_or(0)..upper.unwrap_or(self.lines.len());
        self.lines.splice(splice_range, records);

        debug_assert_eq!(self.lines.total_weight(), self.content.length());
    }
}

impl StorageMonitor for DocumentMetrics {
    fn will_apply(&mut self, mutations: &[RangeMutation]) {
        self.batcher.will_apply(mutations);
    }

    fn did_apply(&mut self, mutations: &[RangeMutation]) {
        if let Some(change) = self.batcher.did_apply(mutations) {
            self.apply_change(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Buffer;

    /// Engine over a buffer, with notifications driven by hand
    fn metrics_over(text: &str) -> (Rc<Buffer>, DocumentMetrics) {
        let buffer = Rc::new(Buffer::new(text));
        let metrics = DocumentMetrics::new(buffer.clone());
        (buffer, metrics)
    }

    fn edit(buffer: &Rc<Buffer>, metrics: &mut DocumentMetrics, range: Range<usize>, replacement: &str) {
        let delta = replacement.len() as isize - range.len() as isize;
        let mutations = [RangeMutation::new(range.clone(), delta)];
        metrics.will_apply(&mutations);
        buffer.replace_range(range, replacement);
        metrics.did_apply(&mutations);
    }

    #[test]
    fn initial_content_is_indexed() {
        let (_buffer, mut metrics) = metrics_over("abc\ndef\n");
        assert_eq!(metrics.line_count(), 2);

        let first = metrics.line(0).unwrap();
        assert_eq!(first.range, 0..4);
        assert!(!first.whitespace_only);

        let second = metrics.line(1).unwrap();
        assert_eq!(second.range, 4..8);
        assert!(!second.whitespace_only);
    }

    #[test]
    fn empty_content_has_no_lines() {
        let (_buffer, mut metrics) = metrics_over("");
        assert_eq!(metrics.line_count(), 0);
        assert_eq!(
            metrics.line(0),
            Err(MetricsError::OutOfBounds { index: 0, count: 0 })
        );
    }

    #[test]
    fn out_of_bounds_is_recoverable() {
        let (buffer, mut metrics) = metrics_over("abc");
        assert!(metrics.line(5).is_err());
        // Engine state is intact afterwards
        assert_eq!(metrics.line_count(), 1);
        edit(&buffer, &mut metrics, 3..3, "\nx");
        assert_eq!(metrics.line_count(), 2);
    }

    #[test]
    fn inserting_a_terminator_splits_a_line() {
        let (buffer, mut metrics) = metrics_over("abcd");
        edit(&buffer, &mut metrics, 1..1, "\n");

        assert_eq!(metrics.line_count(), 2);
        assert_eq!(metrics.line(0).unwrap().range, 0..2);
        assert_eq!(metrics.line(1).unwrap().range, 2..5);
    }

    #[test]
    fn deleting_a_terminator_joins_lines() {
        let (buffer, mut metrics) = metrics_over("ab\ncd");
        edit(&buffer, &mut metrics, 2..3, "");

        assert_eq!(metrics.line_count(), 1);
        let line = metrics.line(0).unwrap();
        assert_eq!(line.range, 0..4);
        assert!(!line.whitespace_only);
    }

    #[test]
    fn whitespace_flag_tracks_edits() {
        let (buffer, mut metrics) = metrics_over("  x\n");
        assert!(!metrics.line(0).unwrap().whitespace_only);

        edit(&buffer, &mut metrics, 2..3, " ");
        let line = metrics.line(0).unwrap();
        assert_eq!(line.range, 0..4);
        assert!(line.whitespace_only);
    }

    #[test]
    fn edit_inside_middle_line_leaves_neighbors_alone() {
        let (buffer, mut metrics) = metrics_over("abc\ndef\nghi");
        edit(&buffer, &mut metrics, 5..5, "X");

        assert_eq!(metrics.line_count(), 3);
        assert_eq!(metrics.line(0).unwrap().range, 0..4);
        assert_eq!(metrics.line(1).unwrap().range, 4..9);
        assert_eq!(metrics.line(2).unwrap().range, 9..12);
    }

    #[test]
    fn deletion_spanning_lines() {
        let (buffer, mut metrics) = metrics_over("aa\nbb\ncc");
        edit(&buffer, &mut metrics, 1..5, "");

        assert_eq!(metrics.line_count(), 2);
        assert_eq!(metrics.line(0).unwrap().range, 0..2);
        assert_eq!(metrics.line(1).unwrap().range, 2..4);
    }

    #[test]
    fn tail_edit_with_no_following_line() {
        let (buffer, mut metrics) = metrics_over("aa\nbb");
        edit(&buffer, &mut metrics, 4..5, "");
        edit(&buffer, &mut metrics, 3..4, "");

        // The whole trailing line is gone; no empty record is left behind
        assert_eq!(metrics.line_count(), 1);
        assert_eq!(metrics.line(0).unwrap().range, 0..3);
    }

    #[test]
    fn queries_are_idempotent_without_edits() {
        let (_buffer, mut metrics) = metrics_over("one\ntwo\n");
        let first = metrics.line(1).unwrap();
        assert_eq!(metrics.line_count(), 2);
        assert_eq!(metrics.line(1).unwrap(), first);
        assert_eq!(metrics.line_count(), 2);
    }
}

//! Text storage boundary and a reference string-backed implementation
//!
//! The metrics engine only ever reads content; edits reach it through the
//! monitor bracket. Monitors are held weakly so a registration never keeps
//! an engine alive past its own lifetime.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Weak;

use crate::batch::RangeMutation;

/// Read-only content access
pub trait TextContent {
    /// Current length in bytes
    fn length(&self) -> usize;

    /// Byte-range substring; `None` when the range lies outside current
    /// content or cuts a character in half
    fn substring(&self, range: Range<usize>) -> Option<String>;
}

/// Observer bracket around every batch of storage edits
///
/// Mutations carry pre-edit coordinates and are delivered in the exact
/// order they were applied; reordering them corrupts downstream coordinate
/// translation.
pub trait StorageMonitor {
    fn will_apply(&mut self, mutations: &[RangeMutation]);
    fn did_apply(&mut self, mutations: &[RangeMutation]);
}

/// String-backed storage with a weak monitor registry
///
/// Content is never mutably borrowed while monitors run, so a monitor may
/// re-enter `substring`/`length` from inside `did_apply`.
#[derive(Default)]
pub struct Buffer {
    text: RefCell<String>,
    monitors: RefCell<Vec<Weak<RefCell<dyn StorageMonitor>>>>,
}

impl Buffer {
    pub fn new(text: &str) -> Self {
        Self {
            text: RefCell::new(text.to_string()),
            monitors: RefCell::new(Vec::new()),
        }
    }

    /// Register a monitor; dead handles are pruned on the next notification
    pub fn add_monitor(&self, monitor: Weak<RefCell<dyn StorageMonitor>>) {
        self.monitors.borrow_mut().push(monitor);
    }

    /// Number of live registered monitors
    pub fn monitor_count(&self) -> usize {
        self.monitors
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Replace a byte range (on character boundaries) with new text,
    /// notifying monitors before and after the edit takes effect
    pub fn replace_range(&self, range: Range<usize>, replacement: &str) {
        let delta = replacement.len() as isize - range.len() as isize;
        let mutations = [RangeMutation::new(range.clone(), delta)];

        self.notify(|monitor| monitor.will_apply(&mutations));
        self.text.borrow_mut().replace_range(range, replacement);
        self.notify(|monitor| monitor.did_apply(&mutations));
    }

    pub fn insert(&self, offset: usize, text: &str) {
        self.replace_range(offset..offset, text);
    }

    pub fn delete(&self, range: Range<usize>) {
        self.replace_range(range, "");
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn notify<F>(&self, mut f: F)
    where
        F: FnMut(&mut dyn StorageMonitor),
    {
        // Upgrade outside the registry borrow so a monitor can register
        // others or read content while it runs
        let mut handles = Vec::new();
        self.monitors.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(strong) => {
                handles.push(strong);
                true
            }
            None => false,
        });

        for handle in handles {
            f(&mut *handle.borrow_mut());
        }
    }
}

impl TextContent for Buffer {
    fn length(&self) -> usize {
        self.text.borrow().len()
    }

    fn substring(&self, range: Range<usize>) -> Option<String> {
        self.text.borrow().get(range).map(str::to_string)
    }
}

//! Work groups: items sharing an operator tag, executed together

use tracing::{debug, trace};

use crate::config::EvalConfig;
use super::item::{Kernel, OpTag, WorkItem};
use super::plan::ExecutedItem;

/// Execution strategy for the items of one operator family.
pub trait EvalGroup: Send {
    fn tag(&self) -> OpTag;

    fn push(&mut self, item: WorkItem);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued item, appending each to `executed` once this group
    /// has populated its output buffer. Items whose output is already
    /// populated are skipped and not reported.
    fn eval(&mut self, config: &EvalConfig, executed: &mut Vec<ExecutedItem>);
}

/// Runs each item's kernel independently, in insertion order.
pub struct TrivialEvalGroup {
    tag: OpTag,
    kernel: Kernel,
    items: Vec<WorkItem>,
}

impl TrivialEvalGroup {
    pub fn new(tag: OpTag, kernel: Kernel) -> Self {
        Self {
            tag,
            kernel,
            items: Vec::new(),
        }
    }
}

impl EvalGroup for TrivialEvalGroup {
    fn tag(&self) -> OpTag {
        self.tag
    }

    fn push(&mut self, item: WorkItem) {
        debug_assert_eq!(item.tag(), self.tag);
        self.items.push(item);
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn eval(&mut self, config: &EvalConfig, executed: &mut Vec<ExecutedItem>) {
        for item in self.items.drain(..) {
            assert!(item.device().is_cpu(), "{} kernels only run on the cpu", self.tag);
            if config.verify_inputs {
                for input in item.inputs() {
                    assert!(
                        input.is_evaluated(),
                        "{} item {} scheduled before its input {}",
                        self.tag,
                        item.output_id(),
                        input.id()
                    );
                }
            }

            // Another context may have produced the same buffer already.
            if item.output().is_evaluated() {
                debug!(
                    tag = %self.tag,
                    output = %item.output_id(),
                    "output already populated"
                );
                continue;
            }
            let result = (self.kernel)(&item);
            debug_assert_eq!(result.shape(), item.output_shape());
            if !item.output().try_set_data(result) {
                debug!(
                    tag = %self.tag,
                    output = %item.output_id(),
                    "output populated concurrently"
                );
                continue;
            }

            if config.trace_items {
                trace!(tag = %self.tag, output = %item.output_id(), "executed work item");
            }
            executed.push(ExecutedItem {
                tag: self.tag,
                output: item.output_id(),
            });
        }
    }
}

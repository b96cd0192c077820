//! Per-device evaluation plan
//!
//! Items are registered while an expression graph is walked depth-first, so
//! every producer is registered before its consumers. The plan keeps at most
//! one item per output buffer and places each item one layer past the deepest
//! of its still-pending inputs. A flush runs layers in order, the groups of a
//! layer in the order their tags first appeared, and each group's items in
//! insertion order, then returns the plan to empty.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EvalConfig;
use crate::error::{KilnError, KilnResult};
use crate::tensor::Device;
use super::buffer::BufferId;
use super::group::EvalGroup;
use super::item::{OpTag, WorkItem};

/// One executed item, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedItem {
    pub tag: OpTag,
    pub output: BufferId,
}

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub executed: Vec<ExecutedItem>,
    pub layers: usize,
}

impl FlushReport {
    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }

    /// Number of executed items carrying `tag`.
    pub fn count(&self, tag: OpTag) -> usize {
        self.executed.iter().filter(|item| item.tag == tag).count()
    }

    pub fn per_tag(&self) -> BTreeMap<OpTag, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.executed {
            *counts.entry(item.tag).or_insert(0) += 1;
        }
        counts
    }

    /// Execution position of the item that wrote `output`.
    pub fn position(&self, output: BufferId) -> Option<usize> {
        self.executed.iter().position(|item| item.output == output)
    }

    pub fn merge(&mut self, other: FlushReport) {
        self.executed.extend(other.executed);
        self.layers = self.layers.max(other.layers);
    }

    pub fn to_json(&self) -> KilnResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Default)]
struct EvalLayer {
    groups: Vec<Box<dyn EvalGroup>>,
}

impl EvalLayer {
    fn group_mut(&mut self, tag: OpTag) -> Option<&mut Box<dyn EvalGroup>> {
        self.groups.iter_mut().find(|group| group.tag() == tag)
    }
}

/// Registry and queue of pending work for one device.
pub struct EvalPlan {
    device: Device,
    config: EvalConfig,
    registered: HashMap<BufferId, usize>,
    layers: Vec<EvalLayer>,
}

impl EvalPlan {
    pub fn new(device: Device, config: EvalConfig) -> Self {
        Self {
            device,
            config,
            registered: HashMap::new(),
            layers: Vec::new(),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Whether an item writing `output` is already queued.
    pub fn is_registered(&self, output: BufferId) -> bool {
        self.registered.contains_key(&output)
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Queue `item`, creating its work group with `make_group` if this is the
    /// first item of its tag in its layer.
    ///
    /// Returns `false` when an item for the same output buffer is already
    /// queued; the new item is dropped since the queued one produces the
    /// same buffer.
    pub fn register<F>(&mut self, item: WorkItem, make_group: F) -> KilnResult<bool>
    where
        F: FnOnce() -> Box<dyn EvalGroup>,
    {
        if item.device() != self.device {
            return Err(KilnError::DeviceError(format!(
                "{} item for a {} buffer registered in the {} plan",
                item.tag(),
                item.device(),
                self.device
            )));
        }

        let output = item.output_id();
        if self.is_registered(output) {
            debug!(tag = %item.tag(), %output, "work item already registered");
            return Ok(false);
        }

        let layer = item
            .input_ids()
            .filter_map(|input| self.registered.get(&input))
            .max()
            .map_or(0, |deepest| deepest + 1);
        if self.layers.len() <= layer {
            self.layers.resize_with(layer + 1, EvalLayer::default);
        }

        let tag = item.tag();
        let slot = &mut self.layers[layer];
        match slot.group_mut(tag) {
            Some(group) => group.push(item),
            None => {
                let mut group = make_group();
                debug_assert_eq!(group.tag(), tag);
                group.push(item);
                slot.groups.push(group);
            }
        }
        self.registered.insert(output, layer);
        debug!(%tag, %output, layer, "registered work item");
        Ok(true)
    }

    /// Execute every pending item and return the plan to empty.
    pub fn flush(&mut self) -> FlushReport {
        let layers = std::mem::take(&mut self.layers);
        let pending = self.registered.len();
        self.registered.clear();

        let mut report = FlushReport {
            executed: Vec::with_capacity(pending),
            layers: layers.len(),
        };
        for mut layer in layers {
            for group in layer.groups.iter_mut() {
                group.eval(&self.config, &mut report.executed);
            }
        }
        debug_assert!(report.executed.len() <= pending);

        if !report.is_empty() {
            info!(
                device = %self.device,
                items = report.len(),
                layers = report.layers,
                "flushed evaluation plan"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::evaluate::buffer::MemoBuffer;
    use crate::evaluate::group::TrivialEvalGroup;
    use crate::evaluate::item::AuxParams;
    use crate::tensor::{Shape, Tensor};

    fn increment(item: &WorkItem) -> Tensor {
        let input = item.input(0).data();
        Tensor::scalar(input.as_slice()[0] + 1.0)
    }

    fn unary(tag: OpTag, input: &Arc<MemoBuffer>, output: &Arc<MemoBuffer>) -> WorkItem {
        WorkItem::new(
            tag,
            Device::Cpu,
            vec![input.const_handle()],
            output.handle(),
            Shape::scalar(),
            AuxParams::None,
        )
    }

    fn group(tag: OpTag) -> impl FnOnce() -> Box<dyn EvalGroup> {
        move || -> Box<dyn EvalGroup> { Box::new(TrivialEvalGroup::new(tag, increment)) }
    }

    #[test]
    fn test_deduplicates_by_output() {
        let mut plan = EvalPlan::new(Device::Cpu, EvalConfig::default());
        let a = MemoBuffer::populated(Tensor::scalar(0.0));
        let b = MemoBuffer::new();

        assert!(plan.register(unary(OpTag::Tanh, &a, &b), group(OpTag::Tanh)).unwrap());
        assert!(!plan.register(unary(OpTag::Tanh, &a, &b), group(OpTag::Tanh)).unwrap());
        assert_eq!(plan.len(), 1);
        assert!(plan.is_registered(b.id()));

        let report = plan.flush();
        assert_eq!(report.len(), 1);
        assert!(plan.is_empty());
        assert_eq!(b.const_handle().data().value(), Some(1.0));
    }

    #[test]
    fn test_same_tag_chain_respects_dependencies() {
        // a -> b (tanh) -> c (collapse) -> d (tanh): the two tanh items share
        // a tag but must not run in one batch.
        let mut plan = EvalPlan::new(Device::Cpu, EvalConfig::default());
        let a = MemoBuffer::populated(Tensor::scalar(0.0));
        let b = MemoBuffer::new();
        let c = MemoBuffer::new();
        let d = MemoBuffer::new();

        plan.register(unary(OpTag::Tanh, &a, &b), group(OpTag::Tanh)).unwrap();
        plan.register(unary(OpTag::Collapse, &b, &c), group(OpTag::Collapse)).unwrap();
        plan.register(unary(OpTag::Tanh, &c, &d), group(OpTag::Tanh)).unwrap();

        let report = plan.flush();
        assert_eq!(report.layers, 3);
        assert_eq!(
            report.executed.iter().map(|e| e.output).collect::<Vec<_>>(),
            vec![b.id(), c.id(), d.id()]
        );
        assert_eq!(d.const_handle().data().value(), Some(3.0));
        assert_eq!(report.count(OpTag::Tanh), 2);
        assert_eq!(report.per_tag().get(&OpTag::Collapse), Some(&1));
    }

    #[test]
    fn test_groups_independent_items_by_tag() {
        let mut plan = EvalPlan::new(Device::Cpu, EvalConfig::default());
        let a = MemoBuffer::populated(Tensor::scalar(0.0));
        let outputs: Vec<_> = (0..3).map(|_| MemoBuffer::new()).collect();

        plan.register(unary(OpTag::Tanh, &a, &outputs[0]), group(OpTag::Tanh)).unwrap();
        plan.register(unary(OpTag::Collapse, &a, &outputs[1]), group(OpTag::Collapse)).unwrap();
        plan.register(unary(OpTag::Tanh, &a, &outputs[2]), group(OpTag::Tanh)).unwrap();

        let report = plan.flush();
        assert_eq!(report.layers, 1);
        let order: Vec<_> = report.executed.iter().map(|e| e.output).collect();
        assert_eq!(order, vec![outputs[0].id(), outputs[2].id(), outputs[1].id()]);
    }

    #[test]
    fn test_empty_flush() {
        let mut plan = EvalPlan::new(Device::Cpu, EvalConfig::default());
        let report = plan.flush();
        assert!(report.is_empty());
        assert_eq!(report.layers, 0);
        assert_eq!(report.to_json().unwrap(), r#"{"executed":[],"layers":0}"#);
    }
}

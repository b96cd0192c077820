//! Deferred units of work

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tensor::{Device, Shape, Tensor};
use super::buffer::{BufferId, ConstHandle, Handle};

/// Identity of an operator family. Every item of one family shares a tag,
/// and plans group items by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpTag {
    Subtract,
    SubtractFromNum,
    SubtractNum,
    Multiply,
    MultiplyNum,
    Tanh,
    TanhGrad,
    Collapse,
    Duplicate,
}

impl OpTag {
    pub const fn name(&self) -> &'static str {
        match self {
            OpTag::Subtract => "subtract",
            OpTag::SubtractFromNum => "subtract_from_num",
            OpTag::SubtractNum => "subtract_num",
            OpTag::Multiply => "multiply",
            OpTag::MultiplyNum => "multiply_num",
            OpTag::Tanh => "tanh",
            OpTag::TanhGrad => "tanh_grad",
            OpTag::Collapse => "collapse",
            OpTag::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator parameters that are not operands.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxParams {
    None,
    Number(f64),
    Shape(Shape),
}

impl AuxParams {
    pub fn number(&self) -> Option<f64> {
        match self {
            AuxParams::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<&Shape> {
        match self {
            AuxParams::Shape(shape) => Some(shape),
            _ => None,
        }
    }
}

/// Computes one item's result from its (already populated) inputs.
pub type Kernel = fn(&WorkItem) -> Tensor;

/// One deferred computation: the handles it reads, the handle it writes and
/// any auxiliary parameters. Built once, executed once.
#[derive(Debug)]
pub struct WorkItem {
    tag: OpTag,
    device: Device,
    inputs: Vec<ConstHandle>,
    output: Handle,
    output_shape: Shape,
    aux: AuxParams,
}

impl WorkItem {
    pub fn new(
        tag: OpTag,
        device: Device,
        inputs: Vec<ConstHandle>,
        output: Handle,
        output_shape: Shape,
        aux: AuxParams,
    ) -> Self {
        Self {
            tag,
            device,
            inputs,
            output,
            output_shape,
            aux,
        }
    }

    pub fn tag(&self) -> OpTag {
        self.tag
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn inputs(&self) -> &[ConstHandle] {
        &self.inputs
    }

    /// The `index`-th input handle.
    ///
    /// # Panics
    ///
    /// If the item has fewer inputs; kernels only ask for the arity their
    /// operator was built with.
    pub fn input(&self, index: usize) -> &ConstHandle {
        &self.inputs[index]
    }

    pub fn input_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.inputs.iter().map(ConstHandle::id)
    }

    pub fn output(&self) -> &Handle {
        &self.output
    }

    pub fn output_id(&self) -> BufferId {
        self.output.id()
    }

    pub fn output_shape(&self) -> &Shape {
        &self.output_shape
    }

    pub fn aux(&self) -> &AuxParams {
        &self.aux
    }
}

//! Immutable expression nodes
//!
//! An [`Expr`] is a cheap, shareable handle onto one operator application.
//! Cloning an expression shares the node (and therefore its memo buffer), so
//! a sub-expression used by several parents is materialized once.

use std::fmt;
use std::sync::Arc;

use crate::error::{KilnError, KilnResult};
use crate::evaluate::buffer::{BufferId, ConstHandle, MemoBuffer};
use crate::evaluate::item::{AuxParams, OpTag, WorkItem};
use crate::evaluate::plan::EvalPlan;
use crate::tensor::{Device, Shape, Tensor};
use super::registry;

/// The operator a node applies, together with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// A leaf wrapping an already materialized value.
    Input,
    Subtract(Expr, Expr),
    SubtractFromNum { minuend: f64, operand: Expr },
    SubtractNum { operand: Expr, subtrahend: f64 },
    Multiply(Expr, Expr),
    MultiplyNum { operand: Expr, factor: f64 },
    Tanh(Expr),
    /// `grad * (1 - output^2)`, where `output` is the result of a tanh.
    TanhGrad { grad: Expr, output: Expr },
    Collapse(Expr),
    Duplicate(Expr),
}

impl Operator {
    /// Work-group tag; leaves have none since they never enqueue work.
    pub fn tag(&self) -> Option<OpTag> {
        let tag = match self {
            Operator::Input => return None,
            Operator::Subtract(..) => OpTag::Subtract,
            Operator::SubtractFromNum { .. } => OpTag::SubtractFromNum,
            Operator::SubtractNum { .. } => OpTag::SubtractNum,
            Operator::Multiply(..) => OpTag::Multiply,
            Operator::MultiplyNum { .. } => OpTag::MultiplyNum,
            Operator::Tanh(_) => OpTag::Tanh,
            Operator::TanhGrad { .. } => OpTag::TanhGrad,
            Operator::Collapse(_) => OpTag::Collapse,
            Operator::Duplicate(_) => OpTag::Duplicate,
        };
        Some(tag)
    }

    /// Operands in the order their handles are passed to the kernel.
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Operator::Input => Vec::new(),
            Operator::Subtract(lhs, rhs) | Operator::Multiply(lhs, rhs) => vec![lhs, rhs],
            Operator::SubtractFromNum { operand, .. }
            | Operator::SubtractNum { operand, .. }
            | Operator::MultiplyNum { operand, .. }
            | Operator::Tanh(operand)
            | Operator::Collapse(operand)
            | Operator::Duplicate(operand) => vec![operand],
            Operator::TanhGrad { grad, output } => vec![grad, output],
        }
    }

    fn into_operands(self) -> Vec<Expr> {
        match self {
            Operator::Input => Vec::new(),
            Operator::Subtract(lhs, rhs) | Operator::Multiply(lhs, rhs) => vec![lhs, rhs],
            Operator::SubtractFromNum { operand, .. }
            | Operator::SubtractNum { operand, .. }
            | Operator::MultiplyNum { operand, .. }
            | Operator::Tanh(operand)
            | Operator::Collapse(operand)
            | Operator::Duplicate(operand) => vec![operand],
            Operator::TanhGrad { grad, output } => vec![grad, output],
        }
    }

    fn aux(&self, shape: &Shape) -> AuxParams {
        match self {
            Operator::SubtractFromNum { minuend, .. } => AuxParams::Number(*minuend),
            Operator::SubtractNum { subtrahend, .. } => AuxParams::Number(*subtrahend),
            Operator::MultiplyNum { factor, .. } => AuxParams::Number(*factor),
            Operator::Collapse(_) | Operator::Duplicate(_) => AuxParams::Shape(shape.clone()),
            _ => AuxParams::None,
        }
    }
}

#[derive(Debug)]
struct ExprNode {
    op: Operator,
    shape: Shape,
    device: Device,
    buffer: Arc<MemoBuffer>,
}

/// Unlinks uniquely owned operands iteratively; the default drop glue would
/// recurse once per node of a chain.
impl Drop for ExprNode {
    fn drop(&mut self) {
        let op = std::mem::replace(&mut self.op, Operator::Input);
        let mut orphans = op.into_operands();
        while let Some(expr) = orphans.pop() {
            if let Ok(mut node) = Arc::try_unwrap(expr.node) {
                let op = std::mem::replace(&mut node.op, Operator::Input);
                orphans.extend(op.into_operands());
            }
        }
    }
}

/// A node in a lazily evaluated expression graph.
#[derive(Clone)]
pub struct Expr {
    node: Arc<ExprNode>,
}

impl Expr {
    /// Leaf node over an existing value. Its buffer is populated from the start.
    pub fn input(value: Tensor) -> Self {
        let shape = value.shape().clone();
        let device = value.device();
        Self {
            node: Arc::new(ExprNode {
                op: Operator::Input,
                shape,
                device,
                buffer: MemoBuffer::populated(value),
            }),
        }
    }

    /// Build an operator node. Legality must already have been checked.
    pub(crate) fn from_op(op: Operator, shape: Shape, device: Device) -> Self {
        debug_assert!(op.operands().iter().all(|operand| operand.device() == device));
        Self {
            node: Arc::new(ExprNode {
                op,
                shape,
                device,
                buffer: MemoBuffer::new(),
            }),
        }
    }

    pub fn op(&self) -> &Operator {
        &self.node.op
    }

    pub fn shape(&self) -> &Shape {
        &self.node.shape
    }

    pub fn device(&self) -> Device {
        self.node.device
    }

    pub fn buffer_id(&self) -> BufferId {
        self.node.buffer.id()
    }

    pub fn is_evaluated(&self) -> bool {
        self.node.buffer.is_evaluated()
    }

    /// Read handle onto this node's buffer. Never computes anything.
    pub fn handle(&self) -> ConstHandle {
        self.node.buffer.const_handle()
    }

    /// Enqueue the work needed to materialize this node into `plan`.
    ///
    /// Operands are registered first, depth-first, so producers always enter
    /// the plan before their consumers. Registering a node that is already
    /// populated or already pending is a no-op that returns the same handle.
    /// The walk keeps its own stack, so graph depth is not bounded by the
    /// thread's call stack.
    pub fn eval_register(&self, plan: &mut EvalPlan) -> KilnResult<ConstHandle> {
        let mut stack = vec![(self.clone(), false)];
        while let Some((expr, expanded)) = stack.pop() {
            if expr.is_settled(plan) {
                continue;
            }
            if expanded {
                expr.enqueue(plan)?;
                continue;
            }
            stack.push((expr.clone(), true));
            for operand in expr.node.op.operands().into_iter().rev() {
                if !operand.is_settled(plan) {
                    stack.push((operand.clone(), false));
                }
            }
        }
        Ok(self.handle())
    }

    /// Populated, or already pending in `plan`.
    fn is_settled(&self, plan: &EvalPlan) -> bool {
        self.node.buffer.is_evaluated() || plan.is_registered(self.node.buffer.id())
    }

    /// Register this node's own item. Its operands must already be settled.
    fn enqueue(&self, plan: &mut EvalPlan) -> KilnResult<()> {
        let node = &self.node;
        let Some(tag) = node.op.tag() else {
            return Ok(());
        };
        let inputs = node.op.operands().into_iter().map(Expr::handle).collect();
        let item = WorkItem::new(
            tag,
            node.device,
            inputs,
            node.buffer.handle(),
            node.shape.clone(),
            node.op.aux(&node.shape),
        );
        plan.register(item, || registry::group_for(tag))?;
        Ok(())
    }
}

impl From<Tensor> for Expr {
    fn from(value: Tensor) -> Self {
        Expr::input(value)
    }
}

/// Structural equality: same operator, equal operands, equal shape. Leaves
/// are only equal to themselves.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        match (&self.node.op, &other.node.op) {
            (Operator::Input, Operator::Input) => self.buffer_id() == other.buffer_id(),
            (lhs, rhs) => lhs == rhs && self.node.shape == other.node.shape,
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("op", &self.node.op.tag())
            .field("shape", &self.node.shape)
            .field("buffer", &self.buffer_id())
            .field("evaluated", &self.is_evaluated())
            .finish()
    }
}

/// Common device of a set of operands.
pub(crate) fn common_device(operation: &str, operands: &[&Expr]) -> KilnResult<Device> {
    let device = operands[0].device();
    if let Some(other) = operands.iter().find(|operand| operand.device() != device) {
        return Err(KilnError::DeviceError(format!(
            "{} mixes {} and {} operands",
            operation,
            device,
            other.device()
        )));
    }
    Ok(device)
}

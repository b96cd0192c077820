//! Deferred evaluation
//!
//! - Write-once memo buffers and the handles that reach them
//! - Work items (one deferred kernel call) and work groups keyed by operator tag
//! - Per-device plans that deduplicate items by output buffer and flush them
//!   in dependency order
//! - An explicit context owning one plan per device

pub mod buffer;
pub mod context;
pub mod group;
pub mod item;
pub mod plan;

pub use buffer::{BufferId, ConstHandle, Handle, MemoBuffer};
pub use context::EvalContext;
pub use group::{EvalGroup, TrivialEvalGroup};
pub use item::{AuxParams, Kernel, OpTag, WorkItem};
pub use plan::{EvalPlan, ExecutedItem, FlushReport};

use std::sync::Arc;

use crate::error::KilnResult;
use crate::ops::Expr;
use crate::tensor::Tensor;

/// Evaluate `expr` in a fresh context configured from the global settings.
pub fn evaluate(expr: &Expr) -> KilnResult<Arc<Tensor>> {
    EvalContext::new().evaluate(expr)
}

//! Operator tag to kernel dispatch

use crate::evaluate::group::{EvalGroup, TrivialEvalGroup};
use crate::evaluate::item::{Kernel, OpTag};
use super::{activation, collapse, elementwise};

pub fn kernel(tag: OpTag) -> Kernel {
    match tag {
        OpTag::Subtract => elementwise::subtract_kernel,
        OpTag::SubtractFromNum => elementwise::subtract_from_num_kernel,
        OpTag::SubtractNum => elementwise::subtract_num_kernel,
        OpTag::Multiply => elementwise::multiply_kernel,
        OpTag::MultiplyNum => elementwise::multiply_num_kernel,
        OpTag::Tanh => activation::tanh_kernel,
        OpTag::TanhGrad => activation::tanh_grad_kernel,
        OpTag::Collapse => collapse::collapse_kernel,
        OpTag::Duplicate => collapse::duplicate_kernel,
    }
}

/// A fresh, empty work group for items tagged `tag`.
pub fn group_for(tag: OpTag) -> Box<dyn EvalGroup> {
    Box::new(TrivialEvalGroup::new(tag, kernel(tag)))
}

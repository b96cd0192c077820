//! Activation functions

use crate::error::{ErrorContext, KilnError, KilnResult, WithContext};
use crate::evaluate::item::WorkItem;
use crate::tensor::Tensor;
use super::expr::{common_device, Expr, Operator};

pub fn tanh(operand: &Expr) -> Expr {
    Expr::from_op(
        Operator::Tanh(operand.clone()),
        operand.shape().clone(),
        operand.device(),
    )
}

/// Gradient of tanh: `grad * (1 - output^2)`, where `output` is the value
/// the forward tanh produced.
pub fn tanh_grad(grad: &Expr, output: &Expr) -> KilnResult<Expr> {
    if grad.shape() != output.shape() {
        let mismatch: KilnResult<Expr> = Err(KilnError::ShapeError(
            "TanhGrad error: operands' shape mismatch.".to_string(),
        ));
        return mismatch.with_context(|| {
            ErrorContext::new("tanh_grad")
                .with_shape(grad.shape())
                .with_shape(output.shape())
        });
    }
    let device = common_device("tanh_grad", &[grad, output])?;
    Ok(Expr::from_op(
        Operator::TanhGrad {
            grad: grad.clone(),
            output: output.clone(),
        },
        grad.shape().clone(),
        device,
    ))
}

pub(crate) fn tanh_kernel(item: &WorkItem) -> Tensor {
    let input = item.input(0).data();
    debug_assert_eq!(input.shape(), item.output_shape());

    let mut out = Tensor::new(item.output_shape().clone(), item.device());
    for (o, &v) in out.as_slice_mut().iter_mut().zip(input.as_slice()) {
        *o = v.tanh();
    }
    out
}

pub(crate) fn tanh_grad_kernel(item: &WorkItem) -> Tensor {
    let grad = item.input(0).data();
    let output = item.input(1).data();
    assert_eq!(grad.shape(), output.shape(), "tanh_grad operands differ in shape");

    let mut out = Tensor::new(item.output_shape().clone(), item.device());
    let pairs = grad.as_slice().iter().zip(output.as_slice());
    for (o, (&g, &y)) in out.as_slice_mut().iter_mut().zip(pairs) {
        *o = g * (1.0 - y * y);
    }
    out
}

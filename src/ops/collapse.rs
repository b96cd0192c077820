//! Collapse and its adjoint, duplicate
//!
//! `collapse` sums the broadcast or batch blocks of a value down to a plain
//! target shape. `duplicate` repeats a plain value cyclically up to a larger
//! shape, so `collapse(duplicate(x, s), x.shape())` sums `count(s) / count(x)`
//! copies of `x`.

use crate::error::{ErrorContext, KilnError, KilnResult, WithContext};
use crate::evaluate::item::WorkItem;
use crate::tensor::{shape_match, Shape, Tensor};
use super::expr::{Expr, Operator};

fn check_reducible(operation: &str, from: &Shape, into: &Shape) -> KilnResult<()> {
    let context = || {
        ErrorContext::new(operation)
            .with_shape(from)
            .with_shape(into)
    };
    if !from.category().collapses_into(into.category()) {
        let illegal: KilnResult<()> = Err(KilnError::category_error(
            operation,
            &format!("{} does not reduce into {}", from.category(), into.category()),
        ));
        return illegal.with_context(context);
    }
    if !shape_match(from, into) {
        let mismatch: KilnResult<()> = Err(KilnError::ShapeError(
            "Cannot duplicate for un-match shape.".to_string(),
        ));
        return mismatch.with_context(context);
    }
    Ok(())
}

fn check_identity(operation: &str, operand: &Expr, shape: &Shape) -> KilnResult<()> {
    if operand.shape() != shape {
        let mismatch: KilnResult<()> = Err(KilnError::ShapeError(
            "Plain duplicate need identical shape.".to_string(),
        ));
        return mismatch.with_context(|| {
            ErrorContext::new(operation)
                .with_shape(operand.shape())
                .with_shape(shape)
        });
    }
    Ok(())
}

/// Sum `operand` down to `shape`.
///
/// When `operand` already has the target category the shapes must be equal
/// and the operand itself is returned.
pub fn collapse(operand: &Expr, shape: Shape) -> KilnResult<Expr> {
    if operand.shape().category() == shape.category() {
        check_identity("collapse", operand, &shape)?;
        return Ok(operand.clone());
    }
    check_reducible("collapse", operand.shape(), &shape)?;
    Ok(Expr::from_op(
        Operator::Collapse(operand.clone()),
        shape,
        operand.device(),
    ))
}

/// Repeat `operand` up to `shape`. Legal exactly when collapsing `shape`
/// back into the operand's shape is.
pub fn duplicate(operand: &Expr, shape: Shape) -> KilnResult<Expr> {
    if operand.shape().category() == shape.category() {
        check_identity("duplicate", operand, &shape)?;
        return Ok(operand.clone());
    }
    check_reducible("duplicate", &shape, operand.shape())?;
    Ok(Expr::from_op(
        Operator::Duplicate(operand.clone()),
        shape,
        operand.device(),
    ))
}

fn target_shape(item: &WorkItem) -> &Shape {
    match item.aux().shape() {
        Some(shape) => shape,
        None => panic!("{} item {} carries no target shape", item.tag(), item.output_id()),
    }
}

pub(crate) fn collapse_kernel(item: &WorkItem) -> Tensor {
    let input = item.input(0).data();
    let mut out = Tensor::new(target_shape(item).clone(), item.device());
    let src = input.as_slice();
    let dst = out.as_slice_mut();
    let block = dst.len();
    if block == 0 {
        return out;
    }
    assert_eq!(
        src.len() % block,
        0,
        "collapse of {} elements into blocks of {}",
        src.len(),
        block
    );

    let mut chunks = src.chunks_exact(block);
    if let Some(first) = chunks.next() {
        dst.copy_from_slice(first);
    }
    for chunk in chunks {
        for (o, &v) in dst.iter_mut().zip(chunk) {
            *o += v;
        }
    }
    out
}

pub(crate) fn duplicate_kernel(item: &WorkItem) -> Tensor {
    let input = item.input(0).data();
    let mut out = Tensor::new(target_shape(item).clone(), item.device());
    let src = input.as_slice();
    let dst = out.as_slice_mut();
    if dst.is_empty() {
        return out;
    }
    assert_eq!(dst.len() % src.len(), 0, "duplicate does not tile its operand");

    for (o, &v) in dst.iter_mut().zip(src.iter().cycle()) {
        *o = v;
    }
    out
}

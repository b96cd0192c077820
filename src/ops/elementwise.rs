//! Elementwise arithmetic
//!
//! Binary operators broadcast cyclically: with operand counts `m` and `n`
//! and output count `L`, element `i` reads `lhs[i % m]` and `rhs[i % n]`.
//! Both counts must divide `L`, which [`Shape::broadcast`] guarantees for
//! every node it accepts.

use std::ops::{Mul, Sub};

use crate::error::{ErrorContext, KilnResult, WithContext};
use crate::evaluate::item::WorkItem;
use crate::tensor::{Shape, Tensor};
use super::expr::{common_device, Expr, Operator};

fn binary_shape(operation: &str, lhs: &Expr, rhs: &Expr) -> KilnResult<Shape> {
    Shape::broadcast(lhs.shape(), rhs.shape()).with_context(|| {
        ErrorContext::new(operation)
            .with_shape(lhs.shape())
            .with_shape(rhs.shape())
            .with_suggestion("collapse or duplicate one operand to the other's shape first")
    })
}

/// `lhs - rhs`, broadcasting the smaller operand.
pub fn subtract(lhs: &Expr, rhs: &Expr) -> KilnResult<Expr> {
    let device = common_device("subtract", &[lhs, rhs])?;
    let shape = binary_shape("subtract", lhs, rhs)?;
    Ok(Expr::from_op(
        Operator::Subtract(lhs.clone(), rhs.clone()),
        shape,
        device,
    ))
}

/// `minuend - operand`, elementwise.
pub fn subtract_from_num(minuend: f64, operand: &Expr) -> Expr {
    Expr::from_op(
        Operator::SubtractFromNum {
            minuend,
            operand: operand.clone(),
        },
        operand.shape().clone(),
        operand.device(),
    )
}

/// `operand - subtrahend`, elementwise.
pub fn subtract_num(operand: &Expr, subtrahend: f64) -> Expr {
    Expr::from_op(
        Operator::SubtractNum {
            operand: operand.clone(),
            subtrahend,
        },
        operand.shape().clone(),
        operand.device(),
    )
}

/// `lhs * rhs`, broadcasting the smaller operand.
pub fn multiply(lhs: &Expr, rhs: &Expr) -> KilnResult<Expr> {
    let device = common_device("multiply", &[lhs, rhs])?;
    let shape = binary_shape("multiply", lhs, rhs)?;
    Ok(Expr::from_op(
        Operator::Multiply(lhs.clone(), rhs.clone()),
        shape,
        device,
    ))
}

pub fn multiply_num(operand: &Expr, factor: f64) -> Expr {
    Expr::from_op(
        Operator::MultiplyNum {
            operand: operand.clone(),
            factor,
        },
        operand.shape().clone(),
        operand.device(),
    )
}

impl Sub<f64> for &Expr {
    type Output = Expr;

    fn sub(self, rhs: f64) -> Expr {
        subtract_num(self, rhs)
    }
}

impl Sub<&Expr> for f64 {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        subtract_from_num(self, rhs)
    }
}

impl Mul<f64> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        multiply_num(self, rhs)
    }
}

impl Mul<&Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        multiply_num(rhs, self)
    }
}

fn broadcast_binary(item: &WorkItem, f: impl Fn(f32, f32) -> f32) -> Tensor {
    let lhs = item.input(0).data();
    let rhs = item.input(1).data();
    let mut out = Tensor::new(item.output_shape().clone(), item.device());
    let (a, b) = (lhs.as_slice(), rhs.as_slice());
    let dst = out.as_slice_mut();
    if dst.is_empty() {
        return out;
    }
    assert!(
        dst.len() % a.len() == 0 && dst.len() % b.len() == 0,
        "{}: operand counts {} and {} do not divide output count {}",
        item.tag(),
        a.len(),
        b.len(),
        dst.len()
    );

    for (i, o) in dst.iter_mut().enumerate() {
        *o = f(a[i % a.len()], b[i % b.len()]);
    }
    out
}

fn map_with_number(item: &WorkItem, f: impl Fn(f32, f32) -> f32) -> Tensor {
    let Some(number) = item.aux().number() else {
        panic!("{} item {} carries no number", item.tag(), item.output_id());
    };
    let number = number as f32;
    let input = item.input(0).data();
    let mut out = Tensor::new(item.output_shape().clone(), item.device());
    for (o, &v) in out.as_slice_mut().iter_mut().zip(input.as_slice()) {
        *o = f(v, number);
    }
    out
}

pub(crate) fn subtract_kernel(item: &WorkItem) -> Tensor {
    broadcast_binary(item, |a, b| a - b)
}

pub(crate) fn subtract_from_num_kernel(item: &WorkItem) -> Tensor {
    map_with_number(item, |v, minuend| minuend - v)
}

pub(crate) fn subtract_num_kernel(item: &WorkItem) -> Tensor {
    map_with_number(item, |v, subtrahend| v - subtrahend)
}

pub(crate) fn multiply_kernel(item: &WorkItem) -> Tensor {
    broadcast_binary(item, |a, b| a * b)
}

pub(crate) fn multiply_num_kernel(item: &WorkItem) -> Tensor {
    map_with_number(item, |v, factor| v * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KilnError;
    use crate::evaluate::EvalContext;
    use crate::tensor::Extents;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn eval(expr: &Expr) -> Vec<f32> {
        EvalContext::new().evaluate(expr).unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_subtract_matrices() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = Tensor::random_uniform(Shape::matrix(10, 7), -100.0, 3.0, &mut rng).unwrap();
        let b = Tensor::random_uniform(Shape::matrix(10, 7), -3.0, 100.0, &mut rng).unwrap();
        let expected: Vec<f32> = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| x - y)
            .collect();

        let d = subtract(&Expr::input(a), &Expr::input(b)).unwrap();
        assert_eq!(d.shape(), &Shape::matrix(10, 7));
        assert_eq!(eval(&d), expected);
    }

    #[test]
    fn test_broadcast_subtract_law() {
        let elem = Extents::Matrix { rows: 1, cols: 2 };
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let batch = Tensor::from_vec(data, Shape::batch(elem, 3)).unwrap();
        let row = Tensor::matrix(1, 2, vec![10.0, 20.0]).unwrap();

        let (big, small) = (batch.as_slice().to_vec(), row.as_slice().to_vec());
        let lhs = Expr::input(batch);
        let rhs = Expr::input(row);

        let forward = subtract(&lhs, &rhs).unwrap();
        assert_eq!(forward.shape(), &Shape::batch(elem, 3));
        let expected: Vec<f32> = (0..6).map(|i| big[i % 6] - small[i % 2]).collect();
        assert_eq!(eval(&forward), expected);

        let backward = subtract(&rhs, &lhs).unwrap();
        let expected: Vec<f32> = (0..6).map(|i| small[i % 2] - big[i % 6]).collect();
        assert_eq!(eval(&backward), expected);
    }

    #[test]
    fn test_scalar_broadcasts_into_sequence() {
        let seq = Shape::sequence(Extents::Scalar, 4);
        let values = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], seq.clone()).unwrap();
        let values = Expr::input(values);
        let one = Expr::input(Tensor::scalar(1.0));
        let d = subtract(&values, &one).unwrap();
        assert_eq!(d.shape(), &seq);
        assert_eq!(eval(&d), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_incompatible_shapes_rejected() {
        let a = Expr::input(Tensor::zeros(Shape::matrix(2, 3)));
        let b = Expr::input(Tensor::zeros(Shape::matrix(3, 2)));
        let err = subtract(&a, &b).unwrap_err();
        assert!(matches!(err, KilnError::ShapeError(_)));
        assert!(err.to_string().contains("Operation: subtract"));
        assert!(multiply(&a, &b).is_err());
    }

    #[test]
    fn test_subtract_from_number() {
        let t = Expr::input(Tensor::matrix(2, 2, vec![1.0, -2.0, 0.5, 4.0]).unwrap());
        assert_eq!(eval(&(3.0 - &t)), vec![2.0, 5.0, 2.5, -1.0]);
        assert_eq!(eval(&(&t - 3.0)), vec![-2.0, -5.0, -2.5, 1.0]);
        assert_eq!((3.0 - &t).shape(), t.shape());
    }

    #[test]
    fn test_multiply() {
        let a = Expr::input(Tensor::scalar(3.0));
        let b = Expr::input(Tensor::scalar(9.0));
        assert_eq!(eval(&multiply(&a, &b).unwrap()), vec![27.0]);

        let m = Expr::input(Tensor::matrix(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let n = Expr::input(Tensor::matrix(2, 2, vec![2.0, 2.0, -1.0, 0.0]).unwrap());
        assert_eq!(eval(&multiply(&m, &n).unwrap()), vec![2.0, 4.0, -3.0, 0.0]);

        let cube = Expr::input(Tensor::three_d_array(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let face = Expr::input(Tensor::matrix(1, 2, vec![10.0, 100.0]).unwrap());
        assert_eq!(eval(&multiply(&cube, &face).unwrap()), vec![10.0, 200.0, 30.0, 400.0]);

        let batch = Tensor::from_vec(vec![1.0, 2.0, 3.0], Shape::batch(Extents::Scalar, 3));
        let batch = Expr::input(batch.unwrap());
        assert_eq!(eval(&multiply(&batch, &b).unwrap()), vec![9.0, 18.0, 27.0]);
    }

    #[test]
    fn test_multiply_by_number_commutes() {
        let m = Expr::input(Tensor::matrix(1, 3, vec![1.0, -2.0, 3.0]).unwrap());
        let left = 2.0 * &m;
        let right = &m * 2.0;
        assert_eq!(left, right);
        assert_eq!(eval(&left), vec![2.0, -4.0, 6.0]);
        assert_eq!(eval(&right), vec![2.0, -4.0, 6.0]);
    }
}

//! Operator nodes
//!
//! Every operator follows one pattern: a factory function validates its
//! operands and returns an immutable [`Expr`]; nothing is computed until the
//! node is registered into a plan and the plan is flushed. Each operator
//! family has an [`OpTag`](crate::evaluate::OpTag) and a kernel in
//! [`registry`].

pub mod activation;
pub mod collapse;
pub mod elementwise;
pub mod expr;
pub mod registry;

pub use activation::{tanh, tanh_grad};
pub use collapse::{collapse, duplicate};
pub use elementwise::{multiply, multiply_num, subtract, subtract_from_num, subtract_num};
pub use expr::{Expr, Operator};

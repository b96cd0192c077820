//! Kiln - a lazy tensor-expression engine
//!
//! Features:
//! - Shape/category algebra for scalars, matrices, 3D arrays and their
//!   batched and sequenced forms
//! - Immutable expression nodes; building a graph computes nothing
//! - Write-once memo buffers so shared sub-expressions materialize once
//! - Per-device evaluation plans that deduplicate and batch work by operator
//! - Elementwise arithmetic, tanh and its gradient, collapse and duplicate
//!
//! ```no_run
//! use kiln::ops::{collapse, subtract, tanh, Expr};
//! use kiln::tensor::{Extents, Shape, Tensor};
//!
//! # fn main() -> kiln::error::KilnResult<()> {
//! let x = Expr::input(Tensor::from_vec(
//!     vec![1.0, 2.0, 3.0, 4.0],
//!     Shape::batch(Extents::Matrix { rows: 1, cols: 2 }, 2),
//! )?);
//! let centered = subtract(&x, &collapse(&x, Shape::matrix(1, 2))?)?;
//! let y = kiln::evaluate(&tanh(&centered))?;
//! assert_eq!(y.count(), 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod evaluate;
pub mod ops;
pub mod tensor;

pub use crate::config::{get_config, EvalConfig, KilnConfig};
pub use crate::error::{KilnError, KilnResult};
pub use crate::evaluate::{evaluate, EvalContext, FlushReport, OpTag};
pub use crate::ops::Expr;
pub use crate::tensor::{Device, Shape, Tensor};

/// Install a `tracing` subscriber for the process.
///
/// The level follows `development.verbose_logging` in the global
/// configuration. Calling this again once a subscriber exists does nothing.
pub fn init() -> KilnResult<()> {
    let level = if get_config().development.verbose_logging {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    if tracing_subscriber::fmt().with_max_level(level).try_init().is_ok() {
        tracing::info!("Kiln initialized");
    }
    Ok(())
}

/// Get the current engine version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

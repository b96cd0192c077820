//! Materialized values and the shape model
//!
//! - Shape/category descriptors with broadcast and collapse rules
//! - Row-major element storage shared between clones
//! - Device tags that scope evaluation plans
//! - Growable batches of values or variable-length sequences

pub mod batch;
pub mod core;
pub mod devices;
pub mod shape;
pub mod storage;

pub use self::batch::DynamicBatch;
pub use self::core::Tensor;
pub use self::devices::Device;
pub use self::shape::{shape_match, Category, Extents, Outer, Rank, Shape, Structure};
pub use self::storage::TensorStorage;

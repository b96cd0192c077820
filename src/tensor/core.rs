//! Materialized tensor values

use std::fmt::{self, Debug};

use rand::Rng;

use crate::error::{KilnError, KilnResult};
use super::devices::Device;
use super::shape::{Extents, Outer, Shape, Structure};
use super::storage::TensorStorage;

/// A materialized value: shape, device and row-major `f32` elements.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    storage: TensorStorage,
    shape: Shape,
    device: Device,
}

impl Tensor {
    /// Create a zero-filled tensor on `device`
    pub fn new(shape: Shape, device: Device) -> Self {
        let storage = TensorStorage::new(shape.count(), device);
        Self { storage, shape, device }
    }

    pub fn zeros(shape: Shape) -> Self {
        Self::new(shape, Device::Cpu)
    }

    pub fn filled(shape: Shape, value: f32) -> Self {
        let data = vec![value; shape.count()];
        Self {
            storage: TensorStorage::from_vec(data, Device::Cpu),
            shape,
            device: Device::Cpu,
        }
    }

    pub fn from_vec(data: Vec<f32>, shape: Shape) -> KilnResult<Self> {
        if data.len() != shape.count() {
            return Err(KilnError::InvalidInput(format!(
                "Data length {} doesn't match shape {} ({} elements)",
                data.len(),
                shape,
                shape.count()
            )));
        }
        Ok(Self {
            storage: TensorStorage::from_vec(data, Device::Cpu),
            shape,
            device: Device::Cpu,
        })
    }

    pub fn scalar(value: f32) -> Self {
        Self::filled(Shape::scalar(), value)
    }

    pub fn matrix(rows: usize, cols: usize, data: Vec<f32>) -> KilnResult<Self> {
        Self::from_vec(data, Shape::matrix(rows, cols))
    }

    pub fn three_d_array(
        pages: usize,
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    ) -> KilnResult<Self> {
        Self::from_vec(data, Shape::three_d_array(pages, rows, cols))
    }

    /// Uniformly distributed elements in `[low, high)`. The range must be
    /// non-empty and finite.
    pub fn random_uniform<R: Rng + ?Sized>(
        shape: Shape,
        low: f32,
        high: f32,
        rng: &mut R,
    ) -> KilnResult<Self> {
        if !(low < high) || !low.is_finite() || !high.is_finite() {
            return Err(KilnError::InvalidInput(format!(
                "random_uniform needs a finite range with low < high, got [{}, {})",
                low, high
            )));
        }
        let data = (0..shape.count()).map(|_| rng.gen_range(low..high)).collect();
        Ok(Self {
            storage: TensorStorage::from_vec(data, Device::Cpu),
            shape,
            device: Device::Cpu,
        })
    }

    /// Stack plain tensors of one shape into a batch.
    pub fn batch(items: &[Tensor]) -> KilnResult<Self> {
        let (extents, device, data) = concat_plain("batch", items)?;
        Ok(Self {
            storage: TensorStorage::from_vec(data, device),
            shape: Shape::batch(extents, items.len()),
            device,
        })
    }

    /// Chain plain tensors of one shape into a sequence.
    pub fn sequence(items: &[Tensor]) -> KilnResult<Self> {
        let (extents, device, data) = concat_plain("sequence", items)?;
        Ok(Self {
            storage: TensorStorage::from_vec(data, device),
            shape: Shape::sequence(extents, items.len()),
            device,
        })
    }

    pub(crate) fn from_parts(storage: TensorStorage, shape: Shape) -> Self {
        debug_assert_eq!(storage.size(), shape.count());
        let device = storage.device();
        Self { storage, shape, device }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Get number of elements
    pub fn count(&self) -> usize {
        self.shape.count()
    }

    pub fn as_slice(&self) -> &[f32] {
        self.storage.as_slice()
    }

    pub fn as_slice_mut(&mut self) -> &mut [f32] {
        self.storage.as_slice_mut()
    }

    /// Value of a scalar tensor.
    pub fn value(&self) -> Option<f32> {
        (self.shape == Shape::scalar()).then(|| self.as_slice()[0])
    }

    /// Element at `coords` of a plain tensor (`[]`, `[row, col]` or `[page, row, col]`).
    pub fn get(&self, coords: &[usize]) -> Option<f32> {
        self.shape.offset(coords).map(|i| self.as_slice()[i])
    }

    /// The `index`-th element of a batch or sequence, or the `index`-th
    /// sequence of a batch of sequences.
    pub fn item(&self, index: usize) -> KilnResult<Tensor> {
        let extents = self.shape.extents();
        let block = extents.count();
        let (start, len, shape) = match self.shape.outer() {
            Outer::Plain => {
                return Err(KilnError::InvalidInput(format!(
                    "{} has no items to index",
                    self.shape
                )))
            }
            Outer::Batch { batch: n } | Outer::Sequence { len: n } => {
                if index >= *n {
                    return Err(out_of_range(index, *n));
                }
                (index * block, block, Shape::plain(extents))
            }
            Outer::BatchSequence { seq_lens } => {
                if index >= seq_lens.len() {
                    return Err(out_of_range(index, seq_lens.len()));
                }
                let skipped: usize = seq_lens[..index].iter().sum();
                let len = seq_lens[index];
                (skipped * block, len * block, Shape::sequence(extents, len))
            }
        };
        let data = self.as_slice()[start..start + len].to_vec();
        Ok(Self::from_parts(TensorStorage::from_vec(data, self.device), shape))
    }
}

fn out_of_range(index: usize, len: usize) -> KilnError {
    KilnError::InvalidInput(format!("item index {} out of range for {} items", index, len))
}

fn concat_plain(operation: &str, items: &[Tensor]) -> KilnResult<(Extents, Device, Vec<f32>)> {
    let first = items.first().ok_or_else(|| {
        KilnError::operation_error(operation, "cannot infer the element shape of an empty list")
    })?;
    let element = first.shape().clone();
    if element.category().structure != Structure::Plain {
        return Err(KilnError::category_error(
            operation,
            &format!("items must be plain values, got {}", element.category()),
        ));
    }

    let mut data = Vec::with_capacity(element.count() * items.len());
    for item in items {
        if item.shape() != &element {
            return Err(KilnError::shape_error(
                &element.to_string(),
                &item.shape().to_string(),
                None,
            ));
        }
        if item.device() != first.device() {
            return Err(KilnError::DeviceError(format!(
                "{} mixes {} and {} items",
                operation,
                first.device(),
                item.device()
            )));
        }
        data.extend_from_slice(item.as_slice());
    }
    Ok((element.extents(), first.device(), data))
}

impl Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("device", &self.device)
            .field("size", &self.shape.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_tensor_creation() {
        let tensor = Tensor::zeros(Shape::matrix(2, 2));
        assert_eq!(tensor.count(), 4);
        assert_eq!(tensor.device(), Device::Cpu);
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));

        assert!(Tensor::matrix(2, 2, vec![1.0; 3]).is_err());
        assert_eq!(Tensor::scalar(3.0).value(), Some(3.0));
        assert_eq!(Tensor::zeros(Shape::matrix(1, 1)).value(), None);
    }

    #[test]
    fn test_get() {
        let t = Tensor::three_d_array(2, 2, 3, (0..12).map(|v| v as f32).collect()).unwrap();
        assert_eq!(t.get(&[1, 0, 2]), Some(8.0));
        assert_eq!(t.get(&[2, 0, 0]), None);
    }

    #[test]
    fn test_random_uniform() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = Tensor::random_uniform(Shape::matrix(10, 7), -100.0, 3.0, &mut rng).unwrap();
        assert_eq!(t.count(), 70);
        assert!(t.as_slice().iter().all(|&v| (-100.0..3.0).contains(&v)));

        let err = Tensor::random_uniform(Shape::scalar(), 1.0, 1.0, &mut rng).unwrap_err();
        assert!(matches!(err, KilnError::InvalidInput(_)));
        assert!(Tensor::random_uniform(Shape::scalar(), 2.0, -2.0, &mut rng).is_err());
        assert!(Tensor::random_uniform(Shape::scalar(), 0.0, f32::INFINITY, &mut rng).is_err());
        assert!(Tensor::random_uniform(Shape::scalar(), f32::NAN, 1.0, &mut rng).is_err());
    }

    #[test]
    fn test_batch_and_items() {
        let a = Tensor::matrix(1, 2, vec![1.0, 2.0]).unwrap();
        let b = Tensor::matrix(1, 2, vec![3.0, 4.0]).unwrap();
        let batch = Tensor::batch(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(batch.shape(), &Shape::batch(Extents::Matrix { rows: 1, cols: 2 }, 2));
        assert_eq!(batch.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batch.item(1).unwrap(), b);
        assert!(batch.item(2).is_err());
        assert!(a.item(0).is_err());

        let seq = Tensor::sequence(&[a, b]).unwrap();
        assert_eq!(seq.shape().length(), Some(2));
    }

    #[test]
    fn test_batch_rejects_mismatch() {
        let a = Tensor::matrix(1, 2, vec![1.0, 2.0]).unwrap();
        let b = Tensor::matrix(2, 1, vec![3.0, 4.0]).unwrap();
        assert!(Tensor::batch(&[a.clone(), b]).is_err());
        assert!(Tensor::batch(&[]).is_err());

        let nested = Tensor::batch(&[a.clone()]).unwrap();
        assert!(Tensor::batch(&[nested]).is_err());
    }
}

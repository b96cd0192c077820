use std::sync::Arc;

use crate::tensor::devices::Device;

/// Shared row-major element storage.
///
/// Clones share one allocation; the first mutable access through a shared
/// clone copies the data so readers never observe a write.
#[derive(Debug, Clone)]
pub struct TensorStorage {
    data: Arc<Vec<f32>>,
    device: Device,
}

impl TensorStorage {
    pub fn new(size: usize, device: Device) -> Self {
        Self {
            data: Arc::new(vec![0.0; size]),
            device,
        }
    }

    pub fn from_vec(data: Vec<f32>, device: Device) -> Self {
        Self {
            data: Arc::new(data),
            device,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [f32] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Whether both storages share one allocation.
    pub fn ptr_eq(&self, other: &TensorStorage) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for TensorStorage {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device && (self.ptr_eq(other) || self.data == other.data)
    }
}

//! Growable batches of plain values or of variable-length sequences

use crate::error::{KilnError, KilnResult};
use super::core::Tensor;
use super::devices::Device;
use super::shape::{Extents, Shape, Structure};
use super::storage::TensorStorage;

/// Kind of item a [`DynamicBatch`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Plain,
    Sequence,
}

/// A batch that starts empty and grows one item at a time.
///
/// Plain items produce a `Batch` shape; sequence items, which may differ in
/// length, produce a `BatchSequence` shape whose length container records each
/// pushed sequence's length.
#[derive(Debug, Clone)]
pub struct DynamicBatch {
    element: Extents,
    kind: ItemKind,
    items: Vec<Tensor>,
}

impl DynamicBatch {
    /// Empty batch of plain values with the given element extents.
    pub fn new(element: Extents) -> Self {
        Self {
            element,
            kind: ItemKind::Plain,
            items: Vec::new(),
        }
    }

    /// Empty batch of sequences whose elements have the given extents.
    pub fn of_sequences(element: Extents) -> Self {
        Self {
            element,
            kind: ItemKind::Sequence,
            items: Vec::new(),
        }
    }

    pub fn push_back(&mut self, item: Tensor) -> KilnResult<()> {
        let expected = match self.kind {
            ItemKind::Plain => Structure::Plain,
            ItemKind::Sequence => Structure::Sequence,
        };
        let shape = item.shape();
        if shape.category().structure != expected || shape.extents() != self.element {
            return Err(KilnError::shape_error(
                &self.item_description(),
                &shape.to_string(),
                Some("every item of a batch shares one element shape"),
            ));
        }
        if let Some(first) = self.items.first() {
            if first.device() != item.device() {
                return Err(KilnError::DeviceError(format!(
                    "batch holds {} items, cannot push a {} item",
                    first.device(),
                    item.device()
                )));
            }
        }
        self.items.push(item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn shape(&self) -> Shape {
        match self.kind {
            ItemKind::Plain => Shape::batch(self.element, self.items.len()),
            ItemKind::Sequence => Shape::batch_sequence(
                self.element,
                self.items
                    .iter()
                    .map(|item| item.shape().length().unwrap_or(0))
                    .collect(),
            ),
        }
    }

    pub fn device(&self) -> Device {
        self.items.first().map(Tensor::device).unwrap_or_default()
    }

    /// Concatenate every pushed item into one tensor.
    pub fn to_tensor(&self) -> Tensor {
        let shape = self.shape();
        let mut data = Vec::with_capacity(shape.count());
        for item in &self.items {
            data.extend_from_slice(item.as_slice());
        }
        Tensor::from_parts(TensorStorage::from_vec(data, self.device()), shape)
    }

    fn item_description(&self) -> String {
        match self.kind {
            ItemKind::Plain => Shape::plain(self.element).to_string(),
            ItemKind::Sequence => format!("Sequence of {}", Shape::plain(self.element)),
        }
    }
}

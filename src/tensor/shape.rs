//! Shape and category model
//!
//! Every value in an expression graph has a [`Shape`]: the extents of its
//! element ([`Extents`]: scalar, matrix or 3D array) optionally wrapped in a
//! batch, a sequence, or a batch of variable-length sequences ([`Outer`]).
//! The pair of rank and wrapping is the value's [`Category`].
//!
//! Data is laid out row-major with the outer wrapping outermost, so a
//! batch of `n` matrices is `n` contiguous `rows * cols` blocks and a batch
//! of sequences is every sequence's blocks concatenated in order. The
//! broadcast and collapse rules below rely on that layout.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{KilnError, KilnResult};

/// Rank of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Scalar,
    Matrix,
    ThreeDArray,
}

/// How elements are wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Structure {
    Plain,
    Batch,
    Sequence,
    BatchSequence,
}

/// Structural classification of a value: element rank plus wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub rank: Rank,
    pub structure: Structure,
}

impl Category {
    pub const SCALAR: Category = Category::new(Rank::Scalar, Structure::Plain);
    pub const MATRIX: Category = Category::new(Rank::Matrix, Structure::Plain);
    pub const THREE_D_ARRAY: Category = Category::new(Rank::ThreeDArray, Structure::Plain);
    pub const BATCH_SCALAR: Category = Category::new(Rank::Scalar, Structure::Batch);
    pub const BATCH_MATRIX: Category = Category::new(Rank::Matrix, Structure::Batch);
    pub const BATCH_THREE_D_ARRAY: Category = Category::new(Rank::ThreeDArray, Structure::Batch);
    pub const SCALAR_SEQUENCE: Category = Category::new(Rank::Scalar, Structure::Sequence);
    pub const MATRIX_SEQUENCE: Category = Category::new(Rank::Matrix, Structure::Sequence);
    pub const THREE_D_ARRAY_SEQUENCE: Category =
        Category::new(Rank::ThreeDArray, Structure::Sequence);
    pub const BATCH_SCALAR_SEQUENCE: Category =
        Category::new(Rank::Scalar, Structure::BatchSequence);
    pub const BATCH_MATRIX_SEQUENCE: Category =
        Category::new(Rank::Matrix, Structure::BatchSequence);
    pub const BATCH_THREE_D_ARRAY_SEQUENCE: Category =
        Category::new(Rank::ThreeDArray, Structure::BatchSequence);

    pub const fn new(rank: Rank, structure: Structure) -> Self {
        Self { rank, structure }
    }

    pub const fn is_plain(&self) -> bool {
        matches!(self.structure, Structure::Plain)
    }

    /// Whether a value of category `self` may be summed down into `target`.
    ///
    /// A scalar target accepts anything. A matrix target accepts 3D arrays and
    /// every batched or sequenced matrix/3D array; a 3D array target accepts
    /// every batched or sequenced 3D array. Identical categories are always
    /// accepted (the collapse is then a plain identity).
    pub fn collapses_into(&self, target: Category) -> bool {
        if *self == target {
            return true;
        }
        if !target.is_plain() {
            return false;
        }
        match target.rank {
            Rank::Scalar => true,
            Rank::Matrix => matches!(
                *self,
                Category::THREE_D_ARRAY
                    | Category::BATCH_MATRIX
                    | Category::BATCH_THREE_D_ARRAY
                    | Category::MATRIX_SEQUENCE
                    | Category::THREE_D_ARRAY_SEQUENCE
                    | Category::BATCH_MATRIX_SEQUENCE
                    | Category::BATCH_THREE_D_ARRAY_SEQUENCE
            ),
            Rank::ThreeDArray => matches!(
                *self,
                Category::BATCH_THREE_D_ARRAY
                    | Category::THREE_D_ARRAY_SEQUENCE
                    | Category::BATCH_THREE_D_ARRAY_SEQUENCE
            ),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self.rank {
            Rank::Scalar => "Scalar",
            Rank::Matrix => "Matrix",
            Rank::ThreeDArray => "ThreeDArray",
        };
        match self.structure {
            Structure::Plain => write!(f, "{}", rank),
            Structure::Batch => write!(f, "Batch{}", rank),
            Structure::Sequence => write!(f, "{}Sequence", rank),
            Structure::BatchSequence => write!(f, "Batch{}Sequence", rank),
        }
    }
}

/// Extents of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Extents {
    Scalar,
    Matrix { rows: usize, cols: usize },
    ThreeDArray { pages: usize, rows: usize, cols: usize },
}

impl Extents {
    pub fn rank(&self) -> Rank {
        match self {
            Extents::Scalar => Rank::Scalar,
            Extents::Matrix { .. } => Rank::Matrix,
            Extents::ThreeDArray { .. } => Rank::ThreeDArray,
        }
    }

    pub fn count(&self) -> usize {
        match *self {
            Extents::Scalar => 1,
            Extents::Matrix { rows, cols } => rows * cols,
            Extents::ThreeDArray { pages, rows, cols } => pages * rows * cols,
        }
    }
}

/// Wrapping around the element extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outer {
    Plain,
    Batch { batch: usize },
    Sequence { len: usize },
    BatchSequence { seq_lens: Vec<usize> },
}

impl Outer {
    fn structure(&self) -> Structure {
        match self {
            Outer::Plain => Structure::Plain,
            Outer::Batch { .. } => Structure::Batch,
            Outer::Sequence { .. } => Structure::Sequence,
            Outer::BatchSequence { .. } => Structure::BatchSequence,
        }
    }

    /// Number of elements the wrapping holds.
    fn multiplicity(&self) -> usize {
        match self {
            Outer::Plain => 1,
            Outer::Batch { batch } => *batch,
            Outer::Sequence { len } => *len,
            Outer::BatchSequence { seq_lens } => seq_lens.iter().sum(),
        }
    }
}

/// Immutable shape descriptor. Two shapes are equal iff category and every
/// extent match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    extents: Extents,
    outer: Outer,
}

impl Shape {
    pub fn scalar() -> Self {
        Self::plain(Extents::Scalar)
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self::plain(Extents::Matrix { rows, cols })
    }

    pub fn three_d_array(pages: usize, rows: usize, cols: usize) -> Self {
        Self::plain(Extents::ThreeDArray { pages, rows, cols })
    }

    pub fn plain(extents: Extents) -> Self {
        Self { extents, outer: Outer::Plain }
    }

    pub fn batch(extents: Extents, batch: usize) -> Self {
        Self { extents, outer: Outer::Batch { batch } }
    }

    pub fn sequence(extents: Extents, len: usize) -> Self {
        Self { extents, outer: Outer::Sequence { len } }
    }

    pub fn batch_sequence(extents: Extents, seq_lens: Vec<usize>) -> Self {
        Self { extents, outer: Outer::BatchSequence { seq_lens } }
    }

    pub fn category(&self) -> Category {
        Category::new(self.extents.rank(), self.outer.structure())
    }

    pub fn extents(&self) -> Extents {
        self.extents
    }

    pub fn outer(&self) -> &Outer {
        &self.outer
    }

    /// Plain shape of a single element.
    pub fn element_shape(&self) -> Shape {
        Shape::plain(self.extents)
    }

    /// Total element count.
    pub fn count(&self) -> usize {
        self.extents.count() * self.outer.multiplicity()
    }

    pub fn rows(&self) -> Option<usize> {
        match self.extents {
            Extents::Scalar => None,
            Extents::Matrix { rows, .. } | Extents::ThreeDArray { rows, .. } => Some(rows),
        }
    }

    pub fn cols(&self) -> Option<usize> {
        match self.extents {
            Extents::Scalar => None,
            Extents::Matrix { cols, .. } | Extents::ThreeDArray { cols, .. } => Some(cols),
        }
    }

    pub fn pages(&self) -> Option<usize> {
        match self.extents {
            Extents::ThreeDArray { pages, .. } => Some(pages),
            _ => None,
        }
    }

    /// Batch size of a batch or a batch of sequences.
    pub fn batch_num(&self) -> Option<usize> {
        match &self.outer {
            Outer::Batch { batch } => Some(*batch),
            Outer::BatchSequence { seq_lens } => Some(seq_lens.len()),
            _ => None,
        }
    }

    /// Length of a sequence.
    pub fn length(&self) -> Option<usize> {
        match &self.outer {
            Outer::Sequence { len } => Some(*len),
            _ => None,
        }
    }

    /// Per-sequence lengths of a batch of sequences.
    pub fn seq_lens(&self) -> Option<&[usize]> {
        match &self.outer {
            Outer::BatchSequence { seq_lens } => Some(seq_lens),
            _ => None,
        }
    }

    /// Row-major offset of `coords` within a plain shape.
    pub fn offset(&self, coords: &[usize]) -> Option<usize> {
        if self.outer != Outer::Plain {
            return None;
        }
        match (self.extents, coords) {
            (Extents::Scalar, []) => Some(0),
            (Extents::Matrix { rows, cols }, &[r, c]) if r < rows && c < cols => {
                Some(r * cols + c)
            }
            (Extents::ThreeDArray { pages, rows, cols }, &[p, r, c])
                if p < pages && r < rows && c < cols =>
            {
                Some((p * rows + r) * cols + c)
            }
            _ => None,
        }
    }

    /// Output shape of an elementwise binary operator.
    ///
    /// Identical shapes pass through. Otherwise one operand must be a plain
    /// value that the other collapses into (see [`shape_match`]); the larger
    /// shape is the result, and its count is a whole multiple of the smaller.
    pub fn broadcast(lhs: &Shape, rhs: &Shape) -> KilnResult<Shape> {
        if lhs == rhs {
            return Ok(lhs.clone());
        }
        if lhs.category() == rhs.category() {
            return Err(KilnError::shape_error(
                &lhs.to_string(),
                &rhs.to_string(),
                Some("operands of the same category need identical extents"),
            ));
        }
        for (big, small) in [(lhs, rhs), (rhs, lhs)] {
            let legal = small.category().is_plain()
                && big.category().collapses_into(small.category())
                && shape_match(big, small);
            if legal {
                debug_assert_eq!(big.count() % small.count().max(1), 0);
                return Ok(big.clone());
            }
        }
        Err(KilnError::ShapeError(format!(
            "cannot broadcast {} against {}",
            lhs, rhs
        )))
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let element = match self.extents {
            Extents::Scalar => "Scalar".to_string(),
            Extents::Matrix { rows, cols } => format!("Matrix[{}, {}]", rows, cols),
            Extents::ThreeDArray { pages, rows, cols } => {
                format!("ThreeDArray[{}, {}, {}]", pages, rows, cols)
            }
        };
        match &self.outer {
            Outer::Plain => write!(f, "{}", element),
            Outer::Batch { batch } => write!(f, "Batch[{}] of {}", batch, element),
            Outer::Sequence { len } => write!(f, "Sequence[{}] of {}", len, element),
            Outer::BatchSequence { seq_lens } => write!(
                f,
                "BatchSequence[{}] of {}",
                seq_lens
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                element
            ),
        }
    }
}

/// Whether the leading extents of `original` are compatible with collapsing
/// into the plain shape `target`.
pub fn shape_match(original: &Shape, target: &Shape) -> bool {
    match target.extents {
        Extents::Scalar => true,
        Extents::Matrix { rows, cols } => {
            original.rows() == Some(rows) && original.cols() == Some(cols)
        }
        Extents::ThreeDArray { pages, rows, cols } => {
            original.rows() == Some(rows)
                && original.cols() == Some(cols)
                && original.pages() == Some(pages)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat() -> Extents {
        Extents::Matrix { rows: 2, cols: 3 }
    }

    #[test]
    fn test_shape_counts() {
        assert_eq!(Shape::scalar().count(), 1);
        assert_eq!(Shape::matrix(10, 7).count(), 70);
        assert_eq!(Shape::three_d_array(6, 10, 7).count(), 420);
        assert_eq!(Shape::batch(mat(), 4).count(), 24);
        assert_eq!(Shape::sequence(mat(), 5).count(), 30);
        assert_eq!(Shape::batch_sequence(mat(), vec![13, 1, 100, 87]).count(), 201 * 6);
    }

    #[test]
    fn test_shape_equality() {
        assert_eq!(Shape::matrix(3, 4), Shape::matrix(3, 4));
        assert_ne!(Shape::matrix(3, 4), Shape::matrix(4, 3));
        assert_ne!(Shape::batch(mat(), 2), Shape::sequence(mat(), 2));
        assert_ne!(
            Shape::batch_sequence(mat(), vec![1, 2]),
            Shape::batch_sequence(mat(), vec![2, 1])
        );
    }

    #[test]
    fn test_shape_accessors() {
        let cube = Extents::ThreeDArray { pages: 7, rows: 13, cols: 35 };
        let shape = Shape::batch_sequence(cube, vec![13, 1]);
        assert_eq!(shape.category(), Category::BATCH_THREE_D_ARRAY_SEQUENCE);
        assert_eq!(shape.pages(), Some(7));
        assert_eq!(shape.rows(), Some(13));
        assert_eq!(shape.cols(), Some(35));
        assert_eq!(shape.batch_num(), Some(2));
        assert_eq!(shape.seq_lens(), Some(&[13, 1][..]));
        assert_eq!(shape.length(), None);
        assert_eq!(Shape::scalar().rows(), None);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Shape::scalar().offset(&[]), Some(0));
        assert_eq!(Shape::matrix(3, 4).offset(&[2, 1]), Some(9));
        assert_eq!(Shape::matrix(3, 4).offset(&[3, 0]), None);
        assert_eq!(Shape::three_d_array(2, 3, 4).offset(&[1, 2, 3]), Some(23));
        assert_eq!(Shape::batch(mat(), 2).offset(&[0, 0]), None);
    }

    #[test]
    fn test_shape_match() {
        let ori = Shape::batch(mat(), 4);
        assert!(shape_match(&ori, &Shape::scalar()));
        assert!(shape_match(&ori, &Shape::matrix(2, 3)));
        assert!(!shape_match(&ori, &Shape::matrix(3, 2)));
        assert!(!shape_match(&ori, &Shape::three_d_array(1, 2, 3)));

        let cube = Shape::sequence(Extents::ThreeDArray { pages: 5, rows: 2, cols: 3 }, 3);
        assert!(shape_match(&cube, &Shape::three_d_array(5, 2, 3)));
        assert!(shape_match(&cube, &Shape::matrix(2, 3)));
        assert!(!shape_match(&cube, &Shape::three_d_array(4, 2, 3)));
    }

    #[test]
    fn test_collapse_legality() {
        let legal_into_matrix = [
            Category::THREE_D_ARRAY,
            Category::BATCH_MATRIX,
            Category::BATCH_THREE_D_ARRAY,
            Category::MATRIX_SEQUENCE,
            Category::THREE_D_ARRAY_SEQUENCE,
            Category::BATCH_MATRIX_SEQUENCE,
            Category::BATCH_THREE_D_ARRAY_SEQUENCE,
        ];
        for cate in legal_into_matrix {
            assert!(cate.collapses_into(Category::MATRIX), "{} -> Matrix", cate);
            assert!(cate.collapses_into(Category::SCALAR), "{} -> Scalar", cate);
        }
        assert!(Category::BATCH_THREE_D_ARRAY.collapses_into(Category::THREE_D_ARRAY));
        assert!(Category::THREE_D_ARRAY_SEQUENCE.collapses_into(Category::THREE_D_ARRAY));
        assert!(Category::BATCH_THREE_D_ARRAY_SEQUENCE.collapses_into(Category::THREE_D_ARRAY));

        assert!(Category::MATRIX.collapses_into(Category::MATRIX));
        assert!(!Category::BATCH_SCALAR.collapses_into(Category::MATRIX));
        assert!(!Category::BATCH_MATRIX.collapses_into(Category::THREE_D_ARRAY));
        assert!(!Category::THREE_D_ARRAY.collapses_into(Category::BATCH_MATRIX));
        assert!(!Category::MATRIX.collapses_into(Category::THREE_D_ARRAY));
    }

    #[test]
    fn test_broadcast() {
        let batch = Shape::batch(mat(), 4);
        assert_eq!(Shape::broadcast(&batch, &Shape::matrix(2, 3)).unwrap(), batch);
        assert_eq!(Shape::broadcast(&Shape::matrix(2, 3), &batch).unwrap(), batch);
        assert_eq!(Shape::broadcast(&Shape::scalar(), &batch).unwrap(), batch);
        assert_eq!(
            Shape::broadcast(&Shape::matrix(2, 3), &Shape::matrix(2, 3)).unwrap(),
            Shape::matrix(2, 3)
        );

        assert!(Shape::broadcast(&Shape::matrix(2, 3), &Shape::matrix(3, 2)).is_err());
        assert!(Shape::broadcast(&batch, &Shape::matrix(3, 2)).is_err());
        assert!(Shape::broadcast(&batch, &Shape::batch(mat(), 5)).is_err());
        let scalars = Shape::batch(Extents::Scalar, 4);
        assert!(Shape::broadcast(&scalars, &Shape::matrix(2, 3)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::matrix(10, 7).to_string(), "Matrix[10, 7]");
        assert_eq!(Shape::batch(mat(), 4).to_string(), "Batch[4] of Matrix[2, 3]");
        assert_eq!(
            Shape::batch_sequence(Extents::Scalar, vec![3, 1]).to_string(),
            "BatchSequence[3, 1] of Scalar"
        );
        assert_eq!(Category::BATCH_MATRIX_SEQUENCE.to_string(), "BatchMatrixSequence");
    }
}

use std::fmt::Debug;
use std::ops::{Index, IndexMut};

/// Dense row-major matrix of `f64` with a shape fixed at construction.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_list();
        for row in self.data.chunks(self.cols.max(1)) {
            dbg.entry(&row);
        }
        dbg.finish()
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (r, c) = index;
        assert!(r < self.rows);
        assert!(c < self.cols);

        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (r, c) = index;
        assert!(r < self.rows);
        assert!(c < self.cols);

        &mut self.data[r * self.cols + c]
    }
}

impl<const R: usize, const C: usize> From<[[f64; C]; R]> for Matrix {
    fn from(value: [[f64; C]; R]) -> Self {
        Matrix {
            rows: R,
            cols: C,
            data: value.iter().flatten().copied().collect(),
        }
    }
}

pub trait Resettable {
    fn reset(&mut self);
}

impl Resettable for Matrix {
    fn reset(&mut self) {
        self.data.iter_mut().for_each(|elem| *elem = 0.0);
    }
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Builds a `(len, 1)` column matrix.
    pub fn column(values: &[f64]) -> Matrix {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Matrix {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }

        Matrix { rows, cols, data }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn assert_same_shape(&self, other: &Matrix) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "element-wise operation on matrices of different shapes"
        );
    }

    /// Computes `self · x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.cols);

        self.data
            .chunks_exact(self.cols.max(1))
            .take(self.rows)
            .map(|row| row.iter().zip(x).map(|(w, x)| w * x).sum())
            .collect()
    }

    /// Computes `selfᵗ · u` without materialising the transpose.
    pub fn transpose_mul_vec(&self, u: &[f64]) -> Vec<f64> {
        assert_eq!(u.len(), self.rows);

        let mut out = vec![0.0; self.cols];
        for (row, u_elem) in self.data.chunks_exact(self.cols.max(1)).zip(u) {
            out.iter_mut()
                .zip(row)
                .for_each(|(out_elem, w)| *out_elem += u_elem * w);
        }

        out
    }

    /// Rank-one accumulate: `self += scale · a · bᵗ`.
    pub fn add_outer_ip(&mut self, scale: f64, a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), self.rows);
        assert_eq!(b.len(), self.cols);

        for (row, a_elem) in self.data.chunks_exact_mut(self.cols.max(1)).zip(a) {
            let factor = scale * a_elem;
            row.iter_mut()
                .zip(b)
                .for_each(|(elem, b_elem)| *elem += factor * b_elem);
        }
    }

    pub fn add_ip(&mut self, rhs: &Matrix) {
        self.zip_apply_ip(rhs, |lhs, rhs| *lhs += rhs);
    }

    pub fn sub_ip(&mut self, rhs: &Matrix) {
        self.zip_apply_ip(rhs, |lhs, rhs| *lhs -= rhs);
    }

    pub fn scalar_mul_ip(&mut self, scalar: f64) {
        self.data.iter_mut().for_each(|el| *el *= scalar);
    }

    pub fn scaled(&self, scalar: f64) -> Matrix {
        self.map(|el| el * scalar)
    }

    /// Combines every element of `self` with the element of `other` at the same position.
    pub fn zip_apply_ip(&mut self, other: &Matrix, mut f: impl FnMut(&mut f64, f64)) {
        self.assert_same_shape(other);

        self.data
            .iter_mut()
            .zip(&other.data)
            .for_each(|(lhs, rhs)| f(lhs, *rhs));
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|el| f(*el)).collect(),
        }
    }

    #[cfg(test)]
    pub fn transpose(&self) -> Matrix {
        Matrix::from_fn(self.cols, self.rows, |r, c| self[(c, r)])
    }
}

#![allow(clippy::needless_range_loop)]
//! Dense matrix operations backed by faer.
//!
//! Wraps faer's column-major Mat<f64> with the operations the REMIM
//! engine leans on: covariance assembly, traces of products, quadratic
//! forms, and row/column subsetting of kinship matrices.

use faer::Mat;

/// A dense matrix wrapper around faer's `Mat<f64>`.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    inner: Mat<f64>,
}

impl DenseMatrix {
    /// Create a new dense matrix filled with zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            inner: Mat::zeros(nrows, ncols),
        }
    }

    /// Create a dense matrix from an element function.
    pub fn from_fn(nrows: usize, ncols: usize, f: impl FnMut(usize, usize) -> f64) -> Self {
        Self {
            inner: Mat::from_fn(nrows, ncols, f),
        }
    }

    /// Create a dense matrix from a flat vec (column-major order).
    pub fn from_col_major(nrows: usize, ncols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        let inner = Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i]);
        Self { inner }
    }

    /// Create a dense matrix from a 2D slice (row-major input).
    pub fn from_row_major(nrows: usize, ncols: usize, data: &[f64]) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        let inner = Mat::from_fn(nrows, ncols, |i, j| data[i * ncols + j]);
        Self { inner }
    }

    /// Create an identity matrix of size n x n.
    pub fn identity(n: usize) -> Self {
        Self::from_diag(&vec![1.0; n])
    }

    /// Create a diagonal matrix from a vector.
    pub fn from_diag(diag: &[f64]) -> Self {
        let n = diag.len();
        let inner = Mat::from_fn(n, n, |i, j| if i == j { diag[i] } else { 0.0 });
        Self { inner }
    }

    /// Column vector of ones, the intercept-only design.
    pub fn ones_column(n: usize) -> Self {
        Self {
            inner: Mat::from_fn(n, 1, |_, _| 1.0),
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.read(row, col)
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner.write(row, col, value);
    }

    /// Matrix-vector product: self * v -> result vector.
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(self.ncols(), v.len());
        let n = self.nrows();
        let mut result = vec![0.0; n];
        for j in 0..self.ncols() {
            let vj = v[j];
            if vj == 0.0 {
                continue;
            }
            for i in 0..n {
                result[i] += self.inner.read(i, j) * vj;
            }
        }
        result
    }

    /// Matrix-matrix product: self * other.
    pub fn mat_mul(&self, other: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.ncols(), other.nrows());
        let result = &self.inner * &other.inner;
        DenseMatrix { inner: result }
    }

    /// Transpose.
    pub fn transpose(&self) -> DenseMatrix {
        let inner = self.inner.transpose().to_owned();
        DenseMatrix { inner }
    }

    /// Set an entire column from a slice.
    pub fn set_col(&mut self, j: usize, data: &[f64]) {
        assert_eq!(data.len(), self.nrows());
        for i in 0..self.nrows() {
            self.inner.write(i, j, data[i]);
        }
    }

    /// Element-wise addition: self + other.
    pub fn add(&self, other: &DenseMatrix) -> DenseMatrix {
        let mut out = self.clone();
        out.add_scaled(other, 1.0);
        out
    }

    /// In-place `self += s * other`.
    pub fn add_scaled(&mut self, other: &DenseMatrix, s: f64) {
        assert_eq!(self.nrows(), other.nrows());
        assert_eq!(self.ncols(), other.ncols());
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                let v = self.inner.read(i, j) + s * other.inner.read(i, j);
                self.inner.write(i, j, v);
            }
        }
    }

    /// Scalar multiplication.
    pub fn scale(&self, s: f64) -> DenseMatrix {
        let inner = Mat::from_fn(self.nrows(), self.ncols(), |i, j| self.inner.read(i, j) * s);
        DenseMatrix { inner }
    }

    /// Diagonal of a square matrix.
    pub fn diag(&self) -> Vec<f64> {
        let n = self.nrows().min(self.ncols());
        (0..n).map(|i| self.inner.read(i, i)).collect()
    }

    /// Trace of a square matrix.
    pub fn trace(&self) -> f64 {
        self.diag().iter().sum()
    }

    /// tr(self * other) without forming the product.
    pub fn trace_of_product(&self, other: &DenseMatrix) -> f64 {
        assert_eq!(self.ncols(), other.nrows());
        assert_eq!(self.nrows(), other.ncols());
        let mut sum = 0.0;
        for i in 0..self.nrows() {
            for k in 0..self.ncols() {
                sum += self.inner.read(i, k) * other.inner.read(k, i);
            }
        }
        sum
    }

    /// Quadratic form a' * self * b.
    pub fn quad_form(&self, a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(self.nrows(), a.len());
        let mb = self.mat_vec(b);
        Self::dot(a, &mb)
    }

    /// Rows and columns `idx` of a square matrix, in the given order.
    pub fn select_symmetric(&self, idx: &[usize]) -> DenseMatrix {
        let m = idx.len();
        let inner = Mat::from_fn(m, m, |i, j| self.inner.read(idx[i], idx[j]));
        DenseMatrix { inner }
    }

    /// Whether the matrix is square and symmetric within `tol`.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        if self.nrows() != self.ncols() {
            return false;
        }
        for j in 0..self.ncols() {
            for i in (j + 1)..self.nrows() {
                if (self.inner.read(i, j) - self.inner.read(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// Whether every element is finite.
    pub fn is_finite(&self) -> bool {
        (0..self.ncols()).all(|j| (0..self.nrows()).all(|i| self.inner.read(i, j).is_finite()))
    }

    /// Dot product of two vectors.
    pub fn dot(a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Extract column data as a flat Vec in column-major order.
    pub fn to_col_major(&self) -> Vec<f64> {
        let mut data = Vec::with_capacity(self.nrows() * self.ncols());
        for j in 0..self.ncols() {
            for i in 0..self.nrows() {
                data.push(self.inner.read(i, j));
            }
        }
        data
    }
}

impl std::fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                if j > 0 {
                    write!(f, "\t")?;
                }
                write!(f, "{:.6}", self.inner.read(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

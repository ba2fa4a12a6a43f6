//! Dense matrix storage with LU factorization.

use crate::error::{Result, TiaError};

/// Pivot magnitude below which a matrix is treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-15;

/// Square dense matrix in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    /// Matrix entries (row-major)
    pub a: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of `a`
    lu: Vec<f64>,
    /// Pivot indices for the LU decomposition
    pivots: Vec<usize>,
}

impl DenseMatrix {
    /// Create a zero matrix of dimension `size`.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Build a matrix from rows.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let n = rows.len();
        let mut m = Self::new(n);
        for (i, row) in rows.iter().enumerate() {
            TiaError::check_len("matrix row", n, row.len())?;
            m.a[i * n..(i + 1) * n].copy_from_slice(row);
        }
        Ok(m)
    }

    /// Clear all entries to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] = value;
    }

    /// Add to element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Stamp a two-terminal conductance-like term between `n1` and `n2`.
    /// `None` is the reference (ground) node.
    ///   A[n1,n1] += g
    ///   A[n2,n2] += g
    ///   A[n1,n2] -= g
    ///   A[n2,n1] -= g
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// `self = a * x + b * y`
    pub fn linear_combo(&mut self, a: f64, x: &DenseMatrix, b: f64, y: &DenseMatrix) -> Result<()> {
        TiaError::check_len("matrix", self.size, x.size)?;
        TiaError::check_len("matrix", self.size, y.size)?;
        for ((o, &xi), &yi) in self.a.iter_mut().zip(&x.a).zip(&y.a) {
            *o = a * xi + b * yi;
        }
        Ok(())
    }

    /// `out = self * v`
    pub fn mul_vec(&self, v: &[f64], out: &mut [f64]) {
        let n = self.size;
        debug_assert_eq!(v.len(), n);
        debug_assert_eq!(out.len(), n);
        for (i, o) in out.iter_mut().enumerate() {
            let row = &self.a[i * n..(i + 1) * n];
            *o = row.iter().zip(v).map(|(a, b)| a * b).sum();
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for (i, p) in self.pivots.iter_mut().enumerate() {
            *p = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < PIVOT_TOLERANCE {
                return Err(TiaError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve `A x = b` using the factorization from [`factor`](Self::factor).
    pub fn solve(&self, b: &[f64], x: &mut [f64]) -> Result<()> {
        let n = self.size;
        TiaError::check_len("right-hand side", n, b.len())?;
        TiaError::check_len("solution", n, x.len())?;

        for i in 0..n {
            x[i] = b[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_TOLERANCE {
                return Err(TiaError::SingularMatrix);
            }
            x[i] /= diag;
        }

        Ok(())
    }
}

//! Dense matrix primitives used by the network engine.
use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use std::io::{Read, Write};

/// A dense row-major matrix of `f64` cells.
///
/// Every binary operation returns a new matrix and requires compatible
/// operand dimensions; a shape violation is a fatal precondition failure and
/// panics with both shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix from flat row-major data.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            rows * cols,
            data.len(),
            "{}x{} matrix is incompatible with {} data elements",
            rows,
            cols,
            data.len()
        );
        Self { rows, cols, data }
    }

    /// Zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, vec![0.0; rows * cols])
    }

    /// Matrix with every cell set to `v`.
    pub fn filled(rows: usize, cols: usize, v: f64) -> Self {
        Self::new(rows, cols, vec![v; rows * cols])
    }

    /// Single-column matrix from a slice.
    pub fn column(values: &[f64]) -> Self {
        Self::new(values.len(), 1, values.to_vec())
    }

    /// Weight matrix initialized uniformly from (-1/sqrt(fan_in), 1/sqrt(fan_in)).
    pub fn random(rows: usize, cols: usize, fan_in: usize, rng: &mut impl Rng) -> Self {
        Self::new(rows, cols, random_array(rows * cols, fan_in as f64, rng))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    fn assert_same_shape(&self, other: &Self, op: &str) {
        assert!(
            self.rows == other.rows && self.cols == other.cols,
            "{} requires identical shapes, got {}x{} and {}x{}",
            op,
            self.rows,
            self.cols,
            other.rows,
            other.cols
        );
    }

    /// Matrix product.
    ///
    /// # Panics
    /// Panics unless `self.cols == other.rows`.
    pub fn dot(&self, other: &Self) -> Self {
        assert_eq!(
            self.cols, other.rows,
            "dot requires inner dimensions to match, got {}x{} and {}x{}",
            self.rows, self.cols, other.rows, other.cols
        );
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.at(i, k);
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.at(k, j);
                }
            }
        }
        out
    }

    /// Apply `f(row, col, value)` to every cell, returning a new matrix.
    pub fn apply(&self, mut f: impl FnMut(usize, usize, f64) -> f64) -> Self {
        let mut out = self.clone();
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[i * self.cols + j] = f(i, j, self.at(i, j));
            }
        }
        out
    }

    /// Multiply every cell by the scalar `s`.
    pub fn scale(&self, s: f64) -> Self {
        self.apply(|_, _, v| s * v)
    }

    /// Hadamard (elementwise) product.
    pub fn multiply(&self, other: &Self) -> Self {
        self.assert_same_shape(other, "multiply");
        self.apply(|i, j, v| v * other.at(i, j))
    }

    /// Elementwise sum.
    pub fn add(&self, other: &Self) -> Self {
        self.assert_same_shape(other, "add");
        self.apply(|i, j, v| v + other.at(i, j))
    }

    /// Elementwise difference.
    pub fn subtract(&self, other: &Self) -> Self {
        self.assert_same_shape(other, "subtract");
        self.apply(|i, j, v| v - other.at(i, j))
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.at(i, j);
            }
        }
        out
    }

    /// Write the matrix as u64 row count, u64 column count, then row-major
    /// f64 cells, all little-endian.
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_u64::<LittleEndian>(self.rows as u64)?;
        w.write_u64::<LittleEndian>(self.cols as u64)?;
        for &v in &self.data {
            w.write_f64::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Read a matrix in the `write_to` encoding. Round-trips exactly.
    pub fn read_from(r: &mut impl Read) -> Result<Self> {
        let rows = r.read_u64::<LittleEndian>()? as usize;
        let cols = r.read_u64::<LittleEndian>()? as usize;
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| anyhow!("corrupt matrix header: {}x{}", rows, cols))?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(r.read_f64::<LittleEndian>()?);
        }
        Ok(Self::new(rows, cols, data))
    }
}

/// Draw `n` samples uniformly from (-1/sqrt(v), 1/sqrt(v)), the
/// variance-scaled initialization range for a transition with fan-in `v`.
pub fn random_array(n: usize, v: f64, rng: &mut impl Rng) -> Vec<f64> {
    let limit = 1.0 / v.sqrt();
    (0..n).map(|_| rng.gen_range(-limit..limit)).collect()
}

//! Compressed sparse row adjacency.
//!
//! Rows index the node that gathers, columns the node being read. One
//! product with an N x F feature matrix costs O(E * F).

use crate::core::{Error, Result};
use ndarray::Array2;

/// Sparse N x N matrix in compressed sparse row form.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseAdjacency {
    num_nodes: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f32>,
}

impl SparseAdjacency {
    /// Build from coordinate triples, `(row, col)` paired with `values` by position.
    ///
    /// Entries within a row keep their input order.
    pub fn from_coo(num_nodes: usize, entries: &[(usize, usize)], values: &[f32]) -> Result<Self> {
        if entries.len() != values.len() {
            return Err(Error::shape("adjacency values", entries.len(), values.len()));
        }

        if let Some(&(row, col)) = entries
            .iter()
            .find(|&&(row, col)| row >= num_nodes || col >= num_nodes)
        {
            return Err(Error::MalformedInput(format!(
                "edge ({}, {}) out of range for {} nodes",
                row, col, num_nodes
            )));
        }

        Ok(Self::assemble(num_nodes, entries, values))
    }

    fn assemble(num_nodes: usize, entries: &[(usize, usize)], values: &[f32]) -> Self {
        let mut row_ptr = vec![0usize; num_nodes + 1];
        for &(row, _) in entries {
            row_ptr[row + 1] += 1;
        }
        for i in 0..num_nodes {
            row_ptr[i + 1] += row_ptr[i];
        }

        let mut cursor = row_ptr.clone();
        let mut col_idx = vec![0usize; entries.len()];
        let mut vals = vec![0.0f32; entries.len()];
        for (&(row, col), &v) in entries.iter().zip(values) {
            let slot = cursor[row];
            col_idx[slot] = col;
            vals[slot] = v;
            cursor[row] += 1;
        }

        Self {
            num_nodes,
            row_ptr,
            col_idx,
            values: vals,
        }
    }

    /// Number of nodes (rows and columns).
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// Columns and values stored in `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.num_nodes()`.
    pub fn row(&self, row: usize) -> (&[usize], &[f32]) {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Number of entries in `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.num_nodes()`.
    pub fn row_len(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate `(row, col, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.num_nodes).flat_map(move |r| {
            let (cols, vals) = self.row(r);
            cols.iter().zip(vals).map(move |(&c, &v)| (r, c, v))
        })
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let entries: Vec<(usize, usize)> = self.iter().map(|(r, c, _)| (c, r)).collect();
        let values: Vec<f32> = self.iter().map(|(_, _, v)| v).collect();
        Self::assemble(self.num_nodes, &entries, &values)
    }

    /// Matrix with no entries.
    pub fn empty(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            row_ptr: vec![0; num_nodes + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Sparse-dense product `self * x`.
    pub fn matmul(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.nrows() != self.num_nodes {
            return Err(Error::shape(
                "sparse product",
                format!("{} rows", self.num_nodes),
                format!("{} rows", x.nrows()),
            ));
        }

        let mut out = Array2::<f32>::zeros((self.num_nodes, x.ncols()));
        for (row, mut out_row) in out.outer_iter_mut().enumerate() {
            let (cols, vals) = self.row(row);
            for (&col, &w) in cols.iter().zip(vals) {
                out_row.scaled_add(w, &x.row(col));
            }
        }
        Ok(out)
    }

    /// Whether the matrix equals its transpose.
    pub fn is_symmetric(&self) -> bool {
        let mut forward: Vec<(usize, usize, u32)> =
            self.iter().map(|(r, c, v)| (r, c, v.to_bits())).collect();
        let mut backward: Vec<(usize, usize, u32)> =
            self.iter().map(|(r, c, v)| (c, r, v.to_bits())).collect();
        forward.sort_unstable();
        backward.sort_unstable();
        forward == backward
    }

    /// Dense copy, for inspection and tests.
    pub fn to_dense(&self) -> Array2<f32> {
        let mut dense = Array2::<f32>::zeros((self.num_nodes, self.num_nodes));
        for (r, c, v) in self.iter() {
            dense[[r, c]] += v;
        }
        dense
    }
}

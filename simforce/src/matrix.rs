//! This module provides a symmetric block-sparse matrix for assembling force gradients.
//!
//! A `SolidMatrixStructure` records which pairs of vertices are coupled. A `SolidMatrix` built
//! from it stores one `dim x dim` block per coupled pair and per vertex on the diagonal. Only the
//! upper triangle is stored; the lower triangle is implied by symmetry.

use std::collections::{BTreeMap, BTreeSet};

use na::DMatrix;
use sprs::{CsMat, TriMat};
use utils::{add_to_vertex, vertex};

use crate::{Error, VectorField};

/// Sparsity pattern of a symmetric block matrix over `n` vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct SolidMatrixStructure {
    n: usize,
    /// Off-diagonal pairs `(i, j)` with `i < j`.
    entries: BTreeSet<(usize, usize)>,
}

impl SolidMatrixStructure {
    pub fn new(n: usize) -> Self {
        SolidMatrixStructure {
            n,
            entries: BTreeSet::new(),
        }
    }

    /// Number of vertices (block rows).
    pub fn size(&self) -> usize {
        self.n
    }

    /// Declare a coupling between vertices `i` and `j`. Diagonal blocks are always present.
    pub fn add_entry(&mut self, i: usize, j: usize) {
        debug_assert!(i < self.n && j < self.n);
        if i != j {
            self.entries.insert((i.min(j), i.max(j)));
        }
    }

    /// Declare all couplings between the given vertices.
    pub fn add_element(&mut self, vertices: &[usize]) {
        for (a, &i) in vertices.iter().enumerate() {
            for &j in vertices[a + 1..].iter() {
                self.add_entry(i, j);
            }
        }
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        i == j && i < self.n || self.entries.contains(&(i.min(j), i.max(j)))
    }

    /// Number of stored off-diagonal blocks.
    pub fn num_off_diagonal(&self) -> usize {
        self.entries.len()
    }
}

/// A symmetric block-sparse matrix acting on vector fields of dimension `dim`.
#[derive(Clone, Debug)]
pub struct SolidMatrix {
    n: usize,
    dim: usize,
    /// Block position in `blocks` for every stored `(i, j)` with `i <= j`.
    index: BTreeMap<(usize, usize), usize>,
    blocks: Vec<DMatrix<f64>>,
}

impl SolidMatrix {
    pub fn new(structure: &SolidMatrixStructure, dim: usize) -> Self {
        let diagonal = (0..structure.n).map(|i| (i, i));
        let index: BTreeMap<_, _> = diagonal
            .chain(structure.entries.iter().cloned())
            .enumerate()
            .map(|(pos, ij)| (ij, pos))
            .collect();
        let blocks = vec![DMatrix::zeros(dim, dim); index.len()];
        SolidMatrix {
            n: structure.n,
            dim,
            index,
            blocks,
        }
    }

    /// Number of vertices (block rows).
    pub fn size(&self) -> usize {
        self.n
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Reset all blocks to zero, keeping the structure.
    pub fn zero(&mut self) {
        for block in self.blocks.iter_mut() {
            block.fill(0.0);
        }
    }

    /// Add `block` at block position `(i, j)`. For `i != j` this implicitly adds `block^T` at
    /// `(j, i)`, so each off-diagonal coupling should be added exactly once.
    pub fn add_entry(&mut self, i: usize, j: usize, block: &DMatrix<f64>) -> Result<(), Error> {
        debug_assert_eq!(block.shape(), (self.dim, self.dim));
        let key = (i.min(j), i.max(j));
        let &pos = self
            .index
            .get(&key)
            .ok_or(Error::MissingStructureEntry { row: i, col: j })?;
        if i <= j {
            self.blocks[pos] += block;
        } else {
            self.blocks[pos] += block.transpose();
        }
        Ok(())
    }

    /// The block stored at `(i, j)`, transposed if it is in the lower triangle.
    pub fn block(&self, i: usize, j: usize) -> Option<DMatrix<f64>> {
        let &pos = self.index.get(&(i.min(j), i.max(j)))?;
        if i <= j {
            Some(self.blocks[pos].clone())
        } else {
            Some(self.blocks[pos].transpose())
        }
    }

    /// Compute `out = A * x`.
    pub fn multiply(&self, x: &VectorField, out: &mut VectorField) {
        debug_assert_eq!(x.shape(), (self.n, self.dim));
        debug_assert_eq!(out.shape(), (self.n, self.dim));
        out.fill(0.0);
        for (&(i, j), &pos) in self.index.iter() {
            let block = &self.blocks[pos];
            add_to_vertex(out, i, &(block * vertex(x, j)));
            if i != j {
                add_to_vertex(out, j, &(block.tr_mul(&vertex(x, i))));
            }
        }
    }

    /// Expand into a scalar compressed sparse row matrix of size `n*dim x n*dim`, with
    /// vertex `i` coordinate `c` at row `i*dim + c`.
    pub fn to_csr(&self) -> CsMat<f64> {
        let d = self.dim;
        let size = self.n * d;
        let mut tri = TriMat::new((size, size));
        for (&(i, j), &pos) in self.index.iter() {
            let block = &self.blocks[pos];
            for r in 0..d {
                for c in 0..d {
                    let val = block[(r, c)];
                    if val == 0.0 {
                        continue;
                    }
                    tri.add_triplet(i * d + r, j * d + c, val);
                    if i != j {
                        tri.add_triplet(j * d + c, i * d + r, val);
                    }
                }
            }
        }
        tri.to_csr()
    }
}

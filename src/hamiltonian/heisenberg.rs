//! Antiferromagnetic Heisenberg models.
//!
//! Both variants share the same structure: a diagonal `Jz Σ s_i s_j` over the
//! bonds of the lattice, and for every anti-aligned bond an exchange element
//! flipping both of its spins.
//!
//! The exchange element is the constant -2 and does not scale with `Jz`;
//! the pretrained weight files assume this normalisation.

use num_complex::Complex64;
use tracing::{debug, info};

use super::{FlipSet, Hamiltonian, MatrixElements};
use crate::error::VmcError;

const EXCHANGE: f64 = -2.0;

fn bonds_find_conn(bonds: &[(usize, usize)], jz: f64, spins: &[i8], out: &mut MatrixElements) {
    let diagonal: f64 = bonds
        .iter()
        .map(|&(i, j)| f64::from(spins[i] * spins[j]))
        .sum();
    out.reset(Complex64::new(jz * diagonal, 0.0));

    for &(i, j) in bonds {
        if spins[i] == spins[j] {
            continue;
        }
        if let Some(flips) = FlipSet::pair(i, j) {
            out.push(flips, EXCHANGE);
        }
    }
}

/// Heisenberg chain.
#[derive(Clone, Debug)]
pub struct Heisenberg1d {
    n_sites: usize,
    jz: f64,
    bonds: Vec<(usize, usize)>,
}

impl Heisenberg1d {
    pub fn new(n_sites: usize, jz: f64, periodic: bool) -> Self {
        info!(n_sites, jz, periodic, "using the 1d Heisenberg model");
        let mut bonds: Vec<(usize, usize)> = (1..n_sites).map(|i| (i - 1, i)).collect();
        if periodic && n_sites > 1 {
            bonds.push((n_sites - 1, 0));
        }
        Self { n_sites, jz, bonds }
    }

    pub fn jz(&self) -> f64 {
        self.jz
    }
}

impl Hamiltonian for Heisenberg1d {
    fn n_sites(&self) -> usize {
        self.n_sites
    }

    fn find_conn(&self, spins: &[i8], out: &mut MatrixElements) {
        bonds_find_conn(&self.bonds, self.jz, spins, out);
    }

    fn min_flips(&self) -> usize {
        2
    }
}

/// L × L square lattice with row-major site numbering.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SquareLattice {
    pub length: usize,
    pub periodic: bool,
}

impl SquareLattice {
    /// Lattice holding exactly `n_sites` sites, which must be a perfect square.
    pub fn from_sites(n_sites: usize, periodic: bool) -> Result<Self, VmcError> {
        let length = (n_sites as f64).sqrt().round() as usize;
        if length * length != n_sites {
            return Err(VmcError::Configuration(format!(
                "{n_sites} sites do not form a square lattice"
            )));
        }
        Ok(Self { length, periodic })
    }

    pub fn n_sites(&self) -> usize {
        self.length * self.length
    }

    pub fn site(&self, row: usize, col: usize) -> usize {
        row * self.length + col
    }

    /// Nearest-neighbour bonds, each listed once (right and down neighbours).
    pub fn bonds(&self) -> Vec<(usize, usize)> {
        let l = self.length;
        let mut bonds = Vec::with_capacity(2 * l * l);
        for row in 0..l {
            for col in 0..l {
                let here = self.site(row, col);
                if col + 1 < l {
                    bonds.push((here, self.site(row, col + 1)));
                } else if self.periodic && l > 1 {
                    bonds.push((here, self.site(row, 0)));
                }
                if row + 1 < l {
                    bonds.push((here, self.site(row + 1, col)));
                } else if self.periodic && l > 1 {
                    bonds.push((here, self.site(0, col)));
                }
            }
        }
        bonds
    }
}

/// Heisenberg model on a square lattice.
#[derive(Clone, Debug)]
pub struct Heisenberg2d {
    lattice: SquareLattice,
    jz: f64,
    bonds: Vec<(usize, usize)>,
}

impl Heisenberg2d {
    pub fn new(n_sites: usize, jz: f64, periodic: bool) -> Result<Self, VmcError> {
        let lattice = SquareLattice::from_sites(n_sites, periodic)?;
        let bonds = lattice.bonds();
        info!(n_sites, jz, periodic, "using the 2d Heisenberg model");
        debug!(length = lattice.length, n_bonds = bonds.len(), "square lattice");
        Ok(Self { lattice, jz, bonds })
    }

    pub fn lattice(&self) -> &SquareLattice {
        &self.lattice
    }

    pub fn jz(&self) -> f64 {
        self.jz
    }
}

impl Hamiltonian for Heisenberg2d {
    fn n_sites(&self) -> usize {
        self.lattice.n_sites()
    }

    fn find_conn(&self, spins: &[i8], out: &mut MatrixElements) {
        bonds_find_conn(&self.bonds, self.jz, spins, out);
    }

    fn min_flips(&self) -> usize {
        2
    }
}

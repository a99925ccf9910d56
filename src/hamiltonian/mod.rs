//! Spin Hamiltonians and their non-zero matrix elements.
//!
//! For a configuration `s`, a Hamiltonian lists every `s'` with
//! `<s'|H|s> != 0`. Each `s'` is encoded as the set of sites to flip in `s`.
//! Entry 0 is always the diagonal element with an empty flip set.

mod ising;
mod heisenberg;

use num_complex::Complex64;

pub use heisenberg::{Heisenberg1d, Heisenberg2d, SquareLattice};
pub use ising::Ising1d;

/// One or two distinct sites to flip.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlipSet {
    sites: [usize; 2],
    len: u8,
}

impl FlipSet {
    pub const fn empty() -> Self {
        Self { sites: [0, 0], len: 0 }
    }

    pub const fn single(site: usize) -> Self {
        Self { sites: [site, 0], len: 1 }
    }

    /// Two sites, in the given order; `None` when `a == b`.
    pub fn pair(a: usize, b: usize) -> Option<Self> {
        (a != b).then_some(Self { sites: [a, b], len: 2 })
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.sites[..usize::from(self.len)]
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A connected configuration and its matrix element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MatrixElement {
    pub flips: FlipSet,
    pub value: Complex64,
}

/// Non-zero matrix elements of a Hamiltonian on one configuration.
#[derive(Clone, Debug, Default)]
pub struct MatrixElements {
    entries: Vec<MatrixElement>,
}

impl MatrixElements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries and store the diagonal element at index 0.
    pub fn reset(&mut self, diagonal: Complex64) {
        self.entries.clear();
        self.entries.push(MatrixElement { flips: FlipSet::empty(), value: diagonal });
    }

    pub fn push(&mut self, flips: FlipSet, value: f64) {
        self.entries.push(MatrixElement { flips, value: Complex64::new(value, 0.0) });
    }

    pub fn diagonal(&self) -> Complex64 {
        self.entries.first().map_or(Complex64::new(0.0, 0.0), |e| e.value)
    }

    pub fn off_diagonal(&self) -> &[MatrixElement] {
        self.entries.get(1..).unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatrixElement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a MatrixElements {
    type Item = &'a MatrixElement;
    type IntoIter = std::slice::Iter<'a, MatrixElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A spin Hamiltonian able to enumerate its matrix elements.
pub trait Hamiltonian {
    /// Number of sites the operator acts on.
    fn n_sites(&self) -> usize;

    /// Fill `out` with the non-zero elements `<s'|H|spins>`.
    ///
    /// Must not depend on anything but `spins`.
    fn find_conn(&self, spins: &[i8], out: &mut MatrixElements);

    /// Smallest flip set among the off-diagonal elements.
    fn min_flips(&self) -> usize;

    /// Allocating convenience around [`Hamiltonian::find_conn`].
    fn enumerate(&self, spins: &[i8]) -> MatrixElements {
        let mut out = MatrixElements::new();
        self.find_conn(spins, &mut out);
        out
    }
}

/// The Hamiltonians known to the driver, picked once per run.
#[derive(Clone, Debug)]
pub enum Model {
    Ising1d(Ising1d),
    Heisenberg1d(Heisenberg1d),
    Heisenberg2d(Heisenberg2d),
}

impl Hamiltonian for Model {
    fn n_sites(&self) -> usize {
        match self {
            Model::Ising1d(h) => h.n_sites(),
            Model::Heisenberg1d(h) => h.n_sites(),
            Model::Heisenberg2d(h) => h.n_sites(),
        }
    }

    fn find_conn(&self, spins: &[i8], out: &mut MatrixElements) {
        match self {
            Model::Ising1d(h) => h.find_conn(spins, out),
            Model::Heisenberg1d(h) => h.find_conn(spins, out),
            Model::Heisenberg2d(h) => h.find_conn(spins, out),
        }
    }

    fn min_flips(&self) -> usize {
        match self {
            Model::Ising1d(h) => h.min_flips(),
            Model::Heisenberg1d(h) => h.min_flips(),
            Model::Heisenberg2d(h) => h.min_flips(),
        }
    }
}

use num_complex::Complex64;
use tracing::info;

use super::{FlipSet, Hamiltonian, MatrixElements};

/// Transverse-field Ising chain, `H = -Σ σz_i σz_{i+1} - h Σ σx_i`.
#[derive(Clone, Debug)]
pub struct Ising1d {
    n_sites: usize,
    h_field: f64,
    periodic: bool,
}

impl Ising1d {
    pub fn new(n_sites: usize, h_field: f64, periodic: bool) -> Self {
        info!(n_sites, h_field, periodic, "using the 1d transverse-field Ising model");
        Self { n_sites, h_field, periodic }
    }

    pub fn h_field(&self) -> f64 {
        self.h_field
    }
}

impl Hamiltonian for Ising1d {
    fn n_sites(&self) -> usize {
        self.n_sites
    }

    fn find_conn(&self, spins: &[i8], out: &mut MatrixElements) {
        let mut diagonal: f64 = spins
            .windows(2)
            .map(|pair| -f64::from(pair[0] * pair[1]))
            .sum();
        if self.periodic && self.n_sites > 1 {
            diagonal -= f64::from(spins[self.n_sites - 1] * spins[0]);
        }
        out.reset(Complex64::new(diagonal, 0.0));

        for site in 0..self.n_sites {
            out.push(FlipSet::single(site), -self.h_field);
        }
    }

    fn min_flips(&self) -> usize {
        1
    }
}

//! NQS VMC - Variational Monte Carlo for neural-network quantum states
//!
//! This crate estimates the ground-state energy per site of spin chains from
//! a pretrained restricted Boltzmann machine: a Metropolis-Hastings walk over
//! spin configurations, local-energy measurements and a binning analysis.

pub mod error;
pub mod wavefunction;
pub mod hamiltonian;
pub mod sampling;
pub mod io;

mod tests;

// Re-export commonly used types at crate root
pub use error::VmcError;
pub use wavefunction::{ln_cosh, ln_cosh_real, Rbm, SpinState, SpinWfn};
pub use hamiltonian::{FlipSet, Hamiltonian, Heisenberg1d, Heisenberg2d, Ising1d, MatrixElement, MatrixElements, Model, SquareLattice};
pub use sampling::{binning_analysis, local_energy, AcceptanceStats, EnergyEstimator, EnergyReport, MonteCarloSampler, Proposal, RunParams, RunningStats, VmcResults};
pub use io::{model_from_filename, parse_rbm, read_rbm, read_run_config, write_rbm, ModelKind, RunConfig};

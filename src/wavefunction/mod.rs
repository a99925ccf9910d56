//! Wavefunction module - neural-network quantum states and their cached evaluation.

mod traits;
mod rbm;
mod state;

pub use traits::SpinWfn;
pub use rbm::{ln_cosh, ln_cosh_real, Rbm};
pub use state::SpinState;

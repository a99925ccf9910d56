//! IO module - weight files and run configuration.

mod config;
mod weights;

pub use config::{coupling_from_filename, model_from_filename, read_run_config, ModelKind, RunConfig};
pub use weights::{parse_rbm, read_rbm, write_rbm};

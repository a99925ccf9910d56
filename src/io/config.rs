//! Run configuration and model selection.
//!
//! Weight files carry the model in their name, e.g. `Ising1d_40_1.0_2.wf` or
//! `Heisenberg1d_40_1_1.wf`: the model is found by substring and the coupling
//! (transverse field `h` or `Jz`) is the third `_`-separated token.
//!
//! Optional sampling settings can be given in a YAML file:
//!
//! ```yaml
//! therm_factor: 0.1
//! sweep_factor: 1
//! n_flips: 2
//! n_blocks: 50
//! zero_magnetization: true
//! periodic: true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VmcError;
use crate::hamiltonian::{Heisenberg1d, Heisenberg2d, Ising1d, Model};
use crate::sampling::RunParams;

/// Optional overrides of the sampling defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub therm_factor: Option<f64>,
    pub sweep_factor: Option<usize>,
    pub n_flips: Option<usize>,
    pub n_blocks: Option<usize>,
    pub zero_magnetization: Option<bool>,
    pub periodic: Option<bool>,
}

impl RunConfig {
    /// Overlay the fields that are set onto `params`.
    pub fn apply(&self, mut params: RunParams) -> RunParams {
        if let Some(f) = self.therm_factor {
            params.therm_factor = f;
        }
        if let Some(f) = self.sweep_factor {
            params.sweep_factor = f;
        }
        if let Some(n) = self.n_flips {
            params.n_flips = Some(n);
        }
        if let Some(n) = self.n_blocks {
            params.n_blocks = n;
        }
        if let Some(on) = self.zero_magnetization {
            params.zero_magnetization = Some(on);
        }
        params
    }

    pub fn periodic(&self) -> bool {
        self.periodic.unwrap_or(true)
    }
}

/// Read a [`RunConfig`] from a YAML file.
pub fn read_run_config<P: AsRef<Path>>(path: P) -> Result<RunConfig, VmcError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    serde_yaml::from_reader(reader)
        .map_err(|e| VmcError::Configuration(format!("{}: {e}", path.display())))
}

/// The Hamiltonians that can be inferred from a weight file name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModelKind {
    Ising1d,
    Heisenberg1d,
    Heisenberg2d,
}

fn file_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map_or_else(|| filename.to_owned(), |n| n.to_string_lossy().into_owned())
}

impl ModelKind {
    pub fn from_filename(filename: &str) -> Result<Self, VmcError> {
        let name = file_name(filename);
        if name.contains("Ising") {
            Ok(ModelKind::Ising1d)
        } else if name.contains("Heisenberg1d") {
            Ok(ModelKind::Heisenberg1d)
        } else if name.contains("Heisenberg2d") {
            Ok(ModelKind::Heisenberg2d)
        } else {
            Err(VmcError::Configuration(format!(
                "{filename} does not name one of the implemented Hamiltonians (Ising, Heisenberg1d, Heisenberg2d)"
            )))
        }
    }
}

/// The coupling constant encoded as the third `_`-separated token of the file name.
///
/// The token must be followed by another `_`.
pub fn coupling_from_filename(filename: &str) -> Result<f64, VmcError> {
    let name = file_name(filename);
    let parts: Vec<&str> = name.split('_').collect();
    if parts.len() < 4 {
        return Err(VmcError::Configuration(format!(
            "{filename} is not in the <model>_<size>_<coupling>_<...> format"
        )));
    }
    parts[2].parse::<f64>().map_err(|e| {
        VmcError::Configuration(format!("invalid coupling {:?} in {filename}: {e}", parts[2]))
    })
}

/// Build the Hamiltonian named by `filename` on `n_sites` sites.
pub fn model_from_filename(filename: &str, n_sites: usize, periodic: bool) -> Result<Model, VmcError> {
    let kind = ModelKind::from_filename(filename)?;
    let coupling = coupling_from_filename(filename)?;
    Ok(match kind {
        ModelKind::Ising1d => Model::Ising1d(Ising1d::new(n_sites, coupling, periodic)),
        ModelKind::Heisenberg1d => Model::Heisenberg1d(Heisenberg1d::new(n_sites, coupling, periodic)),
        ModelKind::Heisenberg2d => Model::Heisenberg2d(Heisenberg2d::new(n_sites, coupling, periodic)?),
    })
}

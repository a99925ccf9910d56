//! Text format of RBM parameters.
//!
//! ```text
//! Nv Nh
//! a_0 ... a_{Nv-1}
//! b_0 ... b_{Nh-1}
//! W_00 W_01 ... W_{Nv-1,Nh-1}      (row-major, Nv rows of Nh values)
//! ```
//!
//! Complex numbers are written `(re,im)`; a bare real number or `(re)` is
//! read with a zero imaginary part. Tokens are separated by any whitespace.

use std::fs;
use std::io::Write;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::info;

use crate::error::VmcError;
use crate::wavefunction::Rbm;

struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let text = self.rest.trim_start();
        if text.is_empty() {
            self.rest = text;
            return None;
        }
        // a parenthesised complex number may contain blanks
        let end = if text.starts_with('(') {
            text.find(')').map_or(text.len(), |i| i + 1)
        } else {
            text.find(char::is_whitespace).unwrap_or(text.len())
        };
        let (token, rest) = text.split_at(end);
        self.rest = rest;
        Some(token)
    }

    fn require(&mut self, what: &str) -> Result<&'a str, VmcError> {
        self.next_token()
            .ok_or_else(|| VmcError::Load(format!("file ends before {what}")))
    }
}

fn parse_real(token: &str, what: &str) -> Result<f64, VmcError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|e| VmcError::Load(format!("invalid number {token:?} for {what}: {e}")))
}

fn parse_complex(token: &str, what: &str) -> Result<Complex64, VmcError> {
    match token.strip_prefix('(') {
        Some(inner) => {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| VmcError::Load(format!("unterminated complex number for {what}")))?;
            match inner.split_once(',') {
                Some((re, im)) => Ok(Complex64::new(parse_real(re, what)?, parse_real(im, what)?)),
                None => Ok(Complex64::new(parse_real(inner, what)?, 0.0)),
            }
        }
        None => Ok(Complex64::new(parse_real(token, what)?, 0.0)),
    }
}

fn parse_dimension(token: &str, what: &str) -> Result<usize, VmcError> {
    let value: i64 = token
        .parse()
        .map_err(|e| VmcError::Load(format!("invalid {what} {token:?}: {e}")))?;
    usize::try_from(value).map_err(|_| VmcError::Load(format!("negative {what}: {value}")))
}

/// Parse RBM parameters from the text format.
pub fn parse_rbm(text: &str) -> Result<Rbm, VmcError> {
    let mut tokens = Tokens::new(text);
    let n_visible = parse_dimension(tokens.require("Nv")?, "number of visible units")?;
    let n_hidden = parse_dimension(tokens.require("Nh")?, "number of hidden units")?;

    let mut visible = Vec::with_capacity(n_visible);
    for v in 0..n_visible {
        let what = format!("visible bias {v}");
        visible.push(parse_complex(tokens.require(&what)?, &what)?);
    }
    let mut hidden = Vec::with_capacity(n_hidden);
    for h in 0..n_hidden {
        let what = format!("hidden bias {h}");
        hidden.push(parse_complex(tokens.require(&what)?, &what)?);
    }
    let mut weights = Vec::with_capacity(n_visible * n_hidden);
    for v in 0..n_visible {
        for h in 0..n_hidden {
            let what = format!("weight ({v}, {h})");
            weights.push(parse_complex(tokens.require(&what)?, &what)?);
        }
    }

    Rbm::new(
        DVector::from_vec(visible),
        DVector::from_vec(hidden),
        DMatrix::from_row_slice(n_visible, n_hidden, &weights),
    )
}

/// Load RBM parameters from `path`.
pub fn read_rbm<P: AsRef<Path>>(path: P) -> Result<Rbm, VmcError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| VmcError::Load(format!("cannot read {}: {e}", path.display())))?;
    let rbm = parse_rbm(&text).map_err(|e| match e {
        VmcError::Load(msg) => VmcError::Load(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    info!(
        path = %path.display(),
        n_visible = rbm.n_visible(),
        n_hidden = rbm.n_hidden(),
        "wavefunction loaded"
    );
    Ok(rbm)
}

fn write_complex<O: Write>(out: &mut O, z: &Complex64) -> std::io::Result<()> {
    write!(out, "({},{}) ", z.re, z.im)
}

/// Write RBM parameters in the format read by [`parse_rbm`].
pub fn write_rbm<O: Write>(rbm: &Rbm, out: &mut O) -> std::io::Result<()> {
    writeln!(out, "{} {}", rbm.n_visible(), rbm.n_hidden())?;
    for a in rbm.visible_bias().iter() {
        write_complex(out, a)?;
    }
    writeln!(out)?;
    for b in rbm.hidden_bias().iter() {
        write_complex(out, b)?;
    }
    writeln!(out)?;
    for row in rbm.weights().row_iter() {
        for w in row.iter() {
            write_complex(out, w)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

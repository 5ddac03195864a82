use crate::errors::{GridError, GridResult};
use serde::{Deserialize, Serialize};

/// Physical parameters of a template: component masses (solar masses) and aligned spins.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParams {
    pub mass1: f64,
    pub mass2: f64,
    pub spin1z: f64,
    pub spin2z: f64,
}

impl PhysicalParams {
    #[must_use]
    pub fn new(mass1: f64, mass2: f64, spin1z: f64, spin2z: f64) -> PhysicalParams {
        PhysicalParams {
            mass1,
            mass2,
            spin1z,
            spin2z,
        }
    }

    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.mass1 + self.mass2
    }

    #[must_use]
    pub fn features(&self) -> [f64; 4] {
        [self.mass1, self.mass2, self.spin1z, self.spin2z]
    }
}

/// A template held by the index.
///
/// `xis` holds one coordinate vector per frame; a bank with a single fixed cutoff
/// has one frame, a bank with varying cutoffs has one frame per discretized
/// frequency. All frames share the same dimensionality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BankPoint {
    pub params: PhysicalParams,
    xis: Vec<Vec<f64>>,
}

impl BankPoint {
    /// A point with a single frame.
    pub fn new(params: PhysicalParams, xi: Vec<f64>) -> GridResult<BankPoint> {
        Self::with_frames(params, vec![xi])
    }

    pub fn with_frames(params: PhysicalParams, xis: Vec<Vec<f64>>) -> GridResult<BankPoint> {
        let dimension = xis.first().map_or(0, Vec::len);
        if dimension < 2 {
            return Err(GridError::DimensionMismatch {
                expected: 2,
                found: dimension,
            });
        }
        for xi in &xis {
            if xi.len() != dimension {
                return Err(GridError::DimensionMismatch {
                    expected: dimension,
                    found: xi.len(),
                });
            }
            check_finite(xi)?;
        }
        Ok(BankPoint { params, xis })
    }

    /// The xi vector of the first frame.
    #[must_use]
    pub fn xi(&self) -> &[f64] {
        &self.xis[0]
    }

    #[must_use]
    pub fn frame(&self, frame: usize) -> Option<&[f64]> {
        self.xis.get(frame).map(Vec::as_slice)
    }

    pub(crate) fn frame_xi(&self, frame: usize) -> &[f64] {
        &self.xis[frame]
    }

    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.xis.len()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.xis[0].len()
    }
}

pub(crate) fn check_finite(xi: &[f64]) -> GridResult<()> {
    match xi.iter().position(|x| !x.is_finite()) {
        Some(coordinate) => Err(GridError::DegenerateInput {
            coordinate,
            value: xi[coordinate],
        }),
        None => Ok(()),
    }
}

use crate::{
    errors::{GridError, GridResult},
    point::{BankPoint, PhysicalParams},
};

/// Maps physical parameters to xi coordinates, one frame per discretized cutoff.
///
/// Implementations are pure; the same parameters always map to the same coordinates.
pub trait XiMapper: Sync {
    fn dimension(&self) -> usize;

    fn num_frames(&self) -> usize;

    fn xi_coordinates(&self, params: &PhysicalParams, frame: usize) -> Vec<f64>;

    /// A bank point carrying the coordinates of every frame.
    fn bank_point(&self, params: PhysicalParams) -> GridResult<BankPoint> {
        let xis = (0..self.num_frames())
            .map(|frame| self.xi_coordinates(&params, frame))
            .collect();
        BankPoint::with_frames(params, xis)
    }
}

/// Eigenbasis of the local metric at one reference frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct Eigenbasis {
    pub evals: Vec<f64>,
    /// `evecs[j][i]` is component `j` of eigenvector `i`.
    pub evecs: Vec<Vec<f64>>,
}

/// Projects `[mass1, mass2, spin1z, spin2z]` through a precomputed eigenbasis
/// per frame: `xi_i = sqrt(eval_i) * sum_j evecs[j][i] * feature_j`.
#[derive(Clone, Debug)]
pub struct LinearXiMapper {
    bases: Vec<Eigenbasis>,
    dimension: usize,
}

impl LinearXiMapper {
    pub fn new(bases: Vec<Eigenbasis>) -> GridResult<Self> {
        let dimension = bases.first().map_or(0, |basis| basis.evals.len());
        if dimension < 2 {
            return Err(GridError::DimensionMismatch {
                expected: 2,
                found: dimension,
            });
        }
        for basis in &bases {
            if basis.evals.len() != dimension {
                return Err(GridError::DimensionMismatch {
                    expected: dimension,
                    found: basis.evals.len(),
                });
            }
            if basis.evals.iter().any(|e| !e.is_finite() || *e < 0.0) {
                return Err(GridError::configuration("eigenvalues must be non-negative"));
            }
            if basis.evecs.len() != 4 || basis.evecs.iter().any(|row| row.len() != dimension) {
                return Err(GridError::configuration(format!(
                    "eigenvectors must form a 4 x {dimension} matrix"
                )));
            }
        }
        Ok(LinearXiMapper { bases, dimension })
    }

    /// A single-frame mapper that scales each physical parameter independently.
    pub fn diagonal(scales: [f64; 4]) -> GridResult<Self> {
        let evals = scales.iter().map(|s| s * s).collect();
        let evecs = (0..4)
            .map(|j| (0..4).map(|i| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self::new(vec![Eigenbasis { evals, evecs }])
    }
}

impl XiMapper for LinearXiMapper {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn num_frames(&self) -> usize {
        self.bases.len()
    }

    fn xi_coordinates(&self, params: &PhysicalParams, frame: usize) -> Vec<f64> {
        let basis = &self.bases[frame];
        let features = params.features();
        (0..self.dimension)
            .map(|i| {
                let projected: f64 = features
                    .iter()
                    .zip(basis.evecs.iter())
                    .map(|(f, row)| f * row[i])
                    .sum();
                projected * basis.evals[i].sqrt()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Eigenbasis, LinearXiMapper, XiMapper};
    use crate::point::PhysicalParams;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn diagonal_scales_parameters() {
        let mapper = LinearXiMapper::diagonal([2.0, 3.0, 0.5, 1.0]).unwrap();
        let params = PhysicalParams::new(1.0, 2.0, 0.4, -0.2);
        let xi = mapper.xi_coordinates(&params, 0);
        assert_eq!(xi.len(), 4);
        assert_approx_eq!(xi[0], 2.0);
        assert_approx_eq!(xi[1], 6.0);
        assert_approx_eq!(xi[2], 0.2);
        assert_approx_eq!(xi[3], -0.2);
    }

    #[test]
    fn projects_onto_eigenvectors() {
        // Two eigenvectors mixing the masses, ignoring the spins
        let s = 0.5_f64.sqrt();
        let basis = Eigenbasis {
            evals: vec![4.0, 1.0],
            evecs: vec![vec![s, s], vec![s, -s], vec![0.0, 0.0], vec![0.0, 0.0]],
        };
        let mapper = LinearXiMapper::new(vec![basis.clone(), basis]).unwrap();
        assert_eq!(mapper.num_frames(), 2);

        let point = mapper
            .bank_point(PhysicalParams::new(3.0, 1.0, 0.9, 0.9))
            .unwrap();
        assert_eq!(point.num_frames(), 2);
        assert_approx_eq!(point.xi()[0], 2.0 * 4.0 * s);
        assert_approx_eq!(point.xi()[1], 2.0 * s);
    }

    #[test]
    fn rejects_malformed_bases() {
        let basis = Eigenbasis {
            evals: vec![1.0, 1.0],
            evecs: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        assert!(LinearXiMapper::new(vec![basis]).is_err());
        assert!(LinearXiMapper::new(vec![]).is_err());
    }
}

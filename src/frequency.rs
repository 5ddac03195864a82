//! Discretized upper-frequency cutoffs and the formulas that assign them.
use crate::{
    errors::{GridError, GridResult},
    point::PhysicalParams,
};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::{f64::consts::PI, str::FromStr};

/// Solar mass in seconds (G M_sun / c^3).
pub const MTSUN_SI: f64 = 4.925_491_025_543_576e-6;

// Upper bound on the number of discretized cutoffs a range may expand to.
const MAX_FREQUENCIES: usize = 100_000;

/// Named formula giving a template's upper-frequency cutoff from its masses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CutoffFormula {
    /// Gravitational-wave frequency at the Schwarzschild innermost stable circular orbit.
    SchwarzIsco,
    /// Gravitational-wave frequency at the Schwarzschild light ring.
    LightRing,
    /// The same cutoff for every template.
    Fixed(f64),
}

impl CutoffFormula {
    #[must_use]
    pub fn frequency(&self, params: &PhysicalParams) -> f64 {
        let total_mass = params.total_mass() * MTSUN_SI;
        match self {
            CutoffFormula::SchwarzIsco => 1.0 / (6.0_f64.powf(1.5) * PI * total_mass),
            CutoffFormula::LightRing => 1.0 / (3.0_f64.powf(1.5) * PI * total_mass),
            CutoffFormula::Fixed(frequency) => *frequency,
        }
    }
}

impl FromStr for CutoffFormula {
    type Err = GridError;

    fn from_str(name: &str) -> GridResult<Self> {
        match name {
            "SchwarzISCO" => Ok(CutoffFormula::SchwarzIsco),
            "LightRing" => Ok(CutoffFormula::LightRing),
            _ => match name.strip_prefix("Fixed:").map(str::parse::<f64>) {
                Some(Ok(frequency)) if frequency.is_finite() && frequency > 0.0 => {
                    Ok(CutoffFormula::Fixed(frequency))
                }
                _ => Err(GridError::configuration(format!(
                    "unknown cutoff formula {name:?}, expected SchwarzISCO, LightRing or Fixed:<hz>"
                ))),
            },
        }
    }
}

/// What to do with a cutoff outside the discretized range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfRangePolicy {
    /// Use the nearest endpoint.
    #[default]
    Clamp,
    /// Fail with [`GridError::FrequencyOutOfRange`].
    Reject,
}

impl FromStr for OutOfRangePolicy {
    type Err = GridError;

    fn from_str(name: &str) -> GridResult<Self> {
        match name {
            "clamp" => Ok(OutOfRangePolicy::Clamp),
            "reject" => Ok(OutOfRangePolicy::Reject),
            _ => Err(GridError::configuration(format!(
                "unknown out-of-range policy {name:?}, expected clamp or reject"
            ))),
        }
    }
}

/// Ascending list of discretized cutoff frequencies, each with the signal
/// normalization accumulated up to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMap {
    frequencies: Vec<f64>,
    norms: Vec<f64>,
}

impl FrequencyMap {
    /// A map with unit normalization at every frequency.
    pub fn new(frequencies: Vec<f64>) -> GridResult<Self> {
        let norms = vec![1.0; frequencies.len()];
        Self::with_norms(frequencies, norms)
    }

    pub fn with_norms(frequencies: Vec<f64>, norms: Vec<f64>) -> GridResult<Self> {
        if frequencies.is_empty() {
            return Err(GridError::configuration("at least one cutoff frequency is required"));
        }
        if frequencies.len() != norms.len() {
            return Err(GridError::configuration(format!(
                "{} cutoff frequencies but {} normalizations",
                frequencies.len(),
                norms.len()
            )));
        }
        if frequencies.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(GridError::configuration("cutoff frequencies must be positive"));
        }
        if frequencies.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GridError::configuration(
                "cutoff frequencies must be strictly increasing",
            ));
        }
        if norms.iter().any(|n| !n.is_finite() || *n <= 0.0) {
            return Err(GridError::configuration("normalizations must be positive"));
        }
        // Normalizations accumulate with frequency
        if norms.windows(2).any(|w| w[0] > w[1]) {
            return Err(GridError::configuration(
                "normalizations must not decrease with frequency",
            ));
        }
        Ok(FrequencyMap { frequencies, norms })
    }

    /// Cutoffs from `min` to `max` in steps of `step`; both endpoints are included.
    pub fn from_range(min: f64, max: f64, step: f64) -> GridResult<Self> {
        if !(min > 0.0 && max >= min && step > 0.0) || !max.is_finite() {
            return Err(GridError::configuration(format!(
                "invalid cutoff range {min}..{max} with step {step}"
            )));
        }
        let mut frequencies = vec![min];
        let mut i = 1.0;
        loop {
            let frequency = min + i * step;
            // Absorb a final step that lands on max up to rounding.
            if frequency >= max - step * 1e-9 {
                break;
            }
            frequencies.push(frequency);
            if frequencies.len() > MAX_FREQUENCIES {
                return Err(GridError::configuration(format!(
                    "cutoff range {min}..{max} with step {step} has too many frequencies"
                )));
            }
            i += 1.0;
        }
        if max > min {
            frequencies.push(max);
        }
        Self::new(frequencies)
    }

    /// Index of the discretized cutoff nearest to `frequency`. Ties go to the lower one.
    pub fn nearest(&self, frequency: f64, policy: OutOfRangePolicy) -> GridResult<usize> {
        if frequency.is_nan() {
            return Err(GridError::DegenerateInput {
                coordinate: 0,
                value: frequency,
            });
        }
        let min = self.frequencies[0];
        let max = self.frequencies[self.frequencies.len() - 1];
        if policy == OutOfRangePolicy::Reject && (frequency < min || frequency > max) {
            return Err(GridError::FrequencyOutOfRange {
                frequency,
                min,
                max,
            });
        }
        Ok(self
            .frequencies
            .iter()
            .enumerate()
            .min_by_key(|(_, &f)| OrderedFloat((f - frequency).abs()))
            .map_or(0, |(i, _)| i))
    }

    /// Applies `formula` to `params` and maps the result with [`FrequencyMap::nearest`].
    pub fn nearest_cutoff(
        &self,
        formula: CutoffFormula,
        params: &PhysicalParams,
        policy: OutOfRangePolicy,
    ) -> GridResult<usize> {
        self.nearest(formula.frequency(params), policy)
    }

    #[must_use]
    pub fn frequency(&self, index: usize) -> f64 {
        self.frequencies[index]
    }

    #[must_use]
    pub fn norm(&self, index: usize) -> f64 {
        self.norms[index]
    }

    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

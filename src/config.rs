//! Options for building and querying a bank, passed explicitly to the verifier.
use crate::{
    errors::{GridError, GridResult},
    frequency::{CutoffFormula, FrequencyMap, OutOfRangePolicy},
};
use std::{fs::read_to_string, path::Path};
use yaml_rust::{Yaml, YamlLoader};

/// Settings for banks whose metric depends on a per-template upper-frequency cutoff.
#[derive(Clone, Debug, PartialEq)]
pub struct VaryingConfig {
    pub cutoff_formula: CutoffFormula,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub frequency_step: f64,
    pub neighbor_span: usize,
    pub out_of_range: OutOfRangePolicy,
}

impl VaryingConfig {
    pub fn frequency_map(&self) -> GridResult<FrequencyMap> {
        FrequencyMap::from_range(self.min_frequency, self.max_frequency, self.frequency_step)
    }
}

/// The bin spacing is always `sqrt(max_mismatch)`; it cannot be set on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifierConfig {
    pub max_mismatch: f64,
    pub varying: Option<VaryingConfig>,
    pub parallel_build: bool,
    pub rng_seed: Option<u64>,
    pub fitting_factor_threshold: f64,
}

impl Default for VerifierConfig {
    fn default() -> VerifierConfig {
        VerifierConfig {
            max_mismatch: 0.03,
            varying: None,
            parallel_build: true,
            rng_seed: None,
            fitting_factor_threshold: 0.97,
        }
    }
}

impl VerifierConfig {
    #[must_use]
    pub fn new() -> VerifierConfig {
        VerifierConfig::default()
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let config = read_to_string(&path)?;
        Self::from_yaml_str(&config)
    }

    /// Missing keys keep their defaults.
    pub fn from_yaml_str(config: &str) -> GridResult<Self> {
        let docs = YamlLoader::load_from_str(config)
            .map_err(|e| GridError::configuration(format!("malformed yaml: {e}")))?;
        let defaults = VerifierConfig::default();
        let params = match docs.first() {
            Some(params) => params,
            None => return Ok(defaults),
        };

        let varying = match &params["vary_fupper"] {
            Yaml::BadValue | Yaml::Null => None,
            varying => Some(VaryingConfig {
                cutoff_formula: string_field(varying, "cutoff_formula")?
                    .unwrap_or("SchwarzISCO")
                    .parse()?,
                min_frequency: required_f64(varying, "min_frequency")?,
                max_frequency: required_f64(varying, "max_frequency")?,
                frequency_step: required_f64(varying, "frequency_step")?,
                neighbor_span: usize_field(varying, "neighbor_span")?.unwrap_or(1),
                out_of_range: string_field(varying, "out_of_range")?
                    .unwrap_or("clamp")
                    .parse()?,
            }),
        };

        let config = VerifierConfig {
            max_mismatch: f64_field(params, "max_mismatch")?.unwrap_or(defaults.max_mismatch),
            varying,
            parallel_build: match &params["parallel_build"] {
                Yaml::BadValue => defaults.parallel_build,
                value => value.as_bool().ok_or_else(|| invalid("parallel_build"))?,
            },
            rng_seed: usize_field(params, "rng_seed")?.map(|seed| seed as u64),
            fitting_factor_threshold: f64_field(params, "fitting_factor_threshold")?
                .unwrap_or(defaults.fitting_factor_threshold),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GridResult<()> {
        if !self.max_mismatch.is_finite() || self.max_mismatch <= 0.0 {
            return Err(GridError::configuration(format!(
                "max_mismatch must be positive, got {}",
                self.max_mismatch
            )));
        }
        if !(0.0..=1.0).contains(&self.fitting_factor_threshold) {
            return Err(GridError::configuration(format!(
                "fitting_factor_threshold must lie in [0, 1], got {}",
                self.fitting_factor_threshold
            )));
        }
        if let Some(varying) = &self.varying {
            varying.frequency_map()?;
        }
        Ok(())
    }

    /// See [`VerifierConfig`] for docs
    pub fn set_max_mismatch(&mut self, x: f64) -> &mut Self {
        self.max_mismatch = x;
        self
    }
    /// See [`VaryingConfig`] for docs
    pub fn set_varying(&mut self, x: VaryingConfig) -> &mut Self {
        self.varying = Some(x);
        self
    }
    /// Bins bank points on the rayon pool when set.
    pub fn set_parallel_build(&mut self, x: bool) -> &mut Self {
        self.parallel_build = x;
        self
    }
    /// Seed for query point sampling.
    pub fn set_rng_seed(&mut self, x: u64) -> &mut Self {
        self.rng_seed = Some(x);
        self
    }
    /// Fitting factor a query must reach to count as covered.
    pub fn set_fitting_factor_threshold(&mut self, x: f64) -> &mut Self {
        self.fitting_factor_threshold = x;
        self
    }
}

fn invalid(key: &str) -> GridError {
    GridError::configuration(format!("invalid value for {key}"))
}

fn f64_field(yaml: &Yaml, key: &str) -> GridResult<Option<f64>> {
    match &yaml[key] {
        Yaml::BadValue => Ok(None),
        Yaml::Real(_) => yaml[key].as_f64().map(Some).ok_or_else(|| invalid(key)),
        #[allow(clippy::cast_precision_loss)]
        Yaml::Integer(i) => Ok(Some(*i as f64)),
        _ => Err(invalid(key)),
    }
}

fn required_f64(yaml: &Yaml, key: &str) -> GridResult<f64> {
    f64_field(yaml, key)?
        .ok_or_else(|| GridError::configuration(format!("vary_fupper requires {key}")))
}

fn usize_field(yaml: &Yaml, key: &str) -> GridResult<Option<usize>> {
    match &yaml[key] {
        Yaml::BadValue => Ok(None),
        Yaml::Integer(i) => usize::try_from(*i).map(Some).map_err(|_| invalid(key)),
        _ => Err(invalid(key)),
    }
}

fn string_field<'a>(yaml: &'a Yaml, key: &str) -> GridResult<Option<&'a str>> {
    match &yaml[key] {
        Yaml::BadValue => Ok(None),
        value => value.as_str().map(Some).ok_or_else(|| invalid(key)),
    }
}

//! Checks how well a template bank covers a set of query points.
use crate::{
    config::VerifierConfig,
    distance::fitting_factor,
    errors::{GridError, GridResult},
    grid::{GridIndex, GridStats, Locator, Match},
    mapper::XiMapper,
    point::{BankPoint, PhysicalParams},
    varying::{FrequencyLayer, FrequencyLocator},
};
use conv::ValueFrom;
use log::{info, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

/// The search structure a verifier answers queries with.
#[derive(Debug)]
pub enum Engine {
    Fixed(GridIndex),
    Varying(FrequencyLayer),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BankLocator {
    Fixed(Locator),
    Varying(FrequencyLocator),
}

/// Outcome of one query point. `matched` is `None` when no template was found
/// near the point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryRecord {
    pub params: PhysicalParams,
    pub matched: Option<Match<BankLocator>>,
}

impl QueryRecord {
    #[must_use]
    pub fn mismatch(&self) -> Option<f64> {
        self.matched.map(|m| m.mismatch)
    }

    #[must_use]
    pub fn fitting_factor(&self) -> Option<f64> {
        self.mismatch().map(fitting_factor)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerificationReport {
    /// One record per accepted query, in query order.
    pub records: Vec<QueryRecord>,
    /// Queries dropped because their coordinates or cutoff could not be searched.
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FittingFactorSummary {
    pub count: usize,
    pub no_candidate: usize,
    pub min_fitting_factor: Option<f64>,
    pub mean_fitting_factor: Option<f64>,
    /// Share of records at or above the threshold; records without a candidate count as uncovered.
    pub fraction_covered: f64,
}

impl FittingFactorSummary {
    #[must_use]
    pub fn from_records(records: &[QueryRecord], threshold: f64) -> Self {
        let fitting_factors = records
            .iter()
            .filter_map(QueryRecord::fitting_factor)
            .collect::<Vec<_>>();
        let count = records.len();
        let covered = fitting_factors.iter().filter(|&&ff| ff >= threshold).count();

        let as_f64 = |n: usize| f64::value_from(n).unwrap_or(f64::MAX);
        let mean_fitting_factor = if fitting_factors.is_empty() {
            None
        } else {
            Some(fitting_factors.iter().sum::<f64>() / as_f64(fitting_factors.len()))
        };
        FittingFactorSummary {
            count,
            no_candidate: count - fitting_factors.len(),
            min_fitting_factor: fitting_factors
                .iter()
                .copied()
                .map(OrderedFloat)
                .min()
                .map(OrderedFloat::into_inner),
            mean_fitting_factor,
            fraction_covered: if count == 0 {
                0.0
            } else {
                as_f64(covered) / as_f64(count)
            },
        }
    }
}

pub struct BankVerifier<M: XiMapper> {
    config: VerifierConfig,
    mapper: M,
    engine: Engine,
    bank_skipped: usize,
}

impl<M: XiMapper> BankVerifier<M> {
    /// Maps every template and builds the engine the configuration asks for.
    /// Templates with degenerate coordinates are skipped.
    pub fn build(config: VerifierConfig, mapper: M, bank: &[PhysicalParams]) -> GridResult<Self> {
        config.validate()?;
        let num_frames = match &config.varying {
            Some(varying) => varying.frequency_map()?.len(),
            None => 1,
        };
        if mapper.num_frames() < num_frames {
            return Err(GridError::configuration(format!(
                "the coordinate mapper provides {} frames but {num_frames} are required",
                mapper.num_frames()
            )));
        }

        let map_point = |params: &PhysicalParams| -> Option<BankPoint> {
            let xis = (0..num_frames)
                .map(|frame| mapper.xi_coordinates(params, frame))
                .collect();
            match BankPoint::with_frames(*params, xis) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!("Skipping template {params:?}: {e}");
                    None
                }
            }
        };
        let points: Vec<BankPoint> = if config.parallel_build {
            bank.par_iter().filter_map(map_point).collect()
        } else {
            bank.iter().filter_map(map_point).collect()
        };
        let bank_skipped = bank.len() - points.len();

        let engine = match &config.varying {
            Some(varying) => {
                let mut layer = FrequencyLayer::new(
                    varying.frequency_map()?,
                    varying.cutoff_formula,
                    config.max_mismatch,
                )?;
                layer
                    .set_neighbor_span(varying.neighbor_span)
                    .set_out_of_range(varying.out_of_range);
                layer.build(points, config.parallel_build)?;
                Engine::Varying(layer)
            }
            None if config.parallel_build => {
                Engine::Fixed(GridIndex::par_build(config.max_mismatch, points)?)
            }
            None => Engine::Fixed(GridIndex::build(config.max_mismatch, points)?),
        };

        info!(
            "Loaded {} of {} templates ({bank_skipped} skipped)",
            bank.len() - bank_skipped,
            bank.len()
        );
        Ok(BankVerifier {
            config,
            mapper,
            engine,
            bank_skipped,
        })
    }

    /// Finds the closest template for every query point, in parallel.
    ///
    /// Queries whose coordinates are degenerate, or whose cutoff is rejected by
    /// the out-of-range policy, are skipped and counted. Any other error aborts.
    pub fn verify(&self, queries: &[PhysicalParams]) -> GridResult<VerificationReport> {
        let results = queries
            .par_iter()
            .map(|params| self.verify_point(params))
            .collect::<GridResult<Vec<_>>>()?;
        let skipped = results.iter().filter(|r| r.is_none()).count();
        let records = results.into_iter().flatten().collect::<Vec<_>>();

        let summary =
            FittingFactorSummary::from_records(&records, self.config.fitting_factor_threshold);
        info!(
            "Verified {} points: {} without a candidate, {:.1}% covered at fitting factor {}",
            summary.count,
            summary.no_candidate,
            summary.fraction_covered * 100.0,
            self.config.fitting_factor_threshold
        );
        Ok(VerificationReport { records, skipped })
    }

    /// `Ok(None)` when the point was skipped.
    pub fn verify_point(&self, params: &PhysicalParams) -> GridResult<Option<QueryRecord>> {
        let matched = match &self.engine {
            Engine::Fixed(index) => {
                let xi = self.mapper.xi_coordinates(params, 0);
                index.query(&xi).map(|m| {
                    m.map(|m| Match {
                        mismatch: m.mismatch,
                        locator: BankLocator::Fixed(m.locator),
                    })
                })
            }
            Engine::Varying(layer) => {
                let xis = (0..layer.map().len())
                    .map(|frame| self.mapper.xi_coordinates(params, frame))
                    .collect::<Vec<_>>();
                layer.query(params, &xis).map(|m| {
                    m.map(|m| Match {
                        mismatch: m.mismatch,
                        locator: BankLocator::Varying(m.locator),
                    })
                })
            }
        };

        match matched {
            Ok(matched) => Ok(Some(QueryRecord {
                params: *params,
                matched,
            })),
            Err(e @ (GridError::DegenerateInput { .. } | GridError::FrequencyOutOfRange { .. })) => {
                warn!("Skipping query point {params:?}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub fn bank_point(&self, locator: BankLocator) -> Option<&BankPoint> {
        match (&self.engine, locator) {
            (Engine::Fixed(index), BankLocator::Fixed(locator)) => index.point(locator),
            (Engine::Varying(layer), BankLocator::Varying(locator)) => layer.point(locator),
            _ => None,
        }
    }

    #[must_use]
    pub fn stats(&self) -> Vec<GridStats> {
        match &self.engine {
            Engine::Fixed(index) => vec![index.stats()],
            Engine::Varying(layer) => layer.stats(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Templates dropped while building because of degenerate coordinates.
    #[must_use]
    pub fn bank_skipped(&self) -> usize {
        self.bank_skipped
    }
}

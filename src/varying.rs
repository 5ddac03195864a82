//! Bank search when the metric depends on a per-template upper-frequency cutoff.
//!
//! Every template is assigned to the discretized cutoff nearest to the one its
//! cutoff formula gives, and is binned in a grid of its own frequency using the
//! xi coordinates of that frequency's frame. A query is assigned the same way
//! and searches its own frequency's grid plus up to `neighbor_span` adjacent
//! grids on either side. Across two frequencies the mismatch is measured in
//! the frame of the lower cutoff and then penalized for the signal power the
//! lower cutoff misses.
use crate::{
    distance::{mismatch, penalized},
    errors::{GridError, GridResult},
    frequency::{CutoffFormula, FrequencyMap, OutOfRangePolicy},
    grid::{CellKey, GridIndex, GridStats, Locator, Match},
    point::{check_finite, BankPoint, PhysicalParams},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Address of a bank point inside a [`FrequencyLayer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrequencyLocator {
    pub frequency_index: usize,
    pub cell: CellKey,
    pub index: usize,
}

#[derive(Debug)]
enum LayerState {
    Unbuilt,
    Built(Vec<GridIndex>),
}

#[derive(Debug)]
pub struct FrequencyLayer {
    map: FrequencyMap,
    formula: CutoffFormula,
    max_mismatch: f64,
    neighbor_span: usize,
    policy: OutOfRangePolicy,
    state: LayerState,
}

impl FrequencyLayer {
    pub fn new(map: FrequencyMap, formula: CutoffFormula, max_mismatch: f64) -> GridResult<Self> {
        // Validates the threshold before anything is built.
        GridIndex::new(max_mismatch)?;
        Ok(FrequencyLayer {
            map,
            formula,
            max_mismatch,
            neighbor_span: 1,
            policy: OutOfRangePolicy::Clamp,
            state: LayerState::Unbuilt,
        })
    }

    /// Number of adjacent frequencies searched on either side of the query's own.
    pub fn set_neighbor_span(&mut self, span: usize) -> &mut Self {
        self.neighbor_span = span;
        self
    }

    pub fn set_out_of_range(&mut self, policy: OutOfRangePolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Index of the discretized cutoff for a template or query.
    pub fn nearest_cutoff(&self, params: &PhysicalParams) -> GridResult<usize> {
        self.map.nearest_cutoff(self.formula, params, self.policy)
    }

    /// Builds one sealed grid per discretized frequency. Every point must carry a
    /// frame per frequency. On error the layer stays unbuilt.
    pub fn build(&mut self, points: Vec<BankPoint>, parallel: bool) -> GridResult<()> {
        if self.is_built() {
            return Err(GridError::build_state(
                "the frequency layer is already built; reset it before rebuilding",
            ));
        }

        // Every cutoff's grid shares one dimension
        let dimension = points.first().map(BankPoint::dimension);
        let mut assigned: Vec<Vec<BankPoint>> = vec![Vec::new(); self.map.len()];
        for point in points {
            self.check_frames(point.num_frames())?;
            if let Some(expected) = dimension.filter(|&d| d != point.dimension()) {
                return Err(GridError::DimensionMismatch {
                    expected,
                    found: point.dimension(),
                });
            }
            let frequency_index = self.nearest_cutoff(&point.params)?;
            assigned[frequency_index].push(point);
        }

        let mut indices = Vec::with_capacity(self.map.len());
        for (frequency_index, points) in assigned.into_iter().enumerate() {
            let mut index = GridIndex::with_frame(self.max_mismatch, frequency_index)?;
            if parallel {
                index.par_extend(points)?;
            } else {
                index.extend(points)?;
            }
            index.seal();
            debug!(
                "Cutoff {:.1} Hz holds {} templates",
                self.map.frequency(frequency_index),
                index.num_points()
            );
            indices.push(index);
        }

        info!(
            "Built frequency layer: {} templates over {} cutoffs",
            indices.iter().map(GridIndex::num_points).sum::<usize>(),
            indices.len()
        );
        self.state = LayerState::Built(indices);
        Ok(())
    }

    /// Discards every grid.
    pub fn reset(&mut self) {
        self.state = LayerState::Unbuilt;
    }

    /// Minimum mismatch between the query and the templates of its own and the
    /// adjacent frequencies. `xis` holds the query's coordinates in every frame.
    pub fn query(
        &self,
        params: &PhysicalParams,
        xis: &[Vec<f64>],
    ) -> GridResult<Option<Match<FrequencyLocator>>> {
        let mut best: Option<Match<FrequencyLocator>> = None;
        self.scan(params, xis, |locator, distance| {
            if best.map_or(true, |b| distance < b.mismatch) {
                best = Some(Match {
                    mismatch: distance,
                    locator,
                });
            }
            true
        })?;
        Ok(best)
    }

    /// Whether any searched template lies within `threshold` of the query.
    pub fn contains_within(
        &self,
        params: &PhysicalParams,
        xis: &[Vec<f64>],
        threshold: f64,
    ) -> GridResult<bool> {
        let mut found = false;
        self.scan(params, xis, |_, distance| {
            found = distance <= threshold;
            !found
        })?;
        Ok(found)
    }

    /// Visits every candidate with its mismatch until `visit` returns false.
    fn scan<F>(&self, params: &PhysicalParams, xis: &[Vec<f64>], mut visit: F) -> GridResult<()>
    where
        F: FnMut(FrequencyLocator, f64) -> bool,
    {
        let indices = self.indices()?;
        self.check_frames(xis.len())?;
        let dimension = xis[0].len();
        for xi in xis {
            if xi.len() != dimension {
                return Err(GridError::DimensionMismatch {
                    expected: dimension,
                    found: xi.len(),
                });
            }
            check_finite(xi)?;
        }
        match indices.iter().find_map(GridIndex::dimension) {
            Some(expected) if expected != dimension => {
                return Err(GridError::DimensionMismatch {
                    expected,
                    found: dimension,
                })
            }
            None if dimension < 2 => {
                return Err(GridError::DimensionMismatch {
                    expected: 2,
                    found: dimension,
                })
            }
            _ => {}
        }
        let own = self.nearest_cutoff(params)?;

        for frequency_index in self.search_order(own) {
            let index = &indices[frequency_index];
            let lower = own.min(frequency_index);
            let upper = own.max(frequency_index);
            for (locator, point) in index.candidates(&xis[frequency_index])? {
                let distance = if lower == upper {
                    mismatch(&xis[own], point.frame_xi(own))
                } else {
                    let distance = mismatch(&xis[lower], point.frame_xi(lower));
                    penalized(distance, self.map.norm(lower), self.map.norm(upper))
                };
                let locator = FrequencyLocator {
                    frequency_index,
                    cell: locator.cell,
                    index: locator.index,
                };
                if !visit(locator, distance) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    // The query's own frequency first, then alternating outwards.
    fn search_order(&self, own: usize) -> Vec<usize> {
        let mut order = vec![own];
        for step in 1..=self.neighbor_span {
            if let Some(below) = own.checked_sub(step) {
                order.push(below);
            }
            if own + step < self.map.len() {
                order.push(own + step);
            }
        }
        order
    }

    #[must_use]
    pub fn point(&self, locator: FrequencyLocator) -> Option<&BankPoint> {
        match &self.state {
            LayerState::Built(indices) => indices.get(locator.frequency_index)?.point(Locator {
                cell: locator.cell,
                index: locator.index,
            }),
            LayerState::Unbuilt => None,
        }
    }

    /// Grid statistics per discretized frequency; empty while unbuilt.
    #[must_use]
    pub fn stats(&self) -> Vec<GridStats> {
        match &self.state {
            LayerState::Built(indices) => indices.iter().map(GridIndex::stats).collect(),
            LayerState::Unbuilt => Vec::new(),
        }
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.stats().iter().map(|s| s.num_points).sum()
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        matches!(self.state, LayerState::Built(_))
    }

    #[must_use]
    pub fn map(&self) -> &FrequencyMap {
        &self.map
    }

    #[must_use]
    pub fn index(&self, frequency_index: usize) -> Option<&GridIndex> {
        match &self.state {
            LayerState::Built(indices) => indices.get(frequency_index),
            LayerState::Unbuilt => None,
        }
    }

    fn indices(&self) -> GridResult<&[GridIndex]> {
        match &self.state {
            LayerState::Built(indices) => Ok(indices),
            LayerState::Unbuilt => Err(GridError::build_state(
                "the frequency layer must be built before it is queried",
            )),
        }
    }

    fn check_frames(&self, found: usize) -> GridResult<()> {
        if found == self.map.len() {
            Ok(())
        } else {
            Err(GridError::configuration(format!(
                "expected xi coordinates for {} cutoffs, found {found}",
                self.map.len()
            )))
        }
    }
}

use crate::{
    distance::mismatch,
    errors::{GridError, GridResult},
    grid::Match,
    point::{check_finite, BankPoint},
};

/// Exhaustive search over every bank point.
///
/// Scales with the bank size, so it only serves as ground truth for the grid.
pub struct LinearBank {
    frame: usize,
    data: Vec<BankPoint>,
}

impl LinearBank {
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame(0)
    }

    #[must_use]
    pub fn with_frame(frame: usize) -> Self {
        Self {
            frame,
            data: Vec::new(),
        }
    }

    pub fn insert(&mut self, point: BankPoint) -> GridResult<usize> {
        if point.num_frames() <= self.frame {
            return Err(GridError::configuration(format!(
                "point has {} frames but the bank compares on frame {}",
                point.num_frames(),
                self.frame
            )));
        }
        if let Some(first) = self.data.first() {
            if first.dimension() != point.dimension() {
                return Err(GridError::DimensionMismatch {
                    expected: first.dimension(),
                    found: point.dimension(),
                });
            }
        }
        self.data.push(point);
        Ok(self.data.len() - 1)
    }

    /// The closest bank point over the whole bank; the locator is its insertion index.
    pub fn query(&self, xi: &[f64]) -> GridResult<Option<Match<usize>>> {
        check_finite(xi)?;
        let mut best: Option<Match<usize>> = None;
        for (i, point) in self.data.iter().enumerate() {
            let candidate = point.frame_xi(self.frame);
            if candidate.len() != xi.len() {
                return Err(GridError::DimensionMismatch {
                    expected: candidate.len(),
                    found: xi.len(),
                });
            }
            let distance = mismatch(xi, candidate);
            if best.map_or(true, |b| distance < b.mismatch) {
                best = Some(Match {
                    mismatch: distance,
                    locator: i,
                });
            }
        }
        Ok(best)
    }

    /// Bank points within `range` mismatch of `xi`.
    pub fn query_range(&self, xi: &[f64], range: f64) -> Vec<usize> {
        let mut result = Vec::new();
        for (i, point) in self.data.iter().enumerate() {
            if mismatch(xi, point.frame_xi(self.frame)) <= range {
                result.push(i);
            }
        }
        result
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Option<&BankPoint> {
        self.data.get(index)
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.data.len()
    }
}

impl Default for LinearBank {
    fn default() -> Self {
        Self::new()
    }
}

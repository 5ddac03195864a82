use crate::{
    distance::{mismatch, within},
    errors::{GridError, GridResult},
    point::{check_finite, BankPoint},
};
use conv::ValueFrom;
use hashbrown::HashMap;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The home cell followed by its 8 neighbours, in visiting order.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 9] = [
    (0, 0),
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

// Cell keys past this magnitude come from coordinates too large to bin meaningfully.
const MAX_CELL_KEY: f64 = 4.0e18;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    #[must_use]
    pub fn new(x: i64, y: i64) -> CellKey {
        CellKey { x, y }
    }

    /// Bins the two leading coordinates of `xi`.
    pub fn of(xi: &[f64], bin_spacing: f64) -> GridResult<CellKey> {
        if xi.len() < 2 {
            return Err(GridError::DimensionMismatch {
                expected: 2,
                found: xi.len(),
            });
        }
        let x = bin_coordinate(xi, 0, bin_spacing)?;
        let y = bin_coordinate(xi, 1, bin_spacing)?;
        Ok(CellKey { x, y })
    }

    fn offset(self, dx: i64, dy: i64) -> Option<CellKey> {
        Some(CellKey {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bin_coordinate(xi: &[f64], coordinate: usize, bin_spacing: f64) -> GridResult<i64> {
    let value = xi[coordinate];
    let scaled = (value / bin_spacing).floor();
    if !scaled.is_finite() || scaled.abs() > MAX_CELL_KEY {
        return Err(GridError::DegenerateInput { coordinate, value });
    }
    Ok(scaled as i64)
}

/// Address of a bank point inside a [`GridIndex`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub cell: CellKey,
    pub index: usize,
}

/// The best candidate found by a query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match<L = Locator> {
    pub mismatch: f64,
    pub locator: L,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    Building,
    Serving,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridStats {
    pub num_points: usize,
    pub num_cells: usize,
    pub max_cell_occupancy: usize,
    pub mean_cell_occupancy: f64,
}

/// Uniform 2D grid over the two leading xi coordinates.
///
/// The cell width is `sqrt(max_mismatch)`, so any bank point within
/// `max_mismatch` of a query in the two binning dimensions lies in the query's
/// cell or one of its 8 neighbours. Queries compare against the full xi vector.
///
/// Points are inserted while the index is `Building`; [`GridIndex::seal`] moves
/// it to `Serving`, after which it is read-only and may be queried from many
/// threads at once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridIndex {
    max_mismatch: f64,
    bin_spacing: f64,
    frame: usize,
    dimension: Option<usize>,
    num_points: usize,
    state: IndexState,
    cells: HashMap<CellKey, Vec<BankPoint>>,
}

impl GridIndex {
    pub fn new(max_mismatch: f64) -> GridResult<Self> {
        Self::with_frame(max_mismatch, 0)
    }

    /// An index that bins and compares bank points by their xi vector in `frame`.
    pub fn with_frame(max_mismatch: f64, frame: usize) -> GridResult<Self> {
        if !max_mismatch.is_finite() || max_mismatch <= 0.0 {
            return Err(GridError::configuration(format!(
                "the mismatch threshold must be positive and finite, got {max_mismatch}"
            )));
        }
        Ok(GridIndex {
            max_mismatch,
            bin_spacing: max_mismatch.sqrt(),
            frame,
            dimension: None,
            num_points: 0,
            state: IndexState::Building,
            cells: HashMap::new(),
        })
    }

    /// Inserts all points and seals the index.
    pub fn build<I>(max_mismatch: f64, points: I) -> GridResult<Self>
    where
        I: IntoIterator<Item = BankPoint>,
    {
        let mut index = Self::new(max_mismatch)?;
        index.extend(points)?;
        index.seal();
        Ok(index)
    }

    /// Parallel [`GridIndex::build`].
    pub fn par_build(max_mismatch: f64, points: Vec<BankPoint>) -> GridResult<Self> {
        let mut index = Self::new(max_mismatch)?;
        index.par_extend(points)?;
        index.seal();
        Ok(index)
    }

    pub fn insert(&mut self, point: BankPoint) -> GridResult<Locator> {
        self.check_building()?;
        let cell = self.cell_of_point(&point)?;
        self.dimension = Some(point.dimension());

        let points = self.cells.entry(cell).or_insert_with(Vec::new);
        let index = points.len();
        points.push(point);
        self.num_points += 1;
        Ok(Locator { cell, index })
    }

    pub fn extend<I>(&mut self, points: I) -> GridResult<()>
    where
        I: IntoIterator<Item = BankPoint>,
    {
        for point in points {
            self.insert(point)?;
        }
        Ok(())
    }

    /// Bins `points` on the rayon pool and merges the per-worker cells by key.
    pub fn par_extend(&mut self, points: Vec<BankPoint>) -> GridResult<()> {
        self.check_building()?;
        let dimension = match (self.dimension, points.first()) {
            (_, None) => return Ok(()),
            (Some(dimension), _) => dimension,
            (None, Some(first)) => first.dimension(),
        };

        let num_new = points.len();
        let this = &*self;
        let cells = points
            .into_par_iter()
            .try_fold(HashMap::new, |mut cells, point| {
                if point.dimension() != dimension {
                    return Err(GridError::DimensionMismatch {
                        expected: dimension,
                        found: point.dimension(),
                    });
                }
                let cell = this.cell_of_point(&point)?;
                cells.entry(cell).or_insert_with(Vec::new).push(point);
                Ok::<_, GridError>(cells)
            })
            .try_reduce(HashMap::new, |mut merged, cells| {
                merge_cells(&mut merged, cells);
                Ok(merged)
            })?;

        merge_cells(&mut self.cells, cells);
        self.dimension = Some(dimension);
        self.num_points += num_new;
        Ok(())
    }

    /// Ends the build phase. Further inserts fail.
    pub fn seal(&mut self) {
        if self.state == IndexState::Building {
            self.state = IndexState::Serving;
            let stats = self.stats();
            info!(
                "Sealed grid index: {} points in {} cells (bin spacing {:.6}, max occupancy {})",
                stats.num_points, stats.num_cells, self.bin_spacing, stats.max_cell_occupancy
            );
        }
    }

    /// Finds the bank point with minimum mismatch among the query's cell and its
    /// 8 neighbours. `None` means the neighbourhood holds no bank point.
    pub fn query(&self, xi: &[f64]) -> GridResult<Option<Match>> {
        let mut best: Option<Match> = None;
        for (locator, point) in self.candidates(xi)? {
            let distance = mismatch(xi, point.frame_xi(self.frame));
            if best.map_or(true, |b| distance < b.mismatch) {
                best = Some(Match {
                    mismatch: distance,
                    locator,
                });
            }
        }
        Ok(best)
    }

    /// Whether any bank point in the query's neighbourhood lies within `threshold`.
    pub fn contains_within(&self, xi: &[f64], threshold: f64) -> GridResult<bool> {
        Ok(self
            .candidates(xi)?
            .any(|(_, point)| within(xi, point.frame_xi(self.frame), threshold)))
    }

    /// All bank points in the query's cell and its 8 neighbours, in visiting order.
    pub fn candidates<'a>(
        &'a self,
        xi: &[f64],
    ) -> GridResult<impl Iterator<Item = (Locator, &'a BankPoint)> + 'a> {
        self.check_serving()?;
        self.check_dimension(xi.len())?;
        check_finite(xi)?;
        let home = CellKey::of(xi, self.bin_spacing)?;

        Ok(NEIGHBOR_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| home.offset(dx, dy))
            .filter_map(move |cell| self.cells.get(&cell).map(|points| (cell, points)))
            .flat_map(|(cell, points)| {
                points
                    .iter()
                    .enumerate()
                    .map(move |(index, point)| (Locator { cell, index }, point))
            }))
    }

    #[must_use]
    pub fn point(&self, locator: Locator) -> Option<&BankPoint> {
        self.cells.get(&locator.cell)?.get(locator.index)
    }

    /// Every bank point, grouped by cell in no particular cell order.
    pub fn points(&self) -> impl Iterator<Item = &BankPoint> {
        self.cells.values().flatten()
    }

    #[must_use]
    pub fn stats(&self) -> GridStats {
        let max_cell_occupancy = self.cells.values().map(Vec::len).max().unwrap_or(0);
        let mean_cell_occupancy = if self.cells.is_empty() {
            0.0
        } else {
            f64::value_from(self.num_points).unwrap_or(f64::MAX)
                / f64::value_from(self.cells.len()).unwrap_or(f64::MAX)
        };
        GridStats {
            num_points: self.num_points,
            num_cells: self.cells.len(),
            max_cell_occupancy,
            mean_cell_occupancy,
        }
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    #[must_use]
    pub fn bin_spacing(&self) -> f64 {
        self.bin_spacing
    }

    #[must_use]
    pub fn max_mismatch(&self) -> f64 {
        self.max_mismatch
    }

    #[must_use]
    pub fn frame(&self) -> usize {
        self.frame
    }

    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn to_bytes(&self) -> GridResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes an index and checks every point still sits in the cell its
    /// coordinates determine.
    pub fn from_bytes(bytes: &[u8]) -> GridResult<Self> {
        let index: GridIndex = bincode::deserialize(bytes)?;
        index.validate()?;
        Ok(index)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> GridResult<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> GridResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn validate(&self) -> GridResult<()> {
        let expected = GridIndex::with_frame(self.max_mismatch, self.frame)?;
        if expected.bin_spacing.to_bits() != self.bin_spacing.to_bits() {
            return Err(GridError::configuration(format!(
                "bin spacing {} does not match the mismatch threshold {}",
                self.bin_spacing, self.max_mismatch
            )));
        }

        let mut num_points = 0;
        for (cell, points) in &self.cells {
            for point in points {
                if self.cell_of_point(point)? != *cell {
                    return Err(GridError::configuration(format!(
                        "a stored point does not belong to cell ({}, {})",
                        cell.x, cell.y
                    )));
                }
            }
            num_points += points.len();
        }
        if num_points != self.num_points {
            return Err(GridError::configuration(format!(
                "index claims {} points but holds {num_points}",
                self.num_points
            )));
        }
        debug!("Decoded grid index with {num_points} points");
        Ok(())
    }

    fn cell_of_point(&self, point: &BankPoint) -> GridResult<CellKey> {
        if point.num_frames() <= self.frame {
            return Err(GridError::configuration(format!(
                "point has {} frames but the index bins on frame {}",
                point.num_frames(),
                self.frame
            )));
        }
        self.check_dimension(point.dimension())?;
        CellKey::of(point.frame_xi(self.frame), self.bin_spacing)
    }

    fn check_dimension(&self, found: usize) -> GridResult<()> {
        match self.dimension {
            Some(expected) if expected != found => {
                Err(GridError::DimensionMismatch { expected, found })
            }
            None if found < 2 => Err(GridError::DimensionMismatch { expected: 2, found }),
            _ => Ok(()),
        }
    }

    fn check_building(&self) -> GridResult<()> {
        match self.state {
            IndexState::Building => Ok(()),
            IndexState::Serving => Err(GridError::build_state(
                "cannot insert into a grid index that is already serving queries",
            )),
        }
    }

    fn check_serving(&self) -> GridResult<()> {
        match self.state {
            IndexState::Serving => Ok(()),
            IndexState::Building => Err(GridError::build_state(
                "the grid index must be sealed before it is queried",
            )),
        }
    }
}

fn merge_cells(into: &mut HashMap<CellKey, Vec<BankPoint>>, from: HashMap<CellKey, Vec<BankPoint>>) {
    for (cell, mut points) in from {
        into.entry(cell).or_insert_with(Vec::new).append(&mut points);
    }
}

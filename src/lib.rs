//! Nearest-template search for template bank verification.
//!
//! Bank points are binned on a uniform grid over their two leading xi
//! coordinates, with a cell width of `sqrt(max_mismatch)`. A query visits its
//! own cell and the 8 around it and reports the template with the smallest
//! mismatch over the full xi vector, or nothing if the neighbourhood is empty.
pub mod config;
mod distance;
pub mod errors;
pub mod frequency;
mod grid;
#[allow(clippy::module_name_repetitions)]
mod linear;
pub mod loaders;
pub mod mapper;
mod point;
pub mod varying;
pub mod verify;

pub use distance::{fitting_factor, mismatch};
pub use errors::{GridError, GridResult};
pub use grid::{CellKey, GridIndex, GridStats, IndexState, Locator, Match, NEIGHBOR_OFFSETS};
pub use linear::LinearBank;
pub use point::{BankPoint, PhysicalParams};

//! Cumulative-loss triangle and age-to-age factors

use std::ops::Deref;
use std::sync::OnceLock;

use log::debug;

use super::base::{LossRecord, Triangle};
use super::grid::Grid;
use super::incremental::IncrTriangle;
use crate::error::ReservingResult;

/// Triangle of losses to date at each development period
#[derive(Debug, Clone)]
pub struct CumTriangle {
    tri: Triangle,
    a2a: OnceLock<Grid<Option<f64>>>,
    a2aind: OnceLock<Grid<u8>>,
}

impl PartialEq for CumTriangle {
    fn eq(&self, other: &Self) -> bool {
        self.tri == other.tri
    }
}

impl CumTriangle {
    pub fn from_records(records: &[LossRecord]) -> ReservingResult<Self> {
        Ok(Self::from_triangle(Triangle::from_records(records)?))
    }

    pub fn from_grid(grid: Grid<Option<f64>>) -> ReservingResult<Self> {
        Ok(Self::from_triangle(Triangle::from_grid(grid)?))
    }

    pub(crate) fn from_triangle(tri: Triangle) -> Self {
        Self {
            tri,
            a2a: OnceLock::new(),
            a2aind: OnceLock::new(),
        }
    }

    /// First difference per origin; the first observed period keeps its cumulative value
    pub fn to_incr(&self) -> IncrTriangle {
        IncrTriangle::from_triangle(self.tri.map_rows(difference))
    }

    pub fn triangle(&self) -> &Triangle {
        &self.tri
    }

    /// Age-to-age factors: `C(o, d+1) / C(o, d)` where both cells are observed
    ///
    /// Rows are every origin except the youngest, columns every development
    /// period except the last, each labeled by the period the ratio starts
    /// from. A zero starting value leaves the cell empty.
    pub fn a2a(&self) -> &Grid<Option<f64>> {
        self.a2a.get_or_init(|| {
            let (nrows, ncols) = self.shape();
            let origins = self.origins()[..nrows.saturating_sub(1)].to_vec();
            let devp = self.devp()[..ncols.saturating_sub(1)].to_vec();
            let grid = self.tri.grid();

            let cells = (0..origins.len())
                .map(|i| {
                    (0..devp.len())
                        .map(|j| match (*grid.at(i, j), *grid.at(i, j + 1)) {
                            (Some(curr), Some(next)) if curr != 0.0 => Some(next / curr),
                            (Some(_), Some(_)) => {
                                debug!(
                                    "a2a undefined for origin {} dev {}: zero cumulative value",
                                    origins[i], devp[j]
                                );
                                None
                            }
                            _ => None,
                        })
                        .collect()
                })
                .collect();

            Grid::from_checked_parts(origins, devp, cells)
        })
    }

    /// 1 where both cells of the pair are observed, 0 elsewhere
    ///
    /// A pair with a zero starting value is still flagged 1 even though its
    /// `a2a` cell is empty; estimators decide whether it can be weighted out.
    pub fn a2aind(&self) -> &Grid<u8> {
        self.a2aind.get_or_init(|| {
            let grid = self.tri.grid();
            let a2a = self.a2a();
            let cells = (0..a2a.origins().len())
                .map(|i| {
                    (0..a2a.devp().len())
                        .map(|j| (grid.at(i, j).is_some() && grid.at(i, j + 1).is_some()) as u8)
                        .collect()
                })
                .collect();
            Grid::from_checked_parts(a2a.origins().to_vec(), a2a.devp().to_vec(), cells)
        })
    }
}

impl Deref for CumTriangle {
    type Target = Triangle;

    fn deref(&self) -> &Triangle {
        &self.tri
    }
}

fn difference(row: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut previous: Option<f64> = None;
    row.iter()
        .map(|cell| {
            cell.map(|v| {
                let incr = v - previous.unwrap_or(0.0);
                previous = Some(v);
                incr
            })
        })
        .collect()
}

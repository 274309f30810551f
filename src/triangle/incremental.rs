//! Incremental-loss triangle

use std::ops::Deref;

use super::base::{LossRecord, Triangle};
use super::cumulative::CumTriangle;
use super::grid::Grid;
use crate::error::ReservingResult;

/// Triangle of losses emerging in each development period
#[derive(Debug, Clone, PartialEq)]
pub struct IncrTriangle(Triangle);

impl IncrTriangle {
    pub fn from_records(records: &[LossRecord]) -> ReservingResult<Self> {
        Ok(Self(Triangle::from_records(records)?))
    }

    pub fn from_grid(grid: Grid<Option<f64>>) -> ReservingResult<Self> {
        Ok(Self(Triangle::from_grid(grid)?))
    }

    pub(crate) fn from_triangle(tri: Triangle) -> Self {
        Self(tri)
    }

    /// Running sum across each origin's observed cells; missing cells stay missing
    pub fn to_cum(&self) -> CumTriangle {
        CumTriangle::from_triangle(self.0.map_rows(accumulate))
    }

    pub fn triangle(&self) -> &Triangle {
        &self.0
    }
}

impl Deref for IncrTriangle {
    type Target = Triangle;

    fn deref(&self) -> &Triangle {
        &self.0
    }
}

fn accumulate(row: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut total = 0.0;
    row.iter()
        .map(|cell| {
            cell.map(|v| {
                total += v;
                total
            })
        })
        .collect()
}

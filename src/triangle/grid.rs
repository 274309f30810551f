//! Labeled ragged grid keyed by origin period (rows) and development period (columns)
//!
//! Labels are kept in strictly ascending order so lookups by label are a binary
//! search. All alignment between two grids of different shapes goes through
//! the labels, never through positions.

use serde::{Deserialize, Serialize};

use crate::error::{ReservingError, ReservingResult};

/// Dense row-major grid with explicit origin and development label tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    origins: Vec<i32>,
    devp: Vec<i32>,
    cells: Vec<Vec<T>>,
}

impl<T> Grid<T> {
    /// Build a grid, checking label order and dimensions
    pub fn new(origins: Vec<i32>, devp: Vec<i32>, cells: Vec<Vec<T>>) -> ReservingResult<Self> {
        if !is_strictly_ascending(&origins) {
            return Err(ReservingError::shape(
                "origin labels must be unique and ascending",
            ));
        }
        if !is_strictly_ascending(&devp) {
            return Err(ReservingError::shape(
                "development labels must be unique and ascending",
            ));
        }
        if cells.len() != origins.len() {
            return Err(ReservingError::shape(format!(
                "{} rows supplied for {} origins",
                cells.len(),
                origins.len()
            )));
        }
        if let Some((i, row)) = cells.iter().enumerate().find(|(_, r)| r.len() != devp.len()) {
            return Err(ReservingError::shape(format!(
                "row for origin {} has {} cells, expected {}",
                origins[i],
                row.len(),
                devp.len()
            )));
        }

        Ok(Self { origins, devp, cells })
    }

    pub fn origins(&self) -> &[i32] {
        &self.origins
    }

    pub fn devp(&self) -> &[i32] {
        &self.devp
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.origins.len(), self.devp.len())
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.cells
    }

    /// Positional access; callers index within `shape()`
    pub(crate) fn at(&self, row: usize, col: usize) -> &T {
        &self.cells[row][col]
    }

    pub fn origin_index(&self, origin: i32) -> Option<usize> {
        self.origins.binary_search(&origin).ok()
    }

    pub fn dev_index(&self, dev: i32) -> Option<usize> {
        self.devp.binary_search(&dev).ok()
    }

    /// Cell at the given labels, if both labels exist
    pub fn get(&self, origin: i32, dev: i32) -> Option<&T> {
        let i = self.origin_index(origin)?;
        let j = self.dev_index(dev)?;
        Some(&self.cells[i][j])
    }

    /// Same labels, transformed cells
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            origins: self.origins.clone(),
            devp: self.devp.clone(),
            cells: self
                .cells
                .iter()
                .map(|row| row.iter().map(&f).collect())
                .collect(),
        }
    }

    /// Assemble from labels and cells already known to be consistent
    pub(crate) fn from_checked_parts(origins: Vec<i32>, devp: Vec<i32>, cells: Vec<Vec<T>>) -> Self {
        debug_assert_eq!(cells.len(), origins.len());
        debug_assert!(cells.iter().all(|r| r.len() == devp.len()));
        Self { origins, devp, cells }
    }
}

impl Grid<Option<f64>> {
    /// Observed value at the given labels
    pub fn value(&self, origin: i32, dev: i32) -> Option<f64> {
        self.get(origin, dev).copied().flatten()
    }

    /// Iterate a column by position
    pub fn column(&self, col: usize) -> impl Iterator<Item = Option<f64>> + '_ {
        self.cells.iter().map(move |row| row[col])
    }

    /// Number of observed (non-missing) cells
    pub fn count_observed(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

fn is_strictly_ascending(labels: &[i32]) -> bool {
    labels.windows(2).all(|w| w[0] < w[1])
}

//! Shared triangle behaviour for incremental and cumulative representations
//!
//! A `Triangle` owns a labeled grid of loss amounts plus lazily-populated
//! derived attributes (latest diagonal, last-valid indices, maturity, the
//! missing-cell indicator). Each attribute is computed on first access and
//! memoized for the lifetime of the instance; there is no in-place mutation,
//! so the caches never need invalidating. `OnceLock` serialises the first
//! computation, so a triangle can be shared across threads for reads.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use log::debug;
use serde::{Deserialize, Serialize};

use super::grid::Grid;
use crate::error::{ReservingError, ReservingResult};

/// One long-format observation: loss `value` for `origin` at development period `dev`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub origin: i32,
    pub dev: i32,
    pub value: f64,
}

impl LossRecord {
    pub fn new(origin: i32, dev: i32, value: f64) -> Self {
        Self { origin, dev, value }
    }
}

/// Row latest valid index: rightmost populated column for an origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLatest {
    pub origin: i32,
    pub dev: i32,
    pub col_offset: usize,
}

/// Column latest valid index: lowest populated origin for a development period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColLatest {
    pub dev: i32,
    pub origin: i32,
    pub row_offset: usize,
}

/// A cell on the latest evaluation diagonal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestCell {
    pub origin: i32,
    pub dev: i32,
    pub value: f64,
}

/// Ragged loss matrix with memoized derived attributes
#[derive(Debug, Clone)]
pub struct Triangle {
    grid: Grid<Option<f64>>,
    rlvi: OnceLock<Vec<RowLatest>>,
    clvi: OnceLock<Vec<ColLatest>>,
    latest: OnceLock<Vec<LatestCell>>,
    latest_by_origin: OnceLock<BTreeMap<i32, f64>>,
    latest_by_devp: OnceLock<BTreeMap<i32, f64>>,
    maturity: OnceLock<BTreeMap<i32, usize>>,
    triind: OnceLock<Grid<u8>>,
}

impl PartialEq for Triangle {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid
    }
}

impl Triangle {
    /// Build from long-format records; (origin, dev) pairs must be unique
    pub fn from_records(records: &[LossRecord]) -> ReservingResult<Self> {
        if records.is_empty() {
            return Err(ReservingError::shape("no records supplied"));
        }

        let origins: Vec<i32> = records
            .iter()
            .map(|r| r.origin)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let devp: Vec<i32> = records
            .iter()
            .map(|r| r.dev)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells = vec![vec![None; devp.len()]; origins.len()];
        for record in records {
            // Label tables were built from these records, so both searches hit.
            let i = origins.binary_search(&record.origin).unwrap_or_else(|i| i);
            let j = devp.binary_search(&record.dev).unwrap_or_else(|j| j);
            if cells[i][j].is_some() {
                return Err(ReservingError::shape(format!(
                    "duplicate record for origin {} dev {}",
                    record.origin, record.dev
                )));
            }
            cells[i][j] = Some(record.value);
        }

        Self::from_grid(Grid::new(origins, devp, cells)?)
    }

    /// Build from an already-pivoted grid (missing cells as `None`)
    pub fn from_grid(grid: Grid<Option<f64>>) -> ReservingResult<Self> {
        let (nrows, ncols) = grid.shape();
        if nrows == 0 || ncols == 0 {
            return Err(ReservingError::shape("triangle has no rows or columns"));
        }
        for (i, row) in grid.rows().iter().enumerate() {
            if row.iter().all(Option::is_none) {
                return Err(ReservingError::shape(format!(
                    "origin {} has no observed values",
                    grid.origins()[i]
                )));
            }
            if let Some(v) = row.iter().flatten().find(|v| !v.is_finite()) {
                return Err(ReservingError::shape(format!(
                    "origin {} holds non-finite value {}",
                    grid.origins()[i],
                    v
                )));
            }
        }
        for j in 0..ncols {
            if grid.column(j).all(|c| c.is_none()) {
                return Err(ReservingError::shape(format!(
                    "development period {} has no observed values",
                    grid.devp()[j]
                )));
            }
        }

        Ok(Self::from_checked_grid(grid))
    }

    /// Wrap a grid that is known to satisfy the triangle invariants
    pub(crate) fn from_checked_grid(grid: Grid<Option<f64>>) -> Self {
        Self {
            grid,
            rlvi: OnceLock::new(),
            clvi: OnceLock::new(),
            latest: OnceLock::new(),
            latest_by_origin: OnceLock::new(),
            latest_by_devp: OnceLock::new(),
            maturity: OnceLock::new(),
            triind: OnceLock::new(),
        }
    }

    pub fn grid(&self) -> &Grid<Option<f64>> {
        &self.grid
    }

    /// Sorted origin periods present
    pub fn origins(&self) -> &[i32] {
        self.grid.origins()
    }

    /// Sorted development periods present
    pub fn devp(&self) -> &[i32] {
        self.grid.devp()
    }

    /// (origins, development periods)
    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    /// Observed value at (origin, dev), by label
    pub fn value(&self, origin: i32, dev: i32) -> Option<f64> {
        self.grid.value(origin, dev)
    }

    /// Number of observed cells
    pub fn nbr_cells(&self) -> usize {
        self.grid.count_observed()
    }

    /// Row latest valid index for every origin
    pub fn rlvi(&self) -> &[RowLatest] {
        self.rlvi.get_or_init(|| {
            debug!("computing rlvi for {} origins", self.origins().len());
            self.grid
                .rows()
                .iter()
                .zip(self.origins())
                .map(|(row, &origin)| {
                    let col_offset = row.iter().rposition(Option::is_some).unwrap_or(0);
                    RowLatest {
                        origin,
                        dev: self.devp()[col_offset],
                        col_offset,
                    }
                })
                .collect()
        })
    }

    /// Column latest valid index for every development period
    pub fn clvi(&self) -> &[ColLatest] {
        self.clvi.get_or_init(|| {
            (0..self.devp().len())
                .map(|j| {
                    let row_offset = self
                        .grid
                        .rows()
                        .iter()
                        .rposition(|row| row[j].is_some())
                        .unwrap_or(0);
                    ColLatest {
                        dev: self.devp()[j],
                        origin: self.origins()[row_offset],
                        row_offset,
                    }
                })
                .collect()
        })
    }

    /// Latest diagonal: the most mature observation of each origin
    pub fn latest(&self) -> &[LatestCell] {
        self.latest.get_or_init(|| {
            self.rlvi()
                .iter()
                .enumerate()
                .map(|(i, r)| LatestCell {
                    origin: r.origin,
                    dev: r.dev,
                    value: self.grid.at(i, r.col_offset).unwrap_or(0.0),
                })
                .collect()
        })
    }

    /// Latest value keyed by origin
    pub fn latest_by_origin(&self) -> &BTreeMap<i32, f64> {
        self.latest_by_origin
            .get_or_init(|| self.latest().iter().map(|c| (c.origin, c.value)).collect())
    }

    /// Latest values summed by the development period they sit at
    pub fn latest_by_devp(&self) -> &BTreeMap<i32, f64> {
        self.latest_by_devp.get_or_init(|| {
            let mut by_devp = BTreeMap::new();
            for cell in self.latest() {
                *by_devp.entry(cell.dev).or_insert(0.0) += cell.value;
            }
            by_devp
        })
    }

    /// Number of development periods elapsed for each origin
    pub fn maturity(&self) -> &BTreeMap<i32, usize> {
        self.maturity.get_or_init(|| {
            self.rlvi()
                .iter()
                .map(|r| (r.origin, r.col_offset + 1))
                .collect()
        })
    }

    /// Missing-cell indicator: 1 where a cell is unobserved, 0 where observed
    pub fn triind(&self) -> &Grid<u8> {
        self.triind
            .get_or_init(|| self.grid.map(|c| if c.is_some() { 0 } else { 1 }))
    }

    /// Flatten observed cells to long format, sorted by origin then dev
    pub fn to_tbl(&self) -> Vec<LossRecord> {
        self.grid
            .rows()
            .iter()
            .zip(self.origins())
            .flat_map(|(row, &origin)| {
                row.iter()
                    .zip(self.devp())
                    .filter_map(move |(cell, &dev)| cell.map(|v| LossRecord::new(origin, dev, v)))
            })
            .collect()
    }

    /// New triangle with each row transformed; row shape and labels are kept
    pub(crate) fn map_rows<F>(&self, f: F) -> Triangle
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let cells = self.grid.rows().iter().map(|row| f(row.as_slice())).collect();
        Triangle::from_checked_grid(Grid::from_checked_parts(
            self.origins().to_vec(),
            self.devp().to_vec(),
            cells,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::datasets;

    pub(crate) fn raa_incremental() -> Triangle {
        Triangle::from_records(&datasets::raa()).unwrap()
    }

    #[test]
    fn test_nbr_cells() {
        assert_eq!(raa_incremental().nbr_cells(), 55);
    }

    #[test]
    fn test_origins_and_devp() {
        let tri = raa_incremental();
        assert_eq!(tri.origins(), (1981..=1990).collect::<Vec<_>>().as_slice());
        assert_eq!(tri.devp(), (1..=10).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_rlvi() {
        let tri = raa_incremental();
        for (k, r) in tri.rlvi().iter().enumerate() {
            assert_eq!(r.origin, 1981 + k as i32);
            assert_eq!(r.dev, 10 - k as i32);
            assert_eq!(r.col_offset, 9 - k);
        }
    }

    #[test]
    fn test_clvi() {
        let tri = raa_incremental();
        for (k, c) in tri.clvi().iter().enumerate() {
            assert_eq!(c.dev, 1 + k as i32);
            assert_eq!(c.origin, 1990 - k as i32);
            assert_eq!(c.row_offset, 9 - k);
        }
    }

    #[test]
    fn test_latest_and_maturity() {
        let tri = raa_incremental();
        let expected = [172.0, 535.0, 603.0, 984.0, 225.0, 2917.0, 1368.0, 6165.0, 2262.0, 2063.0];
        let latest: Vec<f64> = tri.latest_by_origin().values().copied().collect();
        assert_eq!(latest, expected);

        for (k, (&origin, &maturity)) in tri.maturity().iter().enumerate() {
            assert_eq!(origin, 1981 + k as i32);
            assert_eq!(maturity, 10 - k);
        }

        // One diagonal cell per development period in a standard triangle.
        assert_eq!(tri.latest_by_devp().get(&10), Some(&172.0));
        assert_eq!(tri.latest_by_devp().get(&1), Some(&2063.0));
    }

    #[test]
    fn test_triind_masks_observed_cells() {
        let tri = raa_incremental();
        let masked: f64 = tri
            .grid()
            .rows()
            .iter()
            .zip(tri.triind().rows())
            .flat_map(|(vals, flags)| vals.iter().zip(flags))
            .filter_map(|(v, &f)| v.map(|v| v * f as f64))
            .sum();
        assert_eq!(masked, 0.0);
        assert_eq!(tri.triind().rows().iter().flatten().filter(|&&f| f == 1).count(), 45);
    }

    #[test]
    fn test_cached_attributes_are_memoized() {
        let tri = raa_incremental();
        assert!(std::ptr::eq(tri.latest(), tri.latest()));
        assert!(std::ptr::eq(tri.rlvi(), tri.rlvi()));
        assert!(std::ptr::eq(tri.triind(), tri.triind()));
    }

    #[test]
    fn test_to_tbl_sorted_observed_only() {
        let tbl = raa_incremental().to_tbl();
        assert_eq!(tbl.len(), 55);
        assert!(tbl
            .windows(2)
            .all(|w| (w[0].origin, w[0].dev) < (w[1].origin, w[1].dev)));
        assert_eq!(tbl[0], LossRecord::new(1981, 1, 5012.0));
    }

    #[test]
    fn test_duplicate_records_rejected() {
        let records = vec![LossRecord::new(2001, 1, 10.0), LossRecord::new(2001, 1, 5.0)];
        let err = Triangle::from_records(&records).unwrap_err();
        assert!(matches!(err, ReservingError::InvalidTriangleShape { .. }));
    }

    #[test]
    fn test_non_contiguous_devp() {
        let records = vec![
            LossRecord::new(2001, 12, 100.0),
            LossRecord::new(2001, 36, 150.0),
            LossRecord::new(2002, 12, 110.0),
        ];
        let tri = Triangle::from_records(&records).unwrap();
        assert_eq!(tri.devp(), &[12, 36]);
        assert_eq!(tri.maturity()[&2001], 2);
        assert_eq!(tri.rlvi()[0].dev, 36);
    }

    #[test]
    fn test_zero_is_not_missing() {
        let records = vec![
            LossRecord::new(2001, 1, 0.0),
            LossRecord::new(2001, 2, 0.0),
            LossRecord::new(2002, 1, 5.0),
        ];
        let tri = Triangle::from_records(&records).unwrap();
        assert_eq!(tri.value(2001, 2), Some(0.0));
        assert_eq!(tri.value(2002, 2), None);
        assert_eq!(tri.nbr_cells(), 3);
    }

    #[test]
    fn test_rejects_non_finite() {
        let records = vec![LossRecord::new(2001, 1, f64::NAN)];
        assert!(Triangle::from_records(&records).is_err());
    }
}

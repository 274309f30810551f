//! Deterministic chain ladder: LDF selection and ultimate projection

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::summary::{ChainLadderSummary, SummaryRow};
use crate::error::{ReservingError, ReservingResult};
use crate::triangle::CumTriangle;

/// How observed age-to-age factors are averaged into one LDF per column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LdfAverage {
    /// Volume-weighted: sum(C_k * F_k) / sum(C_k)
    Weighted,
    /// Arithmetic mean of link ratios
    Simple,
    /// Geometric mean of link ratios
    Geometric,
}

/// Configuration for a deterministic chain ladder run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainLadderConfig {
    /// Averaging method for age-to-age factors
    pub average: LdfAverage,

    /// Use only the latest `n` origins in each column (None = all periods)
    pub periods: Option<usize>,

    /// Development beyond the last observed column
    pub tail: f64,
}

impl Default for ChainLadderConfig {
    fn default() -> Self {
        Self {
            average: LdfAverage::Weighted,
            periods: None,
            tail: 1.0,
        }
    }
}

impl ChainLadderConfig {
    pub fn with_average(mut self, average: LdfAverage) -> Self {
        self.average = average;
        self
    }

    pub fn latest(mut self, periods: usize) -> Self {
        self.periods = Some(periods);
        self
    }

    pub fn with_tail(mut self, tail: f64) -> Self {
        self.tail = tail;
        self
    }

    fn validate(&self) -> ReservingResult<()> {
        validate_tail(self.tail)?;
        if self.periods == Some(0) {
            return Err(ReservingError::InvalidParameter {
                name: "periods".to_string(),
                reason: "must average over at least one origin".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_tail(tail: f64) -> ReservingResult<()> {
    if tail.is_finite() && tail > 0.0 {
        Ok(())
    } else {
        Err(ReservingError::InvalidParameter {
            name: "tail".to_string(),
            reason: format!("tail factor must be positive and finite, got {tail}"),
        })
    }
}

/// Both chain ladder variants need at least one age-to-age pair per column
pub(crate) fn check_dimensions(tri: &CumTriangle) -> ReservingResult<()> {
    let (norigins, ndevp) = tri.shape();
    if norigins < 2 {
        return Err(ReservingError::insufficient(format!(
            "age-to-age factors need at least 2 origins, got {norigins}"
        )));
    }
    if ndevp < 2 {
        return Err(ReservingError::insufficient(format!(
            "chain ladder needs at least 2 development periods, got {ndevp}"
        )));
    }
    Ok(())
}

/// Chain ladder projection over a borrowed cumulative triangle
#[derive(Debug, Clone)]
pub struct BaseChainLadder<'a> {
    tri: &'a CumTriangle,
    ldfs: Vec<f64>,
    tail: f64,
    cldfs: OnceLock<Vec<f64>>,
    ultimates: OnceLock<BTreeMap<i32, f64>>,
    reserves: OnceLock<BTreeMap<i32, f64>>,
}

impl<'a> BaseChainLadder<'a> {
    /// Select LDFs per `config`; fails on a zero-weight column
    pub fn new(tri: &'a CumTriangle, config: ChainLadderConfig) -> ReservingResult<Self> {
        config.validate()?;
        check_dimensions(tri)?;
        let ldfs = select_ldfs(tri, &config)?;
        debug!("selected {:?} ldfs: {:?}", config.average, ldfs);
        Ok(Self::with_factors(tri, ldfs, config.tail))
    }

    /// Projection with externally selected factors (one per column transition)
    pub(crate) fn with_factors(tri: &'a CumTriangle, ldfs: Vec<f64>, tail: f64) -> Self {
        Self {
            tri,
            ldfs,
            tail,
            cldfs: OnceLock::new(),
            ultimates: OnceLock::new(),
            reserves: OnceLock::new(),
        }
    }

    pub fn triangle(&self) -> &'a CumTriangle {
        self.tri
    }

    /// Selected LDFs, labeled by the development period each transition starts from
    pub fn ldfs(&self) -> &[f64] {
        &self.ldfs
    }

    pub fn tail(&self) -> f64 {
        self.tail
    }

    /// Cumulative LDFs aligned with `devp`; the last column carries the tail only
    pub fn cldfs(&self) -> &[f64] {
        self.cldfs.get_or_init(|| {
            let ncols = self.tri.devp().len();
            let mut cldfs = vec![self.tail; ncols];
            for k in (0..ncols - 1).rev() {
                cldfs[k] = cldfs[k + 1] * self.ldfs[k];
            }
            cldfs
        })
    }

    /// Cumulative LDF applying to an origin's latest value
    pub fn cldf_for(&self, origin: i32) -> Option<f64> {
        self.tri
            .rlvi()
            .iter()
            .find(|r| r.origin == origin)
            .map(|r| self.cldfs()[r.col_offset])
    }

    /// Projected ultimate loss per origin
    pub fn ultimates(&self) -> &BTreeMap<i32, f64> {
        self.ultimates.get_or_init(|| {
            let cldfs = self.cldfs();
            self.tri
                .rlvi()
                .iter()
                .zip(self.tri.latest())
                .map(|(r, cell)| (r.origin, cell.value * cldfs[r.col_offset]))
                .collect()
        })
    }

    /// Ultimate minus latest observed, per origin
    pub fn reserves(&self) -> &BTreeMap<i32, f64> {
        self.reserves.get_or_init(|| {
            let latest = self.tri.latest_by_origin();
            self.ultimates()
                .iter()
                .map(|(&origin, &ult)| {
                    let reserve = ult - latest[&origin];
                    if reserve < 0.0 {
                        warn!("negative reserve {reserve:.2} for origin {origin}");
                    }
                    (origin, reserve)
                })
                .collect()
        })
    }

    pub fn total_reserve(&self) -> f64 {
        self.reserves().values().sum()
    }

    /// Per-origin maturity, latest, cldf, emergence, ultimate and reserve, plus a total row
    pub fn summary(&self) -> ChainLadderSummary {
        let maturity = self.tri.maturity();
        let latest = self.tri.latest_by_origin();
        let ultimates = self.ultimates();
        let reserves = self.reserves();
        let cldfs = self.cldfs();

        let rows = self
            .tri
            .rlvi()
            .iter()
            .map(|r| {
                let cldf = cldfs[r.col_offset];
                SummaryRow {
                    origin: Some(r.origin),
                    maturity: Some(maturity[&r.origin]),
                    latest: latest[&r.origin],
                    cldf: Some(cldf),
                    emergence: Some(1.0 / cldf),
                    ultimate: ultimates[&r.origin],
                    reserve: reserves[&r.origin],
                }
            })
            .collect();

        ChainLadderSummary::from_rows(rows)
    }
}

/// Average the observed age-to-age factors of each column per `config`
///
/// A pair with a zero starting value has no link ratio. The volume-weighted
/// average gives it zero weight; every other average is undefined.
fn select_ldfs(tri: &CumTriangle, config: &ChainLadderConfig) -> ReservingResult<Vec<f64>> {
    let a2a = tri.a2a();
    let a2aind = tri.a2aind();
    let grid = tri.grid();

    a2a.devp()
        .iter()
        .enumerate()
        .map(|(j, &dev)| {
            // (C_k, F_k) for every observed pair, oldest first
            let mut pairs: Vec<(f64, Option<f64>)> = (0..a2a.origins().len())
                .filter(|&i| *a2aind.at(i, j) == 1)
                .map(|i| (grid.at(i, j).unwrap_or(0.0), *a2a.at(i, j)))
                .collect();
            if let Some(n) = config.periods {
                let skip = pairs.len().saturating_sub(n);
                pairs.drain(..skip);
            }
            let undefined = |reason: &str| ReservingError::UndefinedFactor {
                dev,
                reason: reason.to_string(),
            };
            if pairs.is_empty() {
                return Err(undefined("no observed age-to-age factors"));
            }

            let ldf = match config.average {
                LdfAverage::Weighted => {
                    let weight: f64 = pairs.iter().map(|(c, _)| c).sum();
                    if weight == 0.0 {
                        return Err(undefined("zero total cumulative weight"));
                    }
                    pairs
                        .iter()
                        .filter_map(|&(c, f)| f.map(|f| c * f))
                        .sum::<f64>()
                        / weight
                }
                LdfAverage::Simple | LdfAverage::Geometric => {
                    let ratios = pairs
                        .iter()
                        .map(|&(_, f)| f)
                        .collect::<Option<Vec<f64>>>()
                        .ok_or_else(|| undefined("zero starting value in an unweighted average"))?;
                    let n = ratios.len() as f64;
                    if config.average == LdfAverage::Simple {
                        ratios.iter().sum::<f64>() / n
                    } else {
                        if ratios.iter().any(|&f| f <= 0.0) {
                            return Err(undefined("non-positive link ratio in geometric average"));
                        }
                        (ratios.iter().map(|f| f.ln()).sum::<f64>() / n).exp()
                    }
                }
            };

            if ldf.is_finite() {
                Ok(ldf)
            } else {
                Err(undefined("non-finite factor"))
            }
        })
        .collect()
}

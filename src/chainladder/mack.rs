//! Mack (1993) chain ladder: reserve prediction error and confidence bounds
//!
//! Factor selection and variance estimation share one weighting exponent
//! `alpha`. Every estimate is weighted by the cumulative triangle with its
//! latest diagonal removed (`mod_tri`), so the most recent evaluation never
//! enters its own factor.
//!
//! Quantities are cached on first access in dependency order:
//! LDFs -> `devp_variance` -> process / parameter error -> msep -> bounds.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::OnceLock;

use log::debug;
use serde::{Deserialize, Serialize};

use super::base::{check_dimensions, validate_tail, BaseChainLadder};
use super::summary::{MackSummary, MackSummaryRow, SummaryRow};
use crate::error::{ReservingError, ReservingResult};
use crate::triangle::{CumTriangle, Grid};

/// Weighting exponent applied to cumulative losses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alpha {
    /// alpha = 0: simple average of link ratios
    Simple,
    /// alpha = 1: volume-weighted average
    Volume,
    /// alpha = 2: zero-intercept least squares
    Regression,
}

impl Alpha {
    pub fn exponent(self) -> i32 {
        match self {
            Alpha::Simple => 0,
            Alpha::Volume => 1,
            Alpha::Regression => 2,
        }
    }
}

impl TryFrom<u8> for Alpha {
    type Error = ReservingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Alpha::Simple),
            1 => Ok(Alpha::Volume),
            2 => Ok(Alpha::Regression),
            other => Err(ReservingError::InvalidParameter {
                name: "alpha".to_string(),
                reason: format!("must be 0, 1 or 2, got {other}"),
            }),
        }
    }
}

/// Configuration for a Mack chain ladder run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MackConfig {
    pub alpha: Alpha,

    /// Development beyond the last observed column; scales ultimates only
    pub tail: f64,

    /// Standard normal quantile for confidence bounds
    pub z: f64,
}

impl Default for MackConfig {
    fn default() -> Self {
        Self {
            alpha: Alpha::Volume,
            tail: 1.0,
            z: 1.96,
        }
    }
}

impl MackConfig {
    pub fn with_alpha(mut self, alpha: Alpha) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_tail(mut self, tail: f64) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    fn validate(&self) -> ReservingResult<()> {
        validate_tail(self.tail)?;
        if !(self.z.is_finite() && self.z > 0.0) {
            return Err(ReservingError::InvalidParameter {
                name: "z".to_string(),
                reason: format!("confidence multiplier must be positive and finite, got {}", self.z),
            });
        }
        Ok(())
    }
}

/// Normal and log-normal reserve bounds for one origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBounds {
    pub origin: i32,
    pub reserve: f64,
    pub rmsep: f64,
    pub cv: Option<f64>,
    pub norm_lb: f64,
    pub norm_ub: f64,
    pub lnorm_lb: f64,
    pub lnorm_ub: f64,
}

/// Chain ladder with Mack's process and parameter error estimates
#[derive(Debug, Clone)]
pub struct MackChainLadder<'a> {
    base: BaseChainLadder<'a>,
    config: MackConfig,
    mod_tri: Grid<Option<f64>>,
    mod_a2aind: Grid<Option<f64>>,
    inverse_sums: Vec<f64>,
    devp_variance: OnceLock<Vec<f64>>,
    trisqrd: OnceLock<Grid<Option<f64>>>,
    process_error: OnceLock<BTreeMap<i32, f64>>,
    parameter_error: OnceLock<BTreeMap<i32, f64>>,
    msepi: OnceLock<BTreeMap<i32, f64>>,
    rmsepi: OnceLock<BTreeMap<i32, f64>>,
}

impl<'a> MackChainLadder<'a> {
    /// Select factors and check every precondition of the variance estimate
    pub fn new(tri: &'a CumTriangle, config: MackConfig) -> ReservingResult<Self> {
        config.validate()?;
        check_dimensions(tri)?;
        let ndevp = tri.devp().len();
        if ndevp < 4 {
            return Err(ReservingError::insufficient(format!(
                "variance extrapolation needs at least 4 development periods, got {ndevp}"
            )));
        }

        let mod_tri = drop_latest(tri);
        let mod_a2aind = tri.a2aind().map(|&ind| (ind == 1).then_some(1.0));

        let observations = link_observations(tri, &mod_tri, &mod_a2aind);
        let alpha = config.alpha.exponent();
        let ldfs = observations
            .iter()
            .zip(tri.a2a().devp())
            .map(|(obs, &dev)| weighted_ldf(obs, alpha, dev))
            .collect::<ReservingResult<Vec<_>>>()?;

        // Every estimated variance term needs a residual degree of freedom.
        if let Some((k, obs)) = observations[..ndevp - 2]
            .iter()
            .enumerate()
            .find(|(_, obs)| obs.len() < 2)
        {
            return Err(ReservingError::insufficient(format!(
                "variance at dev {} needs at least 2 link ratios, got {}",
                tri.devp()[k],
                obs.len()
            )));
        }

        let inverse_sums = tri.a2a()
            .devp()
            .iter()
            .map(|&dev| {
                let total: f64 = mod_tri
                    .dev_index(dev)
                    .map(|j| mod_tri.column(j).flatten().sum())
                    .unwrap_or(0.0);
                if total > 0.0 {
                    Ok(1.0 / total)
                } else {
                    Err(ReservingError::UndefinedFactor {
                        dev,
                        reason: "non-positive cumulative total excluding the latest diagonal"
                            .to_string(),
                    })
                }
            })
            .collect::<ReservingResult<Vec<_>>>()?;

        debug!("mack ldfs (alpha = {alpha}): {ldfs:?}");
        Ok(Self {
            base: BaseChainLadder::with_factors(tri, ldfs, config.tail),
            config,
            mod_tri,
            mod_a2aind,
            inverse_sums,
            devp_variance: OnceLock::new(),
            trisqrd: OnceLock::new(),
            process_error: OnceLock::new(),
            parameter_error: OnceLock::new(),
            msepi: OnceLock::new(),
            rmsepi: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &MackConfig {
        &self.config
    }

    pub fn chainladder(&self) -> &BaseChainLadder<'a> {
        &self.base
    }

    /// Cumulative triangle without the latest diagonal; empty rows and columns dropped
    pub fn mod_tri(&self) -> &Grid<Option<f64>> {
        &self.mod_tri
    }

    /// `a2aind` with unusable cells as `None` instead of 0
    pub fn mod_a2aind(&self) -> &Grid<Option<f64>> {
        &self.mod_a2aind
    }

    /// 1 / sum of cumulative values excluding the latest diagonal, per transition
    pub fn inverse_sums(&self) -> &[f64] {
        &self.inverse_sums
    }

    /// sigma^2 per transition; the last one is extrapolated
    pub fn devp_variance(&self) -> &[f64] {
        self.devp_variance.get_or_init(|| {
            let tri = self.base.triangle();
            let observations = link_observations(tri, &self.mod_tri, &self.mod_a2aind);
            let alpha = self.config.alpha.exponent();
            let nvar = observations.len();

            let mut sigma2: Vec<f64> = observations[..nvar - 1]
                .iter()
                .zip(self.ldfs())
                .map(|(obs, &ldf)| {
                    // A zero starting value only survives selection when its weight is zero.
                    let sse: f64 = obs
                        .iter()
                        .filter_map(|&(c, f)| f.map(|f| c.powi(alpha) * (f - ldf).powi(2)))
                        .sum();
                    sse / (obs.len() - 1) as f64
                })
                .collect();

            let last = sigma2[nvar - 2];
            let prior = sigma2[nvar - 3];
            let extrapolated = if prior == 0.0 {
                0.0
            } else {
                (last * last / prior).min(last.min(prior))
            };
            sigma2.push(extrapolated);
            debug!("devp variance: {sigma2:?}");
            sigma2
        })
    }

    /// Square triangle: observed cells kept, future cells developed with the LDFs
    pub fn trisqrd(&self) -> &Grid<Option<f64>> {
        self.trisqrd.get_or_init(|| {
            let tri = self.base.triangle();
            let ldfs = self.ldfs();
            let cells = tri
                .grid()
                .rows()
                .iter()
                .zip(tri.rlvi())
                .map(|(row, r)| {
                    let mut filled = row.clone();
                    for k in r.col_offset..ldfs.len() {
                        filled[k + 1] = filled[k].map(|c| c * ldfs[k]);
                    }
                    filled
                })
                .collect();
            Grid::from_checked_parts(tri.origins().to_vec(), tri.devp().to_vec(), cells)
        })
    }

    /// Process variance of each origin's ultimate
    pub fn process_error(&self) -> &BTreeMap<i32, f64> {
        self.process_error.get_or_init(|| {
            let sqrd = self.trisqrd();
            let sigma2 = self.devp_variance();
            let ldfs = self.ldfs();
            self.per_origin(|i, offset| {
                (offset..ldfs.len())
                    .filter_map(|k| {
                        let c = sqrd.at(i, k).filter(|&c| c != 0.0)?;
                        Some(sigma2[k] / (ldfs[k] * ldfs[k]) / c)
                    })
                    .sum()
            })
        })
    }

    /// Estimation variance from the selected LDFs, per origin
    pub fn parameter_error(&self) -> &BTreeMap<i32, f64> {
        self.parameter_error.get_or_init(|| {
            let ratios = self.ratios();
            self.per_origin(|_, offset| {
                (offset..ratios.len())
                    .map(|k| ratios[k] * self.inverse_sums[k])
                    .sum()
            })
        })
    }

    /// Mean squared error of prediction per origin
    pub fn msepi(&self) -> &BTreeMap<i32, f64> {
        self.msepi.get_or_init(|| {
            let parameter = self.parameter_error();
            self.process_error()
                .iter()
                .map(|(&origin, &process)| (origin, process + parameter[&origin]))
                .collect()
        })
    }

    pub fn rmsepi(&self) -> &BTreeMap<i32, f64> {
        self.rmsepi.get_or_init(|| {
            self.msepi()
                .iter()
                .map(|(&origin, &msep)| (origin, msep.sqrt()))
                .collect()
        })
    }

    /// MSEP of the total reserve, including the covariance between origins
    pub fn total_msep(&self) -> f64 {
        let tri = self.base.triangle();
        let ultimates = self.ultimates();
        let ratios = self.ratios();
        let ults: Vec<f64> = tri.origins().iter().map(|o| ultimates[o]).collect();

        let covariance: f64 = tri
            .rlvi()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let younger: f64 = ults[i + 1..].iter().sum();
                let weight: f64 = (r.col_offset..ratios.len())
                    .map(|k| 2.0 * ratios[k] * self.inverse_sums[k])
                    .sum();
                ults[i] * younger * weight
            })
            .sum();

        self.msepi().values().sum::<f64>() + covariance
    }

    pub fn total_rmsep(&self) -> f64 {
        self.total_msep().sqrt()
    }

    /// Normal and log-normal bounds around one origin's reserve
    ///
    /// Fully developed origins (zero reserve and zero error) get zero-width
    /// bounds and no CV instead of a `DomainComputation` error. Any other
    /// non-positive reserve has no log-normal fit and returns that error.
    pub fn confidence_bounds(&self, origin: i32) -> ReservingResult<ConfidenceBounds> {
        let reserve = *self
            .reserves()
            .get(&origin)
            .ok_or_else(|| ReservingError::selection("origin", origin))?;
        let msep = self.msepi()[&origin];
        let rmsep = msep.sqrt();
        let z = self.config.z;

        if reserve == 0.0 && msep == 0.0 {
            return Ok(ConfidenceBounds {
                origin,
                reserve,
                rmsep,
                cv: None,
                norm_lb: 0.0,
                norm_ub: 0.0,
                lnorm_lb: 0.0,
                lnorm_ub: 0.0,
            });
        }

        let domain = |reason: String| ReservingError::DomainComputation { origin, reason };
        if reserve <= 0.0 {
            return Err(domain(format!(
                "log-normal bounds need a positive reserve, got {reserve}"
            )));
        }
        let sigma2 = (1.0 + msep / (reserve * reserve)).ln();
        let location = reserve - 0.5 * sigma2;
        if location <= 0.0 {
            return Err(domain(format!(
                "log-normal location argument {location} is not positive"
            )));
        }
        let mu = location.ln();
        let sigma = sigma2.sqrt();

        Ok(ConfidenceBounds {
            origin,
            reserve,
            rmsep,
            cv: Some(rmsep / reserve),
            norm_lb: reserve - z * rmsep,
            norm_ub: reserve + z * rmsep,
            lnorm_lb: (mu - z * sigma).exp(),
            lnorm_ub: (mu + z * sigma).exp(),
        })
    }

    /// Chain ladder summary with rmsep, cv and bounds per origin
    pub fn summary(&self) -> ReservingResult<MackSummary> {
        let base = self.base.summary();
        let rows = base
            .rows
            .into_iter()
            .map(|row: SummaryRow| -> ReservingResult<MackSummaryRow> {
                let origin = row.origin.unwrap_or_default();
                let bounds = self.confidence_bounds(origin)?;
                Ok(MackSummaryRow {
                    base: row,
                    rmsep: bounds.rmsep,
                    cv: bounds.cv,
                    norm_lb: bounds.norm_lb,
                    norm_ub: bounds.norm_ub,
                    lnorm_lb: bounds.lnorm_lb,
                    lnorm_ub: bounds.lnorm_ub,
                })
            })
            .collect::<ReservingResult<Vec<_>>>()?;

        Ok(MackSummary::from_rows(rows, self.total_rmsep()))
    }

    /// sigma^2_k / ldf_k^2
    fn ratios(&self) -> Vec<f64> {
        self.devp_variance()
            .iter()
            .zip(self.ldfs())
            .map(|(s2, ldf)| s2 / (ldf * ldf))
            .collect()
    }

    /// ultimate^2 times `terms(row, latest column offset)` for each origin
    fn per_origin<F>(&self, terms: F) -> BTreeMap<i32, f64>
    where
        F: Fn(usize, usize) -> f64,
    {
        let ultimates = self.ultimates();
        self.base
            .triangle()
            .rlvi()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let ult = ultimates[&r.origin];
                (r.origin, ult * ult * terms(i, r.col_offset))
            })
            .collect()
    }
}

impl<'a> Deref for MackChainLadder<'a> {
    type Target = BaseChainLadder<'a>;

    fn deref(&self) -> &BaseChainLadder<'a> {
        &self.base
    }
}

/// Null each origin's latest cell, then drop rows and columns left empty
fn drop_latest(tri: &CumTriangle) -> Grid<Option<f64>> {
    let mut cells: Vec<Vec<Option<f64>>> = tri.grid().rows().to_vec();
    for (row, r) in cells.iter_mut().zip(tri.rlvi()) {
        row[r.col_offset] = None;
    }

    let keep_cols: Vec<usize> = (0..tri.devp().len())
        .filter(|&j| cells.iter().any(|row| row[j].is_some()))
        .collect();
    let (origins, cells): (Vec<i32>, Vec<Vec<Option<f64>>>) = tri
        .origins()
        .iter()
        .zip(cells)
        .filter(|(_, row)| row.iter().any(Option::is_some))
        .map(|(&origin, row)| (origin, keep_cols.iter().map(|&j| row[j]).collect()))
        .unzip();
    let devp = keep_cols.iter().map(|&j| tri.devp()[j]).collect();

    Grid::from_checked_parts(origins, devp, cells)
}

/// `(C, F)` pairs per a2a column for every observed pair
///
/// `F` is `None` where the starting value `C` is zero.
fn link_observations(
    tri: &CumTriangle,
    mod_tri: &Grid<Option<f64>>,
    mod_a2aind: &Grid<Option<f64>>,
) -> Vec<Vec<(f64, Option<f64>)>> {
    let a2a = tri.a2a();
    a2a.devp()
        .iter()
        .enumerate()
        .map(|(j, &dev)| {
            a2a.origins()
                .iter()
                .enumerate()
                .filter_map(|(i, &origin)| {
                    let w = (*mod_a2aind.at(i, j))?;
                    let c = mod_tri.value(origin, dev)?;
                    Some((w * c, *a2a.at(i, j)))
                })
                .collect()
        })
        .collect()
}

/// sum(C^alpha * F) / sum(C^alpha)
///
/// A zero starting value is weighted out for alpha >= 1 and undefined for alpha = 0.
fn weighted_ldf(obs: &[(f64, Option<f64>)], alpha: i32, dev: i32) -> ReservingResult<f64> {
    let undefined = |reason: &str| ReservingError::UndefinedFactor {
        dev,
        reason: reason.to_string(),
    };
    if alpha == 0 && obs.iter().any(|(_, f)| f.is_none()) {
        return Err(undefined("zero starting value in an unweighted average"));
    }
    let weight: f64 = obs.iter().map(|(c, _)| c.powi(alpha)).sum();
    if obs.is_empty() || weight == 0.0 {
        return Err(undefined("zero total weight"));
    }
    let ldf = obs
        .iter()
        .filter_map(|&(c, f)| f.map(|f| c.powi(alpha) * f))
        .sum::<f64>()
        / weight;
    if ldf.is_finite() {
        Ok(ldf)
    } else {
        Err(undefined("non-finite factor"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chainladder::{ChainLadderConfig, LdfAverage};
    use crate::triangle::cumulative::tests::{raa_cumulative, zero_start_cumulative};
    use crate::triangle::LossRecord;
    use approx::assert_relative_eq;

    const RAA_SIGMA2: [f64; 9] = [
        27883.479394, 1108.526286, 691.442785, 61.229995, 119.439054, 40.819863, 1.343425,
        7.883204, 1.343425,
    ];
    const RAA_RMSEP: [f64; 10] = [
        0.0, 206.2201, 623.3767, 747.1752, 1469.4571, 2001.8569, 2209.2421, 5357.8693, 6333.1659,
        24566.2879,
    ];

    #[test]
    fn test_volume_weighted_matches_chain_ladder() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let cl = BaseChainLadder::new(&tri, ChainLadderConfig::default()).unwrap();
        for (a, b) in mack.ldfs().iter().zip(cl.ldfs()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_relative_eq!(mack.total_reserve(), 52135.2283, epsilon = 1e-3);
    }

    #[test]
    fn test_alpha_changes_ldfs() {
        let tri = raa_cumulative();
        let simple = MackChainLadder::new(&tri, MackConfig::default().with_alpha(Alpha::Simple)).unwrap();
        assert_relative_eq!(simple.ldfs()[0], 8.206099, epsilon = 1e-5);
        let average = BaseChainLadder::new(
            &tri,
            ChainLadderConfig::default().with_average(LdfAverage::Simple),
        )
        .unwrap();
        assert_relative_eq!(simple.ldfs()[0], average.ldfs()[0], epsilon = 1e-12);

        let regression =
            MackChainLadder::new(&tri, MackConfig::default().with_alpha(Alpha::Regression)).unwrap();
        assert_relative_eq!(regression.ldfs()[0], 2.217241, epsilon = 1e-5);
    }

    #[test]
    fn test_mod_tri_drops_latest_diagonal() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let mod_tri = mack.mod_tri();
        assert_eq!(mod_tri.shape(), (9, 9));
        assert_eq!(mod_tri.value(1981, 9), Some(tri.value(1981, 9).unwrap()));
        assert_eq!(mod_tri.value(1982, 9), None);
        assert_eq!(mod_tri.count_observed(), 45);
        assert_eq!(mack.mod_a2aind().value(1989, 2), None);
        assert_eq!(mack.mod_a2aind().value(1989, 1), Some(1.0));
    }

    #[test]
    fn test_devp_variance() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let sigma2 = mack.devp_variance();
        assert_eq!(sigma2.len(), 9);
        for (got, want) in sigma2.iter().zip(RAA_SIGMA2) {
            assert_relative_eq!(*got, want, epsilon = 1e-4, max_relative = 1e-6);
        }
        assert!(sigma2.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_process_and_parameter_error() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        assert_eq!(mack.process_error()[&1981], 0.0);
        assert_eq!(mack.parameter_error()[&1981], 0.0);
        assert_relative_eq!(mack.process_error()[&1982], 22440.579, max_relative = 1e-6);
        assert_relative_eq!(mack.parameter_error()[&1982], 20086.1339, max_relative = 1e-6);
        assert_relative_eq!(mack.process_error()[&1990], 550564288.6568, max_relative = 1e-6);
        assert_relative_eq!(mack.parameter_error()[&1990], 52938213.0688, max_relative = 1e-6);
    }

    #[test]
    fn test_rmsep_by_origin_and_total() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        for (got, want) in mack.rmsepi().values().zip(RAA_RMSEP) {
            assert_relative_eq!(*got, want, epsilon = 1e-3, max_relative = 1e-6);
        }
        assert_relative_eq!(mack.total_rmsep(), 26909.0112, max_relative = 1e-6);
    }

    #[test]
    fn test_trisqrd_fills_future_cells() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let sqrd = mack.trisqrd();
        assert_eq!(sqrd.count_observed(), 100);
        assert_eq!(sqrd.value(1990, 1), Some(2063.0));
        assert_relative_eq!(sqrd.value(1990, 10).unwrap(), 18402.4425, epsilon = 1e-3);
    }

    #[test]
    fn test_confidence_bounds() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();

        let b = mack.confidence_bounds(1982).unwrap();
        assert_relative_eq!(b.norm_lb, -250.2374, epsilon = 1e-3);
        assert_relative_eq!(b.norm_ub, 558.1452, epsilon = 1e-3);
        assert_relative_eq!(b.lnorm_lb, 21.041263, epsilon = 1e-4);
        assert_relative_eq!(b.lnorm_ub, 1118.938326, epsilon = 1e-3);

        let b = mack.confidence_bounds(1990).unwrap();
        assert_relative_eq!(b.lnorm_lb, 1940.1102, epsilon = 1e-2);
        assert_relative_eq!(b.lnorm_ub, 137599.4336, max_relative = 1e-6);
    }

    #[test]
    fn test_fully_developed_origin_has_zero_width_bounds() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let b = mack.confidence_bounds(1981).unwrap();
        assert_eq!(b.cv, None);
        assert_eq!((b.norm_lb, b.norm_ub, b.lnorm_lb, b.lnorm_ub), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_unknown_origin() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        assert!(matches!(
            mack.confidence_bounds(2020),
            Err(ReservingError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_negative_reserve_is_domain_error() {
        // Losses that shrink with development give a negative reserve.
        let records: Vec<LossRecord> = [
            (2001, [100.0, 90.0, 85.0, 80.0]),
            (2002, [120.0, 110.0, 100.0, 0.0]),
            (2003, [90.0, 85.0, 0.0, 0.0]),
            (2004, [110.0, 0.0, 0.0, 0.0]),
        ]
        .iter()
        .flat_map(|(origin, values)| {
            values
                .iter()
                .enumerate()
                .filter(|(j, _)| (*origin - 2001) as usize + j < 4)
                .map(move |(j, &v)| LossRecord::new(*origin, j as i32 + 1, v))
        })
        .collect();
        let tri = CumTriangle::from_records(&records).unwrap();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        assert!(mack.reserves()[&2004] < 0.0);
        assert!(matches!(
            mack.confidence_bounds(2004),
            Err(ReservingError::DomainComputation { origin: 2004, .. })
        ));
        assert!(mack.summary().is_err());
    }

    #[test]
    fn test_too_few_development_periods() {
        let records: Vec<LossRecord> = [(2001, 1, 10.0), (2001, 2, 12.0), (2001, 3, 13.0), (2002, 1, 11.0), (2002, 2, 14.0), (2003, 1, 9.0)]
            .iter()
            .map(|&(o, d, v)| LossRecord::new(o, d, v))
            .collect();
        let tri = CumTriangle::from_records(&records).unwrap();
        let err = MackChainLadder::new(&tri, MackConfig::default()).unwrap_err();
        assert!(matches!(err, ReservingError::InsufficientData { .. }));
    }

    #[test]
    fn test_zero_start_undefined_for_simple_alpha() {
        let tri = zero_start_cumulative();
        let err = MackChainLadder::new(&tri, MackConfig::default().with_alpha(Alpha::Simple))
            .unwrap_err();
        assert!(matches!(err, ReservingError::UndefinedFactor { dev: 1, .. }));
    }

    #[test]
    fn test_zero_start_keeps_degrees_of_freedom() {
        let tri = zero_start_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let ldf = 480.0 / 330.0;
        assert_relative_eq!(mack.ldfs()[0], ldf, epsilon = 1e-12);
        // Four observed pairs in the first column, the zero start adds no residual.
        let sse: f64 = [(100.0, 1.5), (120.0, 170.0 / 120.0), (110.0, 160.0 / 110.0)]
            .iter()
            .map(|&(c, f): &(f64, f64)| c * (f - ldf).powi(2))
            .sum();
        assert_relative_eq!(mack.devp_variance()[0], sse / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_alpha_from_u8() {
        assert_eq!(Alpha::try_from(2).unwrap(), Alpha::Regression);
        assert!(Alpha::try_from(3).is_err());
    }

    #[test]
    fn test_summary() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        let summary = mack.summary().unwrap();
        assert_eq!(summary.rows.len(), 10);
        assert_eq!(summary.rows[0].cv, None);
        assert_relative_eq!(summary.total.base.reserve, 52135.2283, epsilon = 1e-3);
        assert_relative_eq!(summary.total_rmsep, 26909.0112, max_relative = 1e-6);
        assert_eq!(summary.total.cv, None);
        assert_eq!(summary.total.base.cldf, None);
    }

    #[test]
    fn test_derived_values_are_memoized() {
        let tri = raa_cumulative();
        let mack = MackChainLadder::new(&tri, MackConfig::default()).unwrap();
        assert!(std::ptr::eq(mack.devp_variance(), mack.devp_variance()));
        assert!(std::ptr::eq(mack.msepi(), mack.msepi()));
    }
}

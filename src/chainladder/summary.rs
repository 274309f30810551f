//! Tabular chain ladder output

use serde::{Deserialize, Serialize};

/// One origin's row of a chain ladder summary
///
/// The total row has no origin, maturity, cldf or emergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub origin: Option<i32>,
    pub maturity: Option<usize>,
    pub latest: f64,
    pub cldf: Option<f64>,
    /// Share of ultimate already reported (1 / cldf)
    pub emergence: Option<f64>,
    pub ultimate: f64,
    pub reserve: f64,
}

/// Per-origin chain ladder results with a total row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLadderSummary {
    pub rows: Vec<SummaryRow>,
    pub total: SummaryRow,
}

impl ChainLadderSummary {
    pub(crate) fn from_rows(rows: Vec<SummaryRow>) -> Self {
        let total = SummaryRow {
            origin: None,
            maturity: None,
            latest: rows.iter().map(|r| r.latest).sum(),
            cldf: None,
            emergence: None,
            ultimate: rows.iter().map(|r| r.ultimate).sum(),
            reserve: rows.iter().map(|r| r.reserve).sum(),
        };
        Self { rows, total }
    }
}

/// Chain ladder row extended with Mack prediction error and bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MackSummaryRow {
    #[serde(flatten)]
    pub base: SummaryRow,
    pub rmsep: f64,
    /// rmsep / reserve; undefined for fully developed origins
    pub cv: Option<f64>,
    pub norm_lb: f64,
    pub norm_ub: f64,
    pub lnorm_lb: f64,
    pub lnorm_ub: f64,
}

/// Per-origin Mack results with a total row
///
/// `total.rmsep` is the plain sum of origin errors; `total_rmsep` accounts
/// for the shared parameter estimates across origins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MackSummary {
    pub rows: Vec<MackSummaryRow>,
    pub total: MackSummaryRow,
    pub total_rmsep: f64,
}

impl MackSummary {
    pub(crate) fn from_rows(rows: Vec<MackSummaryRow>, total_rmsep: f64) -> Self {
        let base = ChainLadderSummary::from_rows(rows.iter().map(|r| r.base.clone()).collect());
        let sum = |f: fn(&MackSummaryRow) -> f64| rows.iter().map(f).sum::<f64>();
        let total = MackSummaryRow {
            base: base.total,
            rmsep: sum(|r| r.rmsep),
            cv: None,
            norm_lb: sum(|r| r.norm_lb),
            norm_ub: sum(|r| r.norm_ub),
            lnorm_lb: sum(|r| r.lnorm_lb),
            lnorm_ub: sum(|r| r.lnorm_ub),
        };
        Self {
            rows,
            total,
            total_rmsep,
        }
    }
}

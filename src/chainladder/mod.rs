//! Chain ladder reserving: deterministic projection and Mack prediction error

mod base;
mod mack;
mod summary;

pub use base::{BaseChainLadder, ChainLadderConfig, LdfAverage};
pub use mack::{Alpha, ConfidenceBounds, MackChainLadder, MackConfig};
pub use summary::{ChainLadderSummary, MackSummary, MackSummaryRow, SummaryRow};

//! trikit - loss reserving from claim triangles
//!
//! This library provides:
//! - Incremental and cumulative loss triangles with memoized diagonal statistics
//! - Age-to-age factors and chain ladder LDF selection
//! - Mack chain ladder prediction error and confidence bounds
//! - Builders for tabular and triangle-shaped CSV input
//! - Sample datasets and the CAS Loss Reserving Database filter

pub mod error;
pub mod triangle;
pub mod chainladder;
pub mod datasets;

// Re-export commonly used types
pub use error::{ReservingError, ReservingResult};
pub use triangle::{totri, CumTriangle, IncrTriangle, LossRecord, Triangle, TriangleBuilder};
pub use chainladder::{BaseChainLadder, ChainLadderConfig, MackChainLadder, MackConfig};

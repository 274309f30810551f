//! Loss triangles: labeled ragged matrices of incremental or cumulative losses

mod grid;
mod base;
mod incremental;
pub(crate) mod cumulative;
pub mod builder;

pub use grid::Grid;
pub use base::{Triangle, LossRecord, RowLatest, ColLatest, LatestCell};
pub use incremental::IncrTriangle;
pub use cumulative::CumTriangle;
pub use builder::{totri, TriangleBuilder, TriangleKind, DataFormat, DataShape, TriData, AnyTriangle};

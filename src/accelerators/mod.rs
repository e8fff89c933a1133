//! Spatial acceleration for the merging pass.
pub mod hashgrid;

pub use hashgrid::HashGrid;

//! Cameras. The integrator only needs the pinhole model: ray generation,
//! world-to-raster projection for light tracing, and the solid-angle pdf of
//! its own rays for the MIS bookkeeping.
pub mod perspective;

pub use perspective::PerspectiveCamera;

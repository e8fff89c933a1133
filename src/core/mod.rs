//! Foundation types shared by every other part of the renderer: scalar
//! aliases and constants, geometry, spectra, random numbers, sampling
//! routines, surface interactions, the scene registry and the atomic
//! accumulator image.
pub mod geometry;
pub mod image;
pub mod interaction;
pub mod material;
pub mod parallel;
pub mod rng;
pub mod sampling;
pub mod scene;
pub mod spectrum;
pub mod vcm;

//! # vcm
//!
//! A physically-based offline renderer built around bidirectional path
//! tracing with multiple importance sampling and optional photon density
//! estimation (vertex connection and merging). Camera and light subpaths
//! are traced through batched, double-buffered ray queues; their
//! non-specular vertices are cached and recombined by four deterministic
//! techniques (direct hit, next-event estimation, vertex connection and
//! vertex merging), each weighted by the balance heuristic from a shared
//! set of partial MIS quantities.
//!
//! The per-iteration driver lives in
//! [`integrators::vcm::VcmIntegrator`](integrators/vcm/struct.VcmIntegrator.html);
//! the supported estimator families are selected through
//! [`integrators::Mode`](integrators/enum.Mode.html).
pub mod accelerators;
pub mod cameras;
pub mod core;
pub mod integrators;
pub mod lights;
pub mod materials;
pub mod scheduling;

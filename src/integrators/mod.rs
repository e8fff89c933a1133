//! Integrators and their shared plumbing: the estimator-family selector,
//! the per-iteration settings record, Russian roulette, and the partial MIS
//! machinery.
pub mod mis;
pub mod vcm;
pub mod vertices;

// others
use thiserror::Error;
// vcm
use crate::core::vcm::{luminance, Float, Spectrum};
use crate::materials::{BSDF_ALL, BSDF_REFLECTION, BSDF_SPECULAR, BSDF_TRANSMISSION};

/// Estimator family. All modes share the tracing and caching machinery;
/// they differ in which combination techniques run and how the MIS weights
/// are normalized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Unidirectional path tracing with next-event estimation.
    Pt,
    /// Light tracing only.
    Lt,
    /// Bidirectional path tracing: everything except merging.
    Bpt,
    /// Progressive photon mapping: specular camera walks plus merging.
    Ppm,
    /// Full vertex connection and merging.
    Vcm,
    /// Stochastic progressive photon mapping: path tracing plus merging.
    Sppm,
    /// Two-way path tracing: BSDF hits weighted against light tracing.
    Twpt,
}

impl Mode {
    pub fn trace_camera_paths(self) -> bool {
        self != Mode::Lt
    }
    pub fn trace_light_paths(self) -> bool {
        self != Mode::Pt
    }
    pub fn use_nee(self) -> bool {
        matches!(self, Mode::Pt | Mode::Bpt | Mode::Vcm | Mode::Sppm)
    }
    pub fn use_lt(self) -> bool {
        matches!(self, Mode::Lt | Mode::Bpt | Mode::Vcm | Mode::Twpt)
    }
    pub fn use_connect(self) -> bool {
        matches!(self, Mode::Bpt | Mode::Vcm)
    }
    pub fn use_merge(self) -> bool {
        matches!(self, Mode::Ppm | Mode::Vcm | Mode::Sppm)
    }
    /// Techniques competing with next-event estimation and emissive hits on
    /// the light-subpath side.
    pub fn has_light_side_techniques(self) -> bool {
        self.use_lt() || self.use_connect() || self.use_merge()
    }
    /// Progressive photon mapping only extends camera paths through delta
    /// interactions; everything else samples all lobes.
    pub fn camera_bounce_flags(self) -> u8 {
        if self == Mode::Ppm {
            BSDF_SPECULAR | BSDF_REFLECTION | BSDF_TRANSMISSION
        } else {
            BSDF_ALL
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("image resolution must be non-zero")]
    EmptyImage,
    #[error("camera resolution {cam_w}x{cam_h} does not match settings {width}x{height}")]
    ResolutionMismatch {
        cam_w: i32,
        cam_h: i32,
        width: i32,
        height: i32,
    },
    #[error("max_path_len must be at least 1")]
    NoPathLength,
    #[error("base_radius must be positive")]
    BadRadius,
    #[error("tile_size must be positive")]
    BadTileSize,
    #[error("num_connections and num_knn must be at least 1")]
    BadTechniqueCounts,
}

/// Per-render configuration. `light_path_count` enters the MIS
/// normalization directly and is therefore an explicit input, never
/// inferred from the resolution (tests conventionally use width*height).
#[derive(Debug, Copy, Clone)]
pub struct Settings {
    pub width: i32,
    pub height: i32,
    pub light_path_count: i32,
    pub max_path_len: i32,
    pub tile_size: i32,
    pub num_connections: i32,
    pub num_knn: usize,
    pub base_radius: Float,
    pub mode: Mode,
    /// Worker threads; 0 means one per logical core.
    pub num_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            width: 512,
            height: 512,
            light_path_count: 512 * 512,
            max_path_len: 10,
            tile_size: 256,
            num_connections: 1,
            num_knn: 16,
            base_radius: 0.01,
            mode: Mode::Vcm,
            num_threads: 0,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ConfigError::EmptyImage);
        }
        if self.max_path_len < 1 {
            return Err(ConfigError::NoPathLength);
        }
        if self.base_radius <= 0.0 as Float {
            return Err(ConfigError::BadRadius);
        }
        if self.tile_size <= 0 {
            return Err(ConfigError::BadTileSize);
        }
        if self.num_connections < 1 || self.num_knn < 1 {
            return Err(ConfigError::BadTechniqueCounts);
        }
        Ok(())
    }
    /// Queue capacity covering one tile worth of in-flight rays.
    pub fn queue_capacity(&self) -> usize {
        (self.tile_size as usize) * (self.tile_size as usize)
    }
}

/// Russian roulette with survival probability proportional to the path
/// throughput's luminance. Returns the acceptance probability when the path
/// survives.
pub fn russian_roulette(throughput: &Spectrum, u: Float) -> Option<Float> {
    let q = (luminance(throughput) * 10.0 as Float).min(1.0 as Float);
    if q <= 0.0 as Float || u >= q {
        None
    } else {
        Some(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bright_paths_always_survive() {
        let rr = russian_roulette(&Spectrum::new(1.0), 0.999);
        assert_eq!(rr, Some(1.0));
    }

    #[test]
    fn dark_paths_die_for_large_u() {
        assert!(russian_roulette(&Spectrum::new(0.01), 0.9).is_none());
        // but survive for small u, with the matching acceptance probability
        let q = russian_roulette(&Spectrum::new(0.01), 0.05).unwrap();
        assert!(q < 1.0 && q > 0.0);
    }

    #[test]
    fn settings_validation_catches_bad_inputs() {
        let mut s = Settings::default();
        assert!(s.validate().is_ok());
        s.base_radius = 0.0;
        assert!(matches!(s.validate(), Err(ConfigError::BadRadius)));
    }

    #[test]
    fn mode_technique_tables() {
        assert!(Mode::Pt.use_nee() && !Mode::Pt.use_lt() && !Mode::Pt.use_merge());
        assert!(Mode::Lt.use_lt() && !Mode::Lt.trace_camera_paths());
        assert!(Mode::Bpt.use_connect() && !Mode::Bpt.use_merge());
        assert!(Mode::Vcm.use_connect() && Mode::Vcm.use_merge());
        assert!(Mode::Sppm.use_merge() && !Mode::Sppm.use_connect());
        assert!(Mode::Twpt.use_lt() && !Mode::Twpt.use_nee());
    }
}

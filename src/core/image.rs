// vcm
use crate::core::parallel::AtomicFloat;
use crate::core::vcm::{Float, Spectrum};

/// Flat array of RGB accumulators supporting race-free adds from any number
/// of worker threads. This is the only output surface of the renderer; file
/// formats and tonemapping live outside the core.
pub struct AtomicImage {
    pixels: Vec<[AtomicFloat; 3]>,
    width: i32,
    height: i32,
}

impl AtomicImage {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0);
        let n = (width * height) as usize;
        let mut pixels = Vec::with_capacity(n);
        for _ in 0..n {
            pixels.push([
                AtomicFloat::new(0.0),
                AtomicFloat::new(0.0),
                AtomicFloat::new(0.0),
            ]);
        }
        AtomicImage {
            pixels,
            width,
            height,
        }
    }
    pub fn width(&self) -> i32 {
        self.width
    }
    pub fn height(&self) -> i32 {
        self.height
    }
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
    /// Adds a contribution to one pixel. Samples carrying NaNs are dropped
    /// rather than poisoning the accumulator.
    pub fn add(&self, pixel_id: i32, c: Spectrum) {
        if pixel_id < 0 || pixel_id as usize >= self.pixels.len() || c.has_nans() {
            return;
        }
        let px = &self.pixels[pixel_id as usize];
        px[0].add(c.c[0]);
        px[1].add(c.c[1]);
        px[2].add(c.c[2]);
    }
    pub fn pixel(&self, pixel_id: i32) -> Spectrum {
        let px = &self.pixels[pixel_id as usize];
        Spectrum::rgb(px[0].load(), px[1].load(), px[2].load())
    }
    pub fn clear(&mut self) {
        for px in &self.pixels {
            px[0].store(0.0);
            px[1].store(0.0);
            px[2].store(0.0);
        }
    }
    /// Mean of the `y` responses over all pixels; used by the statistical
    /// agreement tests.
    pub fn mean_luminance(&self) -> Float {
        let mut sum: Float = 0.0;
        for px in &self.pixels {
            sum += Spectrum::rgb(px[0].load(), px[1].load(), px[2].load()).y();
        }
        sum / self.pixels.len() as Float
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_pixel_adds() {
        let img = AtomicImage::new(4, 4);
        crossbeam::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|_| {
                    for i in 0..16 {
                        img.add(i, Spectrum::new(0.5));
                    }
                });
            }
        })
        .unwrap();
        for i in 0..16 {
            assert_eq!(img.pixel(i), Spectrum::new(2.0));
        }
    }

    #[test]
    fn nan_contributions_are_dropped() {
        let img = AtomicImage::new(1, 1);
        img.add(0, Spectrum::rgb(std::f32::NAN, 1.0, 1.0));
        assert_eq!(img.pixel(0), Spectrum::new(0.0));
    }

    #[test]
    fn out_of_range_ids_are_ignored() {
        let img = AtomicImage::new(2, 2);
        img.add(-1, Spectrum::new(1.0));
        img.add(99, Spectrum::new(1.0));
        assert_eq!(img.mean_luminance(), 0.0);
    }
}

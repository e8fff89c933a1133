// vcm
use crate::core::spectrum::RGBSpectrum;

pub type Spectrum = RGBSpectrum;

pub type Float = f32;

pub const INV_PI: Float = 0.31830988618379067154;
pub const INV_2_PI: Float = 0.15915494309189533577;
pub const INV_4_PI: Float = 0.07957747154594766788;
pub const PI_OVER_2: Float = 1.57079632679489661923;
pub const PI_OVER_4: Float = 0.78539816339744830961;

/// Offset applied to ray origins (as `t_min`) and subtracted from shadow ray
/// lengths to prevent self-intersection.
pub const RAY_OFFSET: Float = 1e-4;

/// Clamp the given value *val* to lie between the values *low* and *high*.
pub fn clamp_t<T>(val: T, low: T, high: T) -> T
where
    T: PartialOrd,
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}

/// sRGB luminance of an RGB value; drives Russian-roulette survival
/// probabilities.
pub fn luminance(s: &Spectrum) -> Float {
    0.2126 * s.c[0] + 0.7152 * s.c[1] + 0.0722 * s.c[2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_orders_bounds() {
        assert_eq!(clamp_t(5, 0, 3), 3);
        assert_eq!(clamp_t(-1, 0, 3), 0);
        assert_eq!(clamp_t(2, 0, 3), 2);
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        let white = Spectrum::new(1.0);
        assert!((luminance(&white) - 1.0).abs() < 1e-4);
    }
}

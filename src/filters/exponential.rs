use crate::constants::{SMOOTHING_FACTOR_MAX, SMOOTHING_FACTOR_MIN};
use nalgebra::SVector;

/// Clamp a smoothing factor into `[0.0, 0.99]`.
///
/// A NaN factor disables smoothing.
#[must_use]
pub fn clamp_smoothing_factor(factor: f64) -> f64 {
    if factor.is_nan() {
        return SMOOTHING_FACTOR_MIN;
    }
    factor.clamp(SMOOTHING_FACTOR_MIN, SMOOTHING_FACTOR_MAX)
}

/// Exponentially smooth `current` against the previous smoothed value.
///
/// Returns `current` unchanged when there is no previous value. Otherwise the
/// factor is clamped into `[0.0, 0.99]` and the result is
/// `factor * previous + (1 - factor) * current`, element-wise. Higher factors
/// smooth more.
#[must_use]
pub fn smooth<const D: usize>(
    current: &SVector<f64, D>,
    previous: Option<&SVector<f64, D>>,
    factor: f64,
) -> SVector<f64, D> {
    let Some(previous) = previous else {
        return *current;
    };

    let factor = clamp_smoothing_factor(factor);
    previous * factor + current * (1.0 - factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    #[test]
    fn test_cold_start_passes_through() {
        let v = Vector3::new(0.1, -2.0, 35.0);
        assert_eq!(smooth(&v, None, 0.3), v);
        assert_eq!(smooth(&v, None, 5.0), v);
        assert_eq!(smooth(&v, None, f64::NAN), v);
    }

    #[test]
    fn test_weighted_average() {
        let current = Vector3::new(20.0, 30.0, 40.0);
        let previous = Vector3::new(10.0, 20.0, 30.0);

        let out = smooth(&current, Some(&previous), 0.5);
        assert_eq!(out, Vector3::new(15.0, 25.0, 35.0));

        // Zero factor follows the measurement
        let out = smooth(&current, Some(&previous), 0.0);
        assert_eq!(out, current);
    }

    #[test]
    fn test_factor_clamping() {
        let current = Vector3::new(1.0, 2.0, 3.0);
        let previous = Vector3::new(-4.0, 8.0, 0.5);

        assert_eq!(
            smooth(&current, Some(&previous), 1.5),
            smooth(&current, Some(&previous), 0.99)
        );
        assert_eq!(
            smooth(&current, Some(&previous), -1.0),
            smooth(&current, Some(&previous), 0.0)
        );
    }

    #[test]
    fn test_never_fully_frozen() {
        let current = Vector3::new(10.0, 10.0, 10.0);
        let previous = Vector3::zeros();

        // Even a factor of 1.0 lets 1% of the measurement through
        let out = smooth(&current, Some(&previous), 1.0);
        assert!((out.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_smoothing_factor() {
        assert_eq!(clamp_smoothing_factor(0.3), 0.3);
        assert_eq!(clamp_smoothing_factor(2.0), SMOOTHING_FACTOR_MAX);
        assert_eq!(clamp_smoothing_factor(-0.5), SMOOTHING_FACTOR_MIN);
        assert_eq!(clamp_smoothing_factor(f64::NAN), SMOOTHING_FACTOR_MIN);
    }

    proptest! {
        #[test]
        fn prop_converges_monotonically(
            target in -1000.0f64..1000.0,
            start in -1000.0f64..1000.0,
            factor in 0.0f64..0.99,
        ) {
            let c = Vector3::new(target, -target, target * 0.5);
            let mut state = Vector3::new(start, start, start);
            let mut last_distance = (state - c).norm();

            for _ in 0..50 {
                state = smooth(&c, Some(&state), factor);
                let distance = (state - c).norm();
                prop_assert!(distance <= last_distance + 1e-9);
                last_distance = distance;
            }
        }

        #[test]
        fn prop_output_between_inputs(
            a in -100.0f64..100.0,
            b in -100.0f64..100.0,
            factor in -2.0f64..2.0,
        ) {
            let out = smooth(&Vector3::new(a, a, a), Some(&Vector3::new(b, b, b)), factor);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(out.x >= lo - 1e-9 && out.x <= hi + 1e-9);
        }
    }
}

//! Per-tick step limiter.

/// Limit a filter output to `±max_speed` degrees per tick.
///
/// `max_speed` must be positive and finite; configuration validation
/// guarantees this for every loop built from a config.
#[inline]
pub fn clamp_step(delta: f64, max_speed: f64) -> f64 {
    delta.clamp(-max_speed, max_speed)
}

/// Move `current` by a limited step and keep it inside `[min, max]`.
#[inline]
pub fn advance(current: f64, delta: f64, max_speed: f64, min: f64, max: f64) -> f64 {
    (current + clamp_step(delta, max_speed)).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn passes_small_steps() {
        assert_eq!(clamp_step(1.25, 3.0), 1.25);
        assert_eq!(clamp_step(-2.0, 3.0), -2.0);
        assert_eq!(clamp_step(0.0, 3.0), 0.0);
    }

    #[test]
    fn limits_large_steps() {
        assert_eq!(clamp_step(72.0, 3.0), 3.0);
        assert_eq!(clamp_step(-72.0, 3.0), -3.0);
    }

    #[test]
    fn advance_respects_axis_range() {
        assert_eq!(advance(89.0, 10.0, 3.0, -90.0, 90.0), 90.0);
        assert_eq!(advance(-89.0, -10.0, 3.0, -90.0, 90.0), -90.0);
        assert_eq!(advance(10.0, 10.0, 3.0, -90.0, 90.0), 13.0);
    }

    proptest! {
        #[test]
        fn never_exceeds_limit(delta in -1e6f64..1e6, max_speed in 0.01f64..20.0) {
            let step = clamp_step(delta, max_speed);
            prop_assert!(step.abs() <= max_speed);
            if delta.abs() <= max_speed {
                prop_assert_eq!(step, delta);
            }
        }
    }
}

//! Velocity derivation from inter-switch travel time.
//!
//! A key strike closes the upper "BR" contact first and the lower "MK"
//! contact at the bottom of the travel; a release opens them in the reverse
//! order. The microseconds between the two edges measure strike or release
//! speed: short travel means a fast strike and a high velocity. Both
//! directions clamp the raw travel time into a configured window before
//! mapping it to a normalized `[0, 1]` value.

/// Clamping window for one travel direction, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Travel times at or below this map to maximum velocity. Increase to
    /// reach maximum velocity easier.
    pub min_us: u32,
    /// Travel times at or above this map to minimum velocity. Decrease to
    /// reach minimum velocity faster.
    pub max_us: u32,
}

impl Window {
    /// Width of the window as the curve input range.
    pub fn range(&self) -> f32 {
        (self.max_us - self.min_us) as f32
    }

    /// Clamp a raw travel time into the window and rebase it to zero, so
    /// the result lies in `[0, max_us - min_us]`.
    pub fn normalize(&self, elapsed_us: u32) -> u32 {
        elapsed_us.clamp(self.min_us, self.max_us) - self.min_us
    }
}

/// Note-on velocity for a normalized travel time (see [`Window::normalize`]).
///
/// Rational curve `x·bias / (x·bias − x + 1)` over `x = (range − t) / range`.
/// `bias` must lie in `(0, 1)` and sets the concavity: smaller values hollow
/// the mid-range while the endpoints stay pinned at 0 and 1.
pub fn note_on(time_us: u32, window: &Window, bias: f32) -> f32 {
    let x = (window.range() - time_us as f32) / window.range();
    x * bias / (x * bias - x + 1.0)
}

/// Note-off velocity for a normalized travel time: plain linear map.
pub fn note_off(time_us: u32, window: &Window) -> f32 {
    (window.range() - time_us as f32) / window.range()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ON: Window = Window { min_us: 4000, max_us: 120_000 };
    const OFF: Window = Window { min_us: 4000, max_us: 80_000 };
    const BIAS: f32 = 0.042875;

    #[test]
    fn normalize_clamps_and_rebases() {
        assert_eq!(ON.normalize(0), 0);
        assert_eq!(ON.normalize(4000), 0);
        assert_eq!(ON.normalize(10_000), 6000);
        assert_eq!(ON.normalize(120_000), 116_000);
        assert_eq!(ON.normalize(500_000), 116_000);
    }

    #[test]
    fn note_on_endpoints() {
        // Fastest possible strike saturates at 1.0 (up to float rounding in
        // the denominator), slowest at exactly 0.0.
        assert!((note_on(ON.normalize(4000), &ON, BIAS) - 1.0).abs() < 1e-5);
        assert_eq!(note_on(ON.normalize(120_000), &ON, BIAS), 0.0);
    }

    #[test]
    fn note_off_endpoints() {
        assert_eq!(note_off(OFF.normalize(4000), &OFF), 1.0);
        assert_eq!(note_off(OFF.normalize(80_000), &OFF), 0.0);
    }

    #[test]
    fn note_on_monotonically_non_increasing() {
        for bias in [0.042875, 0.1, 0.5] {
            let mut prev = f32::INFINITY;
            for travel in (ON.min_us..=ON.max_us).step_by(500) {
                let v = note_on(ON.normalize(travel), &ON, bias);
                assert!(
                    v <= prev,
                    "bias {}: velocity rose from {} to {} at {}us",
                    bias,
                    prev,
                    v,
                    travel
                );
                assert!((0.0..=1.0).contains(&v));
                prev = v;
            }
        }
    }

    #[test]
    fn note_off_monotonically_non_increasing() {
        let mut prev = f32::INFINITY;
        for travel in (OFF.min_us..=OFF.max_us).step_by(500) {
            let v = note_off(OFF.normalize(travel), &OFF);
            assert!(v <= prev);
            assert!((0.0..=1.0).contains(&v));
            prev = v;
        }
    }

    #[test]
    fn bias_controls_concavity() {
        // Same mid-window travel time: a smaller bias hollows the curve,
        // lowering the mid-range velocity while the endpoints stay pinned.
        let t = ON.normalize(30_000);
        assert!(note_on(t, &ON, 0.042875) < note_on(t, &ON, 0.1));
    }
}

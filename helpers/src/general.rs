/// lerp returns the linear interpolation between a and b for t in [0.0, 1.0]. t is clamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * clamp01(t)
}

/// clamp01 clamps x to the interval [0.0, 1.0].
pub fn clamp01(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

/// ease_out_back returns an overshooting ease-out curve value for t in [0.0, 1.0]. The curve
/// starts at 0.0, overshoots 1.0 slightly towards the end and settles at exactly 1.0.
pub fn ease_out_back(t: f64) -> f64 {
    let c1 = 1.70158;
    let c3 = c1 + 1.0;
    1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
}

/// format_racetime formats a race time in seconds as `minutes:seconds:milliseconds`, e.g.
/// 83.456s -> `01:23:456`. Negative times are shown as zero.
pub fn format_racetime(t: f64) -> String {
    let t = if t.is_finite() && t > 0.0 { t } else { 0.0 };
    let minutes = (t / 60.0).floor() as u64;
    let seconds = (t % 60.0).floor() as u64;
    let milliseconds = ((t * 1000.0) % 1000.0).floor() as u64;
    format!("{:02}:{:02}:{:03}", minutes, seconds, milliseconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn racetime_is_formatted_as_min_sec_ms() {
        assert_eq!(format_racetime(0.0), "00:00:000");
        assert_eq!(format_racetime(83.4567), "01:23:456");
        assert_eq!(format_racetime(-3.0), "00:00:000");
        assert_eq!(format_racetime(f64::NAN), "00:00:000");
    }

    #[test]
    fn ease_out_back_hits_both_ends() {
        assert_abs_diff_eq!(ease_out_back(0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ease_out_back(1.0), 1.0, epsilon = 1e-12);
        assert!(ease_out_back(0.8) > 1.0);
    }

    #[test]
    fn lerp_clamps_t() {
        assert_abs_diff_eq!(lerp(0.0, 0.85, 0.5), 0.425, epsilon = 1e-12);
        assert_abs_diff_eq!(lerp(0.0, 0.85, 2.0), 0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(lerp(0.0, 0.85, -1.0), 0.0, epsilon = 1e-12);
    }
}

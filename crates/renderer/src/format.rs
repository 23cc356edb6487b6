//! Number formatting for legend labels.

/// Largest number of decimals a legend label carries.
const MAX_PRECISION: u32 = 6;

/// Decimals needed to tell legend buckets of width `step` apart.
///
/// Keyed off the first significant digit of the step (falling back to
/// `max` for a zero step), keeping one digit after it.
pub fn significant_digits(step: f64, max: f64) -> u32 {
    let reference = if step == 0.0 { max } else { step };
    if reference == 0.0 || !reference.is_finite() {
        return 0;
    }
    let digits = 1 - reference.abs().log10().floor() as i32;
    digits.clamp(0, MAX_PRECISION as i32) as u32
}

/// Round to a fixed number of decimals.
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Render a value with at most `precision` decimals.
pub fn format_value(value: f64, precision: u32) -> String {
    let rounded = round_to_precision(value, precision);
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{:.*}", precision as usize, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_digits() {
        assert_eq!(significant_digits(25.0, 100.0), 0);
        assert_eq!(significant_digits(2.5, 10.0), 1);
        assert_eq!(significant_digits(0.25, 1.0), 2);
        assert_eq!(significant_digits(0.0, 0.5), 2);
        assert_eq!(significant_digits(1e-12, 1.0), 6);
    }

    #[test]
    fn test_round_and_format() {
        assert_eq!(round_to_precision(33.333, 1), 33.3);
        assert_eq!(format_value(25.0, 0), "25");
        assert_eq!(format_value(12.46, 1), "12.5");
        assert_eq!(format_value(-0.0001, 2), "0");
    }
}

/// Price tiers, highest first: (threshold, rounding step, charm offset).
const TIERS: [(f64, f64, f64); 4] = [
    (500_000.0, 50_000.0, 1_000.0),
    (250_000.0, 10_000.0, 1_000.0),
    (100_000.0, 5_000.0, 1_000.0),
    (0.0, 1_000.0, 100.0),
];

/// Rounds to the tier step nearest `value`, then subtracts the tier's charm
/// offset (`1_749_000`, `99_900`).
pub fn apply_rounding_rules(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let (_, step, offset) = TIERS
        .iter()
        .copied()
        .find(|(threshold, _, _)| value >= *threshold)?;
    let rounded = (value / step).round() * step - offset;
    (rounded >= 0.0).then_some(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_round_and_subtract_offset() {
        assert_eq!(apply_rounding_rules(1_744_444.44), Some(1_749_000.0));
        assert_eq!(apply_rounding_rules(312_345.0), Some(309_000.0));
        assert_eq!(apply_rounding_rules(123_400.0), Some(124_000.0));
        assert_eq!(apply_rounding_rules(45_678.0), Some(45_900.0));
    }

    #[test]
    fn invalid_inputs_yield_none() {
        assert_eq!(apply_rounding_rules(-1.0), None);
        assert_eq!(apply_rounding_rules(f64::NAN), None);
        assert_eq!(apply_rounding_rules(f64::INFINITY), None);
        // 0 rounds to 0 and the offset would go negative
        assert_eq!(apply_rounding_rules(0.0), None);
    }

    #[test]
    fn results_stay_on_tier_grid_below_value_plus_step() {
        let mut value = 1_000.0;
        while value < 3_000_000.0 {
            let (_, step, offset) = TIERS
                .iter()
                .copied()
                .find(|(threshold, _, _)| value >= *threshold)
                .expect("tier");
            let result = apply_rounding_rules(value).expect("rounded");
            assert_eq!((result + offset) % step, 0.0, "value {value}");
            assert_eq!(result % 100.0, 0.0, "value {value}");
            assert!(result < value + step, "value {value}");
            value = value * 1.37 + 17.0;
        }
    }
}

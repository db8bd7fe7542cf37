//! Points calculator.
//!
//! Converts an update's attributed progress percent into an integer point
//! award. Awards are computed over the full ordered attribution sequence so
//! the running total can never exceed the task's reward, even when per-award
//! rounding would otherwise leak a point past the cap.

use crate::tasks::progress::Attribution;

/// Point value of a single update given the percent it was attributed.
/// Percent is clamped to [0, 100]; zero or negative attribution earns 0.
/// Rounds half away from zero.
pub fn points_for_update(reward_points: i64, update_progress_percent: f64) -> i64 {
    let capped = update_progress_percent.clamp(0.0, 100.0);
    if capped <= 0.0 {
        return 0;
    }
    (capped / 100.0 * reward_points.max(0) as f64).round() as i64
}

/// Per-update awards for an ordered attribution sequence, capped so that the
/// cumulative total never exceeds `reward_points`. Element order matches the
/// input order.
pub fn award_sequence(reward_points: i64, attributions: &[Attribution]) -> Vec<i64> {
    let reward = reward_points.max(0);
    let mut awarded_so_far: i64 = 0;
    attributions
        .iter()
        .map(|attribution| {
            let nominal = points_for_update(reward, attribution.percent);
            let award = nominal.min(reward - awarded_so_far).max(0);
            awarded_so_far += award;
            award
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributions(percents: &[f64]) -> Vec<Attribution> {
        percents
            .iter()
            .enumerate()
            .map(|(i, p)| Attribution {
                update_id: format!("u{}", i),
                percent: *p,
            })
            .collect()
    }

    #[test]
    fn test_quarter_of_reward() {
        // Checklist of 4, one item checked → 25% of 100 points.
        assert_eq!(points_for_update(100, 25.0), 25);
    }

    #[test]
    fn test_clamping_and_zero() {
        assert_eq!(points_for_update(100, -5.0), 0);
        assert_eq!(points_for_update(100, 0.0), 0);
        assert_eq!(points_for_update(100, 150.0), 100);
        assert_eq!(points_for_update(0, 100.0), 0);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // 12.5% of 100 → 12.5 points → 13.
        assert_eq!(points_for_update(100, 12.5), 13);
        assert_eq!(points_for_update(10, 33.0), 3);
    }

    #[test]
    fn test_award_sequence_matches_per_update_values() {
        let awards = award_sequence(100, &attributions(&[40.0, 60.0]));
        assert_eq!(awards, vec![40, 60]);
    }

    #[test]
    fn test_award_sequence_caps_rounding_leak() {
        // 200 × 0.5% with reward 100: naive rounding would pay 1 point each
        // (200 total); the running cap stops the sum at the full reward.
        let percents: Vec<f64> = vec![0.5; 200];
        let awards = award_sequence(100, &attributions(&percents));
        let total: i64 = awards.iter().sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_award_sequence_total_never_exceeds_reward() {
        let awards = award_sequence(7, &attributions(&[33.33, 33.33, 33.34]));
        let total: i64 = awards.iter().sum();
        assert!(total <= 7);
    }
}

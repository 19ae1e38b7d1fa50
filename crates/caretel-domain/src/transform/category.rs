use crate::observation::{Category, StandardizedObservation};

/// Determines the observation category. Precedence is identical for
/// both vendors: vital-signs if any vital sign is present, else
/// activity if a posture/sleep-state/bed-status group is present, else
/// activity if an event is present, else activity as the default.
///
/// The lower branches all resolve to `Activity` today; they are kept
/// explicit because the precedence order is contract, not coincidence.
pub fn categorize(observation: &StandardizedObservation) -> Category {
    if observation.heart_rate.is_some() || observation.respiratory_rate.is_some() {
        Category::VitalSigns
    } else if observation.posture_code.is_some()
        || observation.sleep_state_code.is_some()
        || observation.bed_status_code.is_some()
    {
        Category::Activity
    } else if observation.event_type.is_some() {
        Category::Activity
    } else {
        Category::Activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn observation() -> StandardizedObservation {
        StandardizedObservation::new(
            "tenant-1".to_string(),
            "dev-1".to_string(),
            Utc::now(),
            "{}".to_string(),
        )
    }

    #[test]
    fn test_vitals_win_over_posture() {
        let mut obs = observation();
        obs.heart_rate = Some(70);
        obs.posture_code = Some("2".to_string());
        assert_eq!(categorize(&obs), Category::VitalSigns);
    }

    #[test]
    fn test_respiratory_rate_alone_is_vital_signs() {
        let mut obs = observation();
        obs.respiratory_rate = Some(16);
        assert_eq!(categorize(&obs), Category::VitalSigns);
    }

    #[test]
    fn test_posture_without_vitals_is_activity() {
        let mut obs = observation();
        obs.posture_code = Some("2".to_string());
        assert_eq!(categorize(&obs), Category::Activity);
    }

    #[test]
    fn test_sleep_state_and_bed_status_are_activity() {
        let mut obs = observation();
        obs.sleep_state_code = Some("248220008".to_string());
        assert_eq!(categorize(&obs), Category::Activity);

        let mut obs = observation();
        obs.bed_status_code = Some("248224008".to_string());
        assert_eq!(categorize(&obs), Category::Activity);
    }

    #[test]
    fn test_event_only_is_activity() {
        let mut obs = observation();
        obs.event_type = Some("fall".to_string());
        assert_eq!(categorize(&obs), Category::Activity);
    }

    #[test]
    fn test_empty_observation_defaults_to_activity() {
        assert_eq!(categorize(&observation()), Category::Activity);
    }

    #[test]
    fn test_precedence_is_total_over_group_combinations() {
        // Every combination of the four group flags yields a
        // deterministic category following the documented order.
        for mask in 0..16u8 {
            let mut obs = observation();
            if mask & 1 != 0 {
                obs.heart_rate = Some(70);
            }
            if mask & 2 != 0 {
                obs.respiratory_rate = Some(15);
            }
            if mask & 4 != 0 {
                obs.posture_code = Some("1".to_string());
            }
            if mask & 8 != 0 {
                obs.event_type = Some("sit_up".to_string());
            }
            let expected = if mask & 3 != 0 {
                Category::VitalSigns
            } else {
                Category::Activity
            };
            assert_eq!(categorize(&obs), expected, "mask {:#06b}", mask);
        }
    }
}

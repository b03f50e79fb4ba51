use std::collections::HashMap;

use rand::Rng;

use super::types::VideoEntry;
use crate::config::SeasonalDirectoryConfig;

/// Iterates `seasonal_directories` in order; for each whose conditions
/// currently hold, draws an independent Bernoulli trial at `likelihood`.
/// The first successful trial with at least one eligible (non-excluded)
/// entry wins; everything else falls through to the regular pool.
pub fn pick_seasonal(
    seasonal_directories: &[SeasonalDirectoryConfig],
    seasonal_index: &HashMap<String, Vec<VideoEntry>>,
    exclude_paths: &[String],
    now: chrono::DateTime<chrono::Local>,
    rng: &mut impl Rng,
) -> Option<VideoEntry> {
    for seasonal in seasonal_directories {
        if !seasonal.conditions.evaluate(now) {
            continue;
        }
        let roll: f64 = rng.gen_range(0.0..1.0);
        if roll >= seasonal.likelihood {
            continue;
        }

        let Some(candidates) = seasonal_index.get(&seasonal.directory) else {
            continue;
        };
        let eligible: Vec<&VideoEntry> = candidates
            .iter()
            .filter(|v| !exclude_paths.contains(&v.original_path))
            .collect();
        if eligible.is_empty() {
            continue;
        }

        let index = rng.gen_range(0..eligible.len());
        return Some(eligible[index].clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_condition::TimeConditions;
    use chrono::{Local, TimeZone};
    use rand::rngs::mock::StepRng;

    fn entry(path: &str) -> VideoEntry {
        VideoEntry {
            original_path: path.to_string(),
            filename: path.to_string(),
            directory: "/seasonal".to_string(),
            added_at: 0,
            seasonal_directory: Some("winter".to_string()),
        }
    }

    #[test]
    fn likelihood_zero_never_selects_seasonal() {
        let config = vec![SeasonalDirectoryConfig {
            directory: "winter".to_string(),
            likelihood: 0.0,
            conditions: TimeConditions::default(),
        }];
        let mut index = HashMap::new();
        index.insert("winter".to_string(), vec![entry("/a.mp4")]);
        let mut rng = StepRng::new(0, 1);
        let now = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();

        let picked = pick_seasonal(&config, &index, &[], now, &mut rng);
        assert!(picked.is_none());
    }

    #[test]
    fn likelihood_one_always_selects_when_conditions_hold_and_entries_exist() {
        let config = vec![SeasonalDirectoryConfig {
            directory: "winter".to_string(),
            likelihood: 1.0,
            conditions: TimeConditions::default(),
        }];
        let mut index = HashMap::new();
        index.insert("winter".to_string(), vec![entry("/a.mp4"), entry("/b.mp4")]);
        let mut rng = StepRng::new(0, 1);
        let now = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();

        let picked = pick_seasonal(&config, &index, &[], now, &mut rng);
        assert!(picked.is_some());
    }

    #[test]
    fn excluded_paths_are_not_selected() {
        let config = vec![SeasonalDirectoryConfig {
            directory: "winter".to_string(),
            likelihood: 1.0,
            conditions: TimeConditions::default(),
        }];
        let mut index = HashMap::new();
        index.insert("winter".to_string(), vec![entry("/a.mp4")]);
        let mut rng = StepRng::new(0, 1);
        let now = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();

        let picked = pick_seasonal(&config, &index, &["/a.mp4".to_string()], now, &mut rng);
        assert!(picked.is_none());
    }
}

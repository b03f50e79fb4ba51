use rand::Rng;

use super::seasonal::pick_seasonal;
use super::store::IndexStore;
use super::types::VideoEntry;
use crate::config::SeasonalDirectoryConfig;

/// `getRandomVideo`: seasonal selection first, uniform fallback second.
pub fn get_random_video(
    store: &IndexStore,
    seasonal_directories: &[SeasonalDirectoryConfig],
    exclude_paths: &[String],
    now: chrono::DateTime<chrono::Local>,
    rng: &mut impl Rng,
) -> Option<VideoEntry> {
    if let Some(video) = pick_seasonal(
        seasonal_directories,
        &store.snapshot().seasonal,
        exclude_paths,
        now,
        rng,
    ) {
        return Some(video);
    }

    let eligible: Vec<&VideoEntry> = store
        .snapshot()
        .regular
        .iter()
        .filter(|v| !exclude_paths.contains(&v.original_path))
        .collect();
    if eligible.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..eligible.len());
    Some(eligible[index].clone())
}

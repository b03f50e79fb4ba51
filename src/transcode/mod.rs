pub mod audio_plan;
mod ffmpeg_args;
mod runner;

use serde::{Deserialize, Serialize};

pub use runner::{transcode_video, TranscodeError};

use crate::probe::Metadata;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossfadeTiming {
    pub duration: f64,
    pub start_time: f64,
}

/// Derives crossfade timing from a probed duration: videos under
/// 10 seconds never get a crossfade.
pub fn derive_crossfade_timing(duration: Option<f64>) -> Option<CrossfadeTiming> {
    let duration = duration?;
    if duration < 10.0 {
        return None;
    }
    let crossfade_duration = (duration * 0.1).min(3.0);
    let start_time = (duration - crossfade_duration - 1.0).max(0.0);
    Some(CrossfadeTiming {
        duration: crossfade_duration,
        start_time,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedArtifact {
    pub original_path: String,
    pub filename: String,
    pub directory: String,
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_directory: Option<String>,
    pub metadata: Metadata,
    pub processed_path: String,
    pub video_id: String,
    pub processed_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossfade_timing: Option<CrossfadeTiming>,
    pub output_audio_channels: u32,
    pub output_channel_layout: String,
    pub audio_processing_applied: String,
    #[serde(default)]
    pub reprocessed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_video_has_no_crossfade() {
        assert!(derive_crossfade_timing(Some(9.0)).is_none());
    }

    #[test]
    fn ten_second_video_gets_valid_timing() {
        let timing = derive_crossfade_timing(Some(10.0)).unwrap();
        assert!(timing.start_time >= 0.0);
        assert!(timing.start_time <= 10.0 - timing.duration);
    }

    #[test]
    fn missing_duration_yields_no_timing() {
        assert!(derive_crossfade_timing(None).is_none());
    }

    #[test]
    fn long_video_caps_crossfade_at_three_seconds() {
        let timing = derive_crossfade_timing(Some(3600.0)).unwrap();
        assert_eq!(timing.duration, 3.0);
    }
}

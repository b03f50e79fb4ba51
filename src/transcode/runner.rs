use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::audio_plan::{plan_audio, wants_stereo_fallback};
use super::ffmpeg_args::build_transcode_args;
use super::{derive_crossfade_timing, ProcessedArtifact};
use crate::config::Config;
use crate::index::VideoEntry;
use crate::probe::Metadata;
use crate::process_ext::run_command_with_timeout_capture_stderr;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("audio filter chain rejected by ffmpeg: {0}")]
    Incompatible(String),
    #[error("output artifact too small or missing")]
    Corrupt,
    #[error("ffmpeg timed out")]
    Timeout,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

const INCOMPATIBLE_SUBSTRINGS: &[&str] = &["audio", "pan", "loudnorm", "channel"];
const MIN_OUTPUT_BYTES: u64 = 1024;

fn looks_incompatible(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    INCOMPATIBLE_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

fn run_once(
    ffmpeg_path: &Path,
    entry: &VideoEntry,
    metadata: &Metadata,
    config: &Config,
    output_path: &Path,
    timeout: Duration,
    force_stereo_fallback: bool,
) -> Result<super::audio_plan::AudioPlan, (super::audio_plan::AudioPlan, String)> {
    let channels = metadata.audio_channels.unwrap_or(0);
    let layout = metadata.channel_layout.as_deref();
    let plan = plan_audio(channels, layout, &config.audio, force_stereo_fallback);

    let args = build_transcode_args(Path::new(&entry.original_path), output_path, &plan, config);
    tracing::info!(video_id = %entry.original_path, ?plan, "composed audio filter chain");

    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(&args);

    let (status, timed_out, stderr) =
        match run_command_with_timeout_capture_stderr(cmd, timeout, 64 * 1024) {
            Ok(result) => result,
            Err(err) => return Err((plan, format!("failed to spawn ffmpeg: {err}"))),
        };

    if timed_out {
        return Err((plan, "timeout".to_string()));
    }
    if !status.success() {
        return Err((plan, String::from_utf8_lossy(&stderr).into_owned()));
    }
    Ok(plan)
}

/// Transcodes `entry` into a single artifact under `temp_dir`:
/// video is always stream-copied, audio goes through the composed filter
/// chain, with one stereo-fallback retry on a compatibility-flavored
/// ffmpeg failure.
pub fn transcode_video(
    ffmpeg_path: &Path,
    entry: &VideoEntry,
    metadata: &Metadata,
    config: &Config,
    temp_dir: &Path,
    timeout: Duration,
) -> Result<ProcessedArtifact, TranscodeError> {
    let delay_ms = config.performance.cpu_limiting.processing_delay_ms;
    if delay_ms > 0 {
        std::thread::sleep(Duration::from_millis(delay_ms));
    }

    fs::create_dir_all(temp_dir)
        .map_err(|e| TranscodeError::Io(anyhow::anyhow!("failed to create temp dir: {e}")))?;

    let video_id = Uuid::new_v4().to_string();
    let output_path: PathBuf = temp_dir.join(format!("processed_{video_id}.mp4"));

    let initial_fallback = wants_stereo_fallback(&config.audio);
    let plan = match run_once(
        ffmpeg_path,
        entry,
        metadata,
        config,
        &output_path,
        timeout,
        initial_fallback,
    ) {
        Ok(plan) => plan,
        Err((_, message)) if message == "timeout" => {
            let _ = fs::remove_file(&output_path);
            return Err(TranscodeError::Timeout);
        }
        Err((_, stderr)) if !initial_fallback && looks_incompatible(&stderr) => {
            tracing::warn!(video_id = %entry.original_path, "ffmpeg audio chain rejected, retrying in stereo fallback");
            let _ = fs::remove_file(&output_path);
            match run_once(ffmpeg_path, entry, metadata, config, &output_path, timeout, true) {
                Ok(plan) => plan,
                Err((_, stderr)) => {
                    let _ = fs::remove_file(&output_path);
                    return Err(TranscodeError::Incompatible(stderr));
                }
            }
        }
        Err((_, stderr)) => {
            let _ = fs::remove_file(&output_path);
            return Err(TranscodeError::Incompatible(stderr));
        }
    };

    let file_len = fs::metadata(&output_path)
        .map(|m| m.len())
        .unwrap_or(0);
    if file_len <= MIN_OUTPUT_BYTES {
        let _ = fs::remove_file(&output_path);
        return Err(TranscodeError::Corrupt);
    }

    let crossfade_timing = derive_crossfade_timing(metadata.duration);
    let processed_at = now_ms();

    Ok(ProcessedArtifact {
        original_path: entry.original_path.clone(),
        filename: entry.filename.clone(),
        directory: entry.directory.clone(),
        added_at: entry.added_at,
        seasonal_directory: entry.seasonal_directory.clone(),
        metadata: metadata.clone(),
        processed_path: output_path.to_string_lossy().into_owned(),
        video_id,
        processed_at,
        crossfade_timing,
        output_audio_channels: plan.output_channels,
        output_channel_layout: plan.output_channel_layout,
        audio_processing_applied: plan.applied_label,
        reprocessed: false,
    })
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_incompatible_matches_known_substrings() {
        assert!(looks_incompatible("Invalid audio channel layout"));
        assert!(looks_incompatible("pan filter error"));
        assert!(!looks_incompatible("No such file or directory"));
    }
}

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::index::VideoEntry;
use crate::probe;
use crate::transcode::{self, derive_crossfade_timing, ProcessedArtifact, TranscodeError};

#[derive(Debug, Error)]
pub enum ReprocessError {
    #[error("original source file is missing: {0}")]
    OriginalMissing(String),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

/// Ensures `artifact`'s `processedPath` is valid: fails outright
/// if the original source is gone; returns the artifact unchanged if its
/// processed file still exists; otherwise re-invokes the transcoder and
/// merges the fresh `processedPath`/`videoId`/`processedAt` onto the
/// original entry, preserving (or recomputing) crossfade timing and
/// marking the result as reprocessed.
pub fn ensure_processed(
    artifact: ProcessedArtifact,
    ffmpeg_path: &Path,
    ffprobe_path: &Path,
    config: &Config,
    temp_dir: &Path,
    probe_timeout: Duration,
    transcode_timeout: Duration,
) -> Result<ProcessedArtifact, ReprocessError> {
    if !Path::new(&artifact.original_path).exists() {
        return Err(ReprocessError::OriginalMissing(artifact.original_path));
    }

    if Path::new(&artifact.processed_path).exists() {
        return Ok(artifact);
    }

    tracing::info!(original_path = %artifact.original_path, "processed artifact missing, reprocessing");

    let entry = VideoEntry {
        original_path: artifact.original_path.clone(),
        filename: artifact.filename.clone(),
        directory: artifact.directory.clone(),
        added_at: artifact.added_at,
        seasonal_directory: artifact.seasonal_directory.clone(),
    };

    let metadata = probe::probe_metadata(ffprobe_path, Path::new(&entry.original_path), probe_timeout)
        .map_err(|err| {
            TranscodeError::Io(anyhow::anyhow!("failed to re-probe original for reprocess: {err}"))
        })?
        .unwrap_or(artifact.metadata.clone());

    let fresh = transcode::transcode_video(
        ffmpeg_path,
        &entry,
        &metadata,
        config,
        temp_dir,
        transcode_timeout,
    )?;

    let crossfade_timing = artifact
        .crossfade_timing
        .or_else(|| derive_crossfade_timing(metadata.duration))
        .or(fresh.crossfade_timing);

    Ok(ProcessedArtifact {
        processed_path: fresh.processed_path,
        video_id: fresh.video_id,
        processed_at: fresh.processed_at,
        metadata: fresh.metadata,
        crossfade_timing,
        output_audio_channels: fresh.output_audio_channels,
        output_channel_layout: fresh.output_channel_layout,
        audio_processing_applied: fresh.audio_processing_applied,
        reprocessed: true,
        ..artifact
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Metadata;
    use std::fs;

    fn artifact(original_path: &str, processed_path: &str) -> ProcessedArtifact {
        ProcessedArtifact {
            original_path: original_path.to_string(),
            filename: "a.mp4".to_string(),
            directory: "/videos".to_string(),
            added_at: 0,
            seasonal_directory: None,
            metadata: Metadata::default(),
            processed_path: processed_path.to_string(),
            video_id: "old-id".to_string(),
            processed_at: 0,
            crossfade_timing: None,
            output_audio_channels: 2,
            output_channel_layout: "stereo".to_string(),
            audio_processing_applied: "none".to_string(),
            reprocessed: false,
        }
    }

    #[test]
    fn fails_when_original_source_is_gone() {
        let config = Config::default();
        let temp_dir = tempfile::tempdir().unwrap();
        let result = ensure_processed(
            artifact("/definitely/missing.mp4", "/definitely/missing-processed.mp4"),
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            &config,
            temp_dir.path(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ReprocessError::OriginalMissing(_))));
    }

    #[test]
    fn returns_as_is_when_processed_file_still_exists() {
        let scratch = tempfile::tempdir().unwrap();
        let original = scratch.path().join("a.mp4");
        let processed = scratch.path().join("processed_a.mp4");
        fs::write(&original, b"x").unwrap();
        fs::write(&processed, b"y").unwrap();

        let config = Config::default();
        let temp_dir = tempfile::tempdir().unwrap();
        let result = ensure_processed(
            artifact(original.to_str().unwrap(), processed.to_str().unwrap()),
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            &config,
            temp_dir.path(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(result.video_id, "old-id");
        assert!(!result.reprocessed);
    }

    #[test]
    fn reprocesses_when_processed_file_is_missing() {
        let scratch = tempfile::tempdir().unwrap();
        let original = scratch.path().join("a.mp4");
        fs::write(&original, b"x").unwrap();

        let mock = env!("CARGO_BIN_EXE_mock_ffmpeg");
        let config = Config::default();
        let temp_dir = tempfile::tempdir().unwrap();

        let result = ensure_processed(
            artifact(original.to_str().unwrap(), "/definitely/gone-processed.mp4"),
            Path::new(mock),
            Path::new(mock),
            &config,
            temp_dir.path(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(result.reprocessed);
        assert!(Path::new(&result.processed_path).exists());
    }
}

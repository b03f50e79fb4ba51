use std::path::Path;

use super::audio_plan::AudioPlan;
use crate::config::{Config, PerformanceMode};

/// Assembles the ffmpeg argument vector for one transcode job: stream-copy
/// video, re-encode audio per `plan`, with performance throttling flags
/// from `performance.cpuLimiting`/`performance.mode`.
pub fn build_transcode_args(input: &Path, output: &Path, plan: &AudioPlan, config: &Config) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".to_string(), "-nostdin".to_string()];

    let cpu = &config.performance.cpu_limiting;
    if cpu.enabled {
        if let Some(threads) = cpu.max_threads {
            args.push("-threads".to_string());
            args.push(threads.to_string());
        }
        if let Some(queue_size) = cpu.thread_queue_size {
            args.push("-thread_queue_size".to_string());
            args.push(queue_size.to_string());
        }
    }

    args.push("-i".to_string());
    args.push(input.to_string_lossy().into_owned());

    // Video: always stream copy.
    args.push("-c:v".to_string());
    args.push("copy".to_string());

    let preset = match config.performance.mode {
        PerformanceMode::Quality => "slow",
        PerformanceMode::Balanced => "medium",
        PerformanceMode::Fast => "veryfast",
    };
    args.push("-preset".to_string());
    args.push(preset.to_string());
    if cpu.enabled && cpu.max_threads == Some(1) {
        args.push("-cpu-used".to_string());
        args.push("1".to_string());
    }

    if plan.output_channels == 0 {
        args.push("-an".to_string());
    } else {
        if let Some(codec) = &plan.codec {
            args.push("-c:a".to_string());
            args.push(codec.clone());
        }
        if let Some(bitrate) = plan.bitrate_kbps {
            args.push("-b:a".to_string());
            args.push(format!("{bitrate}k"));
        }
        if let Some(filter) = &plan.filter {
            args.push("-af".to_string());
            args.push(filter.clone());
        }
    }

    args.push("-movflags".to_string());
    args.push("+faststart".to_string());

    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::audio_plan::plan_audio;
    use std::path::PathBuf;

    #[test]
    fn video_is_always_stream_copy() {
        let config = Config::default();
        let plan = plan_audio(2, Some("stereo"), &config.audio, false);
        let args = build_transcode_args(
            &PathBuf::from("/in.mp4"),
            &PathBuf::from("/out.mp4"),
            &plan,
            &config,
        );
        let pos = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[pos + 1], "copy");
    }

    #[test]
    fn silent_input_gets_an_flag() {
        let config = Config::default();
        let plan = plan_audio(0, None, &config.audio, false);
        let args = build_transcode_args(
            &PathBuf::from("/in.mp4"),
            &PathBuf::from("/out.mp4"),
            &plan,
            &config,
        );
        assert!(args.iter().any(|a| a == "-an"));
    }

    #[test]
    fn single_thread_limit_adds_cpu_used_one() {
        let mut config = Config::default();
        config.performance.cpu_limiting.enabled = true;
        config.performance.cpu_limiting.max_threads = Some(1);
        let plan = plan_audio(2, Some("stereo"), &config.audio, false);
        let args = build_transcode_args(
            &PathBuf::from("/in.mp4"),
            &PathBuf::from("/out.mp4"),
            &plan,
            &config,
        );
        assert!(args.windows(2).any(|w| w[0] == "-cpu-used" && w[1] == "1"));
    }
}

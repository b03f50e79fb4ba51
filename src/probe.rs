use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    pub has_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_bitrate: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    channels: Option<u32>,
    channel_layout: Option<String>,
    sample_rate: Option<String>,
    #[serde(rename = "bit_rate")]
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

/// Derives a channel layout label from a raw channel count when ffprobe
/// doesn't report one directly.
pub fn channel_layout_from_count(channels: u32) -> String {
    match channels {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        3 => "2.1".to_string(),
        4 => "quad".to_string(),
        5 => "5.0".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        n => format!("{n}ch"),
    }
}

/// Accepts `num/den` (e.g. "30000/1001") or a bare decimal string.
fn parse_frame_rate(raw: &str) -> Option<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    raw.trim().parse().ok()
}

/// Runs the external prober and parses its JSON output into `Metadata`.
/// Any failure (spawn, timeout, non-zero exit, unparsable output) is
/// logged and returns `Ok(None)` rather than propagating — probe failures
/// are isolated per-file per the component contract.
pub fn probe_metadata(
    ffprobe_path: &Path,
    source: &Path,
    timeout: Duration,
) -> Result<Option<Metadata>> {
    let mut cmd = Command::new(ffprobe_path);
    cmd.arg("-v")
        .arg("error")
        .arg("-show_streams")
        .arg("-show_format")
        .arg("-of")
        .arg("json")
        .arg(source.as_os_str());

    let stdout = match run_capturing_stdout(cmd, timeout) {
        Ok(Some(stdout)) => stdout,
        Ok(None) => return Ok(None),
        Err(err) => {
            tracing::warn!(source = %source.display(), error = %err, "failed to spawn ffprobe");
            return Ok(None);
        }
    };

    let parsed: FfprobeOutput = match serde_json::from_slice(&stdout) {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(source = %source.display(), error = %err, "failed to parse ffprobe json output");
            return Ok(None);
        }
    };

    Ok(Some(metadata_from_ffprobe(parsed)))
}

/// Spawns `cmd` with piped stdout, polling `try_wait` until completion or
/// `timeout` elapses (killing the child on timeout), mirroring
/// `process_ext::run_command_with_timeout_capture_stderr` but reading
/// stdout — ffprobe's `-of json` payload lands there, not on stderr.
fn run_capturing_stdout(mut cmd: Command, timeout: Duration) -> std::io::Result<Option<Vec<u8>>> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    let mut stdout_pipe = child.stdout.take();

    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout_pipe.take() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            let _ = reader.join();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let stdout = reader.join().unwrap_or_default();
    if !status.success() {
        return Ok(None);
    }
    Ok(Some(stdout))
}

fn metadata_from_ffprobe(parsed: FfprobeOutput) -> Metadata {
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok());
    let file_size = parsed
        .format
        .as_ref()
        .and_then(|f| f.size.as_ref())
        .and_then(|s| s.parse::<u64>().ok());
    let container_bitrate = parsed
        .format
        .as_ref()
        .and_then(|f| f.bit_rate.as_ref())
        .and_then(|b| b.parse::<u64>().ok());

    let channels = audio_stream.and_then(|s| s.channels);
    let channel_layout = audio_stream
        .and_then(|s| s.channel_layout.clone())
        .filter(|s| !s.is_empty())
        .or_else(|| channels.map(channel_layout_from_count));

    Metadata {
        duration,
        width: video_stream.and_then(|s| s.width),
        height: video_stream.and_then(|s| s.height),
        fps: video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
        video_codec: video_stream.and_then(|s| s.codec_name.clone()),
        has_audio: audio_stream.is_some(),
        audio_channels: channels,
        channel_layout,
        audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|s| s.parse().ok()),
        audio_bitrate: audio_stream
            .and_then(|s| s.bit_rate.as_deref())
            .and_then(|s| s.parse().ok()),
        file_size,
        container_bitrate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(30000.0 / 1001.0));
    }

    #[test]
    fn parses_decimal_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }

    #[test]
    fn rejects_zero_denominator() {
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[test]
    fn derives_channel_layout_from_count() {
        assert_eq!(channel_layout_from_count(1), "mono");
        assert_eq!(channel_layout_from_count(2), "stereo");
        assert_eq!(channel_layout_from_count(6), "5.1");
        assert_eq!(channel_layout_from_count(8), "7.1");
        assert_eq!(channel_layout_from_count(10), "10ch");
    }

    #[test]
    fn metadata_from_ffprobe_prefers_explicit_layout_over_derived() {
        let parsed = FfprobeOutput {
            streams: vec![FfprobeStream {
                codec_type: Some("audio".to_string()),
                codec_name: Some("aac".to_string()),
                width: None,
                height: None,
                r_frame_rate: None,
                channels: Some(6),
                channel_layout: Some("5.1(side)".to_string()),
                sample_rate: Some("48000".to_string()),
                bit_rate: Some("384000".to_string()),
            }],
            format: None,
        };
        let metadata = metadata_from_ffprobe(parsed);
        assert_eq!(metadata.channel_layout.as_deref(), Some("5.1(side)"));
        assert!(metadata.has_audio);
    }

    #[test]
    fn metadata_from_ffprobe_derives_layout_when_absent() {
        let parsed = FfprobeOutput {
            streams: vec![FfprobeStream {
                codec_type: Some("audio".to_string()),
                codec_name: Some("pcm_s16le".to_string()),
                width: None,
                height: None,
                r_frame_rate: None,
                channels: Some(1),
                channel_layout: None,
                sample_rate: None,
                bit_rate: None,
            }],
            format: None,
        };
        let metadata = metadata_from_ffprobe(parsed);
        assert_eq!(metadata.channel_layout.as_deref(), Some("mono"));
    }
}

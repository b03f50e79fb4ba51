use serde::{Deserialize, Serialize};

use crate::time_condition::TimeConditions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalDirectoryConfig {
    pub directory: String,
    pub likelihood: f64,
    #[serde(default)]
    pub conditions: TimeConditions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSection {
    pub preprocessed_queue_size: u32,
    pub playback_queue_size: u32,
    pub playback_queue_initialization_threshold: u32,
    pub playback_history_size: u32,
    pub persisted_history_size: u32,
    pub update_interval_ms: u64,
}

impl Default for VideoSection {
    fn default() -> Self {
        Self {
            preprocessed_queue_size: 10,
            playback_queue_size: 5,
            playback_queue_initialization_threshold: 3,
            playback_history_size: 10,
            persisted_history_size: 5000,
            update_interval_ms: 15 * 60 * 1000,
        }
    }
}

/// Cadences for the background tasks that keep the queue, temp directory,
/// and persisted state in sync with reality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSection {
    pub queue_monitor_interval_ms: u64,
    pub queue_critical_monitor_interval_ms: u64,
    pub periodic_cleanup_interval_ms: u64,
    pub periodic_save_interval_ms: u64,
    pub config_watch_poll_interval_ms: u64,
}

impl Default for MonitoringSection {
    fn default() -> Self {
        Self {
            queue_monitor_interval_ms: 60_000,
            queue_critical_monitor_interval_ms: 10_000,
            periodic_cleanup_interval_ms: 30 * 60 * 1000,
            periodic_save_interval_ms: 5 * 60 * 1000,
            config_watch_poll_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationSettings {
    pub enabled: bool,
    pub strength: Option<f64>,
    pub presets: Option<String>,
    pub target_lufs: f64,
    pub true_peak: f64,
    pub lra: f64,
    pub dual_mono: bool,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: None,
            presets: None,
            target_lufs: -23.0,
            true_peak: -1.0,
            lra: 7.0,
            dual_mono: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StereoUpmixSettings {
    pub rear_channel_level: f64,
    pub center_channel_level: f64,
    pub lfe_channel_level: f64,
}

impl Default for StereoUpmixSettings {
    fn default() -> Self {
        Self {
            rear_channel_level: 0.707,
            center_channel_level: 0.707,
            lfe_channel_level: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodecPreferences {
    pub stereo: String,
    pub multichannel: String,
    pub stereo_bitrate: u32,
    pub multichannel_bitrate: u32,
}

impl Default for CodecPreferences {
    fn default() -> Self {
        Self {
            stereo: "aac".to_string(),
            multichannel: "aac".to_string(),
            stereo_bitrate: 256,
            multichannel_bitrate: 384,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    Auto,
    Stereo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilitySettings {
    pub force_aac: bool,
    pub preserve_original_if_multichannel: bool,
    pub compatibility_mode: CompatibilityMode,
    pub fallback_to_stereo: bool,
}

impl Default for CompatibilitySettings {
    fn default() -> Self {
        Self {
            force_aac: false,
            preserve_original_if_multichannel: true,
            compatibility_mode: CompatibilityMode::Auto,
            fallback_to_stereo: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioSection {
    pub enabled_51_processing: bool,
    pub force_output_channels: Option<u32>,
    pub normalization: NormalizationSettings,
    pub stereo_upmixing: StereoUpmixSettings,
    pub codec_preferences: CodecPreferences,
    pub compatibility: CompatibilitySettings,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            enabled_51_processing: true,
            force_output_channels: None,
            normalization: NormalizationSettings::default(),
            stereo_upmixing: StereoUpmixSettings::default(),
            codec_preferences: CodecPreferences::default(),
            compatibility: CompatibilitySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Quality,
    Balanced,
    Fast,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuLimiting {
    pub enabled: bool,
    pub max_threads: Option<u32>,
    pub processing_delay_ms: u64,
    pub thread_queue_size: Option<u32>,
    pub priority: Option<String>,
}

impl Default for CpuLimiting {
    fn default() -> Self {
        Self {
            enabled: false,
            max_threads: None,
            processing_delay_ms: 0,
            thread_queue_size: None,
            priority: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSection {
    pub mode: PerformanceMode,
    pub cpu_limiting: CpuLimiting,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            mode: PerformanceMode::Balanced,
            cpu_limiting: CpuLimiting::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutsSection {
    pub video_load_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub transcode_timeout_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            video_load_timeout_ms: 10_000,
            probe_timeout_ms: 15_000,
            transcode_timeout_ms: 10 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetriesSection {
    pub max_initialization_attempts: u32,
    pub initialization_backoff_ms: u64,
    pub initialization_total_timeout_ms: u64,
}

impl Default for RetriesSection {
    fn default() -> Self {
        Self {
            max_initialization_attempts: 5,
            initialization_backoff_ms: 2_000,
            initialization_total_timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilesSection {
    pub supported_video_extensions: Vec<String>,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            supported_video_extensions: vec![
                "mp4", "mkv", "webm", "mov", "avi", "m4v", "flv", "wmv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolsSection {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerNetworkSettings {
    pub host: String,
    pub port: u16,
    pub auto_open_browser: bool,
}

impl Default for ServerNetworkSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auto_open_browser: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSection {
    pub server: ServerNetworkSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemSection {
    #[serde(default)]
    pub last_config_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub directories: Vec<String>,
    #[serde(default)]
    pub seasonal_directories: Vec<SeasonalDirectoryConfig>,
    #[serde(default)]
    pub video: VideoSection,
    #[serde(default)]
    pub monitoring: MonitoringSection,
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub performance: PerformanceSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub retries: RetriesSection,
    #[serde(default)]
    pub files: FilesSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub system: SystemSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: vec!["./videos".to_string()],
            seasonal_directories: Vec::new(),
            video: VideoSection::default(),
            monitoring: MonitoringSection::default(),
            audio: AudioSection::default(),
            performance: PerformanceSection::default(),
            timeouts: TimeoutsSection::default(),
            retries: RetriesSection::default(),
            files: FilesSection::default(),
            tools: ToolsSection::default(),
            network: NetworkSection::default(),
            system: SystemSection::default(),
        }
    }
}
